//! Configuration for the core crate
//!
//! This module provides configuration options for the engines, the
//! disclosure oracle and the client-side ledger wait policy.

use std::time::Duration;

use ethers::types::{Address, H160};
use serde::{Deserialize, Serialize};

use crate::error::{to_config_error, CoreError, Result};

/// `NumberCompare` deployment on Sepolia
pub const SEPOLIA_NUMBER_COMPARE: Address = H160([
    0x88, 0x43, 0x2c, 0x3d, 0x63, 0x1e, 0xa1, 0xce, 0x18, 0xea,
    0x8c, 0x16, 0x98, 0x82, 0x79, 0xe4, 0x0b, 0x97, 0x30, 0x80,
]);

/// Sepolia chain id
pub const SEPOLIA_CHAIN_ID: u64 = 11_155_111;

/// Seconds in one authorization day
pub const SECONDS_PER_DAY: u64 = 86_400;

/// Engine deployment configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Chain id the contracts live on
    pub chain_id: u64,

    /// Address of the comparison contract
    pub compare_contract: Address,

    /// Address of the guessing game contract
    pub game_contract: Address,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            chain_id: SEPOLIA_CHAIN_ID,
            compare_contract: SEPOLIA_NUMBER_COMPARE,
            game_contract: Address::from_low_u64_be(0x6a3e),
        }
    }
}

/// Decryption authorization configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisclosureConfig {
    /// EIP-712 domain name
    pub domain_name: String,

    /// EIP-712 domain version
    pub domain_version: String,

    /// Contract that verifies decryption authorizations
    pub verifying_contract: Address,

    /// Longest validity window an authorization may request
    pub max_duration_days: u64,

    /// Validity window requested by clients
    pub default_duration_days: u64,

    /// Most contracts a single authorization may cover
    pub max_contract_addresses: usize,
}

impl Default for DisclosureConfig {
    fn default() -> Self {
        DisclosureConfig {
            domain_name: "Decryption".to_string(),
            domain_version: "1".to_string(),
            verifying_contract: Address::from_low_u64_be(0xdec0),
            max_duration_days: 365,
            default_duration_days: 1,
            max_contract_addresses: 10,
        }
    }
}

/// Ledger submission and confirmation policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// How long to wait for a transaction to be included
    pub confirmation_timeout: Duration,

    /// How long to wait for the wallet to approve a signature
    pub wallet_timeout: Duration,

    /// Retries for transient failures
    pub max_retries: usize,

    /// Backoff before the first retry, doubled each time
    pub initial_backoff: Duration,

    /// Pending transactions the sequencer accepts before pushing back
    pub queue_capacity: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            confirmation_timeout: Duration::from_secs(60),
            wallet_timeout: Duration::from_secs(120),
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
            queue_capacity: 64,
        }
    }
}

/// Core configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Engine deployment
    pub engine: EngineConfig,

    /// Decryption authorization
    pub disclosure: DisclosureConfig,

    /// Ledger wait policy
    pub ledger: LedgerConfig,

    /// Log level
    pub log_level: String,

    /// Whether to enable debug mode
    pub debug_mode: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        CoreConfig {
            engine: EngineConfig::default(),
            disclosure: DisclosureConfig::default(),
            ledger: LedgerConfig::default(),
            log_level: "info".to_string(),
            debug_mode: false,
        }
    }
}

impl CoreConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a JSON file
    pub fn from_file(path: &str) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let config: CoreConfig = serde_json::from_reader(file)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn to_file(&self, path: &str) -> Result<()> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        let disclosure = &self.disclosure;
        if disclosure.max_duration_days == 0 {
            return Err(to_config_error("max_duration_days must be positive"));
        }
        let default_days = disclosure.default_duration_days;
        if default_days == 0 || default_days > disclosure.max_duration_days {
            return Err(CoreError::ConfigError(format!(
                "default_duration_days must be in 1..={}",
                disclosure.max_duration_days
            )));
        }
        if disclosure.max_contract_addresses == 0 {
            return Err(to_config_error("max_contract_addresses must be positive"));
        }
        if self.ledger.queue_capacity == 0 {
            return Err(to_config_error("queue_capacity must be positive"));
        }
        if self.engine.compare_contract == self.engine.game_contract {
            return Err(to_config_error("contracts must have distinct addresses"));
        }
        Ok(())
    }

    /// Create a development configuration
    pub fn development() -> Self {
        let mut config = Self::default();
        config.debug_mode = true;
        config.log_level = "debug".to_string();
        config
    }

    /// Create a production configuration
    pub fn production() -> Self {
        let mut config = Self::default();
        config.debug_mode = false;
        config.log_level = "info".to_string();
        config
    }

    /// Create a testing configuration
    pub fn testing() -> Self {
        let mut config = Self::default();
        config.debug_mode = true;
        config.log_level = "debug".to_string();
        config.ledger.confirmation_timeout = Duration::from_secs(5);
        config.ledger.wallet_timeout = Duration::from_secs(5);
        config.ledger.initial_backoff = Duration::from_millis(10);
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = CoreConfig::default();

        assert_eq!(config.engine.chain_id, SEPOLIA_CHAIN_ID);
        assert_eq!(
            format!("{:?}", config.engine.compare_contract),
            "0x88432c3d631ea1ce18ea8c16988279e40b973080"
        );
        assert_eq!(config.disclosure.max_duration_days, 365);
        assert_eq!(config.disclosure.default_duration_days, 1);
        assert_eq!(config.ledger.max_retries, 3);
        assert_eq!(config.log_level, "info");
        assert!(!config.debug_mode);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_presets() {
        let dev = CoreConfig::development();
        assert!(dev.debug_mode);
        assert_eq!(dev.log_level, "debug");

        let prod = CoreConfig::production();
        assert!(!prod.debug_mode);
        assert_eq!(prod.log_level, "info");

        let testing = CoreConfig::testing();
        assert_eq!(testing.ledger.confirmation_timeout, Duration::from_secs(5));
        assert_eq!(testing.ledger.initial_backoff, Duration::from_millis(10));
    }

    #[test]
    fn test_validate_rejects_bad_windows() {
        let mut config = CoreConfig::default();
        config.disclosure.default_duration_days = 400;
        assert!(matches!(config.validate(), Err(CoreError::ConfigError(_))));

        let mut config = CoreConfig::default();
        config.ledger.queue_capacity = 0;
        assert!(config.validate().is_err());

        let mut config = CoreConfig::default();
        config.engine.game_contract = config.engine.compare_contract;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = CoreConfig::development();

        let json = serde_json::to_string_pretty(&config).unwrap();
        let deserialized: CoreConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized, config);
    }

    #[test]
    fn test_config_file_io() {
        let config = CoreConfig::testing();

        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_str().unwrap();

        config.to_file(path).unwrap();
        let loaded = CoreConfig::from_file(path).unwrap();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let temp_file = NamedTempFile::new().unwrap();
        std::fs::write(temp_file.path(), "{ not json").unwrap();

        let err = CoreConfig::from_file(temp_file.path().to_str().unwrap()).unwrap_err();
        assert!(matches!(err, CoreError::JsonError(_)));
    }
}
