//! Error types for the core crate
//!
//! This module provides a consolidated error type for the core crate.
//! Variants fall into three families: validation failures raised by the
//! engines, authorization failures raised by the decryption oracle, and
//! infrastructure failures (IO, serialization, state).

use std::io;

use ethers::types::Address;
use thiserror::Error;

use crate::models::CiphertextHandle;

/// Core error type
#[derive(Error, Debug)]
pub enum CoreError {
    /// Record id is beyond the current counter
    #[error("Invalid ID: {0}")]
    InvalidId(u64),

    /// Encrypted input proof failed verification
    #[error("Invalid proof: {0}")]
    InvalidProof(String),

    /// Operation on a game that is not active (ended, won or never created)
    #[error("Game not active: {0}")]
    GameNotActive(u64),

    /// Caller is not the host of the game
    #[error("Caller {caller:?} is not the host of game {game_id}")]
    NotHost {
        /// Game id
        game_id: u64,
        /// Caller address
        caller: Address,
    },

    /// Player has no recorded guess in the game
    #[error("Player {player:?} has no guess in game {game_id}")]
    NoGuess {
        /// Game id
        game_id: u64,
        /// Player address
        player: Address,
    },

    /// Attested guess result is not CORRECT
    #[error("Attested result for game {game_id} is not correct")]
    NotCorrect {
        /// Game id
        game_id: u64,
    },

    /// Decryption attestation is malformed, forged or bound to another handle
    #[error("Invalid attestation: {0}")]
    InvalidAttestation(String),

    /// Handle does not reference a ciphertext known to the FHE runtime
    #[error("Unknown ciphertext handle: {0}")]
    UnknownHandle(CiphertextHandle),

    /// Cryptographic operation error
    #[error("Cryptographic error: {0}")]
    CryptoError(String),

    /// Signer is not allowed to decrypt the handle
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authorization validity window has elapsed
    #[error("Authorization expired at {expired_at} (now {now})")]
    AuthorizationExpired {
        /// End of the validity window (unix seconds)
        expired_at: u64,
        /// Time of the check (unix seconds)
        now: u64,
    },

    /// Authorization validity window has not started
    #[error("Authorization not valid before {valid_from} (now {now})")]
    AuthorizationNotYetValid {
        /// Start of the validity window (unix seconds)
        valid_from: u64,
        /// Time of the check (unix seconds)
        now: u64,
    },

    /// Authorization does not cover the requested contract or is badly scoped
    #[error("Authorization scope error: {0}")]
    AuthorizationScope(String),

    /// Resource limit exceeded
    #[error("Resource limit exceeded: {0}")]
    ResourceLimitExceeded(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Hex decoding error
    #[error("Hex decoding error: {0}")]
    HexError(#[from] hex::FromHexError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl CoreError {
    /// Whether the engine rejected the request before touching any state
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CoreError::InvalidId(_)
                | CoreError::InvalidProof(_)
                | CoreError::GameNotActive(_)
                | CoreError::NotHost { .. }
                | CoreError::NoGuess { .. }
                | CoreError::NotCorrect { .. }
                | CoreError::InvalidAttestation(_)
        )
    }

    /// Whether a decryption attempt was refused; a fresh authorization is required
    pub fn is_authorization(&self) -> bool {
        matches!(
            self,
            CoreError::Unauthorized(_)
                | CoreError::AuthorizationExpired { .. }
                | CoreError::AuthorizationNotYetValid { .. }
                | CoreError::AuthorizationScope(_)
        )
    }
}

/// Result type for the core crate
pub type Result<T> = std::result::Result<T, CoreError>;

/// Convert a string error to a CryptoError
pub fn to_crypto_error<E: std::fmt::Display>(err: E) -> CoreError {
    CoreError::CryptoError(err.to_string())
}

/// Convert a string error to a ConfigError
pub fn to_config_error<E: std::fmt::Display>(err: E) -> CoreError {
    CoreError::ConfigError(err.to_string())
}
