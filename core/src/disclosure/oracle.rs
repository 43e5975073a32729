//! Reference decryption oracle
//!
//! Plays the relayer and key management service for an in-process
//! deployment: it checks signed authorizations against the runtime ACL and
//! releases plaintexts or signed attestations.

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

use ed25519_dalek::{SigningKey, VerifyingKey};
use ethers::types::Address;
use log::{info, warn};
use rand::rngs::OsRng;

use crate::clock::Clock;
use crate::config::DisclosureConfig;
use crate::crypto;
use crate::error::{CoreError, Result};
use crate::fhe::{FheRuntime, KeyManagement};
use crate::models::CiphertextHandle;

use super::{
    DecryptionAttestation, DecryptionAuthorization, Eip712Domain, EphemeralKeypair,
    SignedAuthorization,
};

/// Request to decrypt one handle on behalf of the authorization's signer
#[derive(Clone)]
pub struct UserDecryptRequest {
    /// Handle to decrypt
    pub handle: CiphertextHandle,

    /// Contract the handle belongs to
    pub contract: Address,

    /// Ephemeral private key, proving possession of the authorized public key
    pub private_key: [u8; 32],

    /// Signed authorization
    pub authorization: SignedAuthorization,
}

impl Debug for UserDecryptRequest {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("UserDecryptRequest")
            .field("handle", &self.handle)
            .field("contract", &self.contract)
            .field("signer", &self.authorization.signer)
            .finish_non_exhaustive()
    }
}

impl UserDecryptRequest {
    /// Create a request
    pub fn new(
        handle: CiphertextHandle,
        contract: Address,
        keypair: &EphemeralKeypair,
        authorization: SignedAuthorization,
    ) -> Self {
        UserDecryptRequest {
            handle,
            contract,
            private_key: keypair.private_key(),
            authorization,
        }
    }
}

/// Decryption oracle
pub struct DecryptionOracle<K: FheRuntime + KeyManagement> {
    /// Runtime holding ciphertexts and the ACL
    runtime: Arc<K>,

    /// Attestation signing key
    signing_key: SigningKey,

    /// Signing domain authorizations must be bound to
    domain: Eip712Domain,

    /// Authorization limits
    config: DisclosureConfig,

    /// Time source for validity windows
    clock: Arc<dyn Clock>,
}

impl<K: FheRuntime + KeyManagement> Debug for DecryptionOracle<K> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("DecryptionOracle")
            .field("verifying_key", &hex::encode(self.verifying_key().as_bytes()))
            .field("domain", &self.domain)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<K: FheRuntime + KeyManagement> DecryptionOracle<K> {
    /// Create an oracle with a fresh attestation key
    pub fn new(
        runtime: Arc<K>,
        domain: Eip712Domain,
        config: DisclosureConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::with_signing_key(runtime, SigningKey::generate(&mut OsRng), domain, config, clock)
    }

    /// Create an oracle with a given attestation key
    pub fn with_signing_key(
        runtime: Arc<K>,
        signing_key: SigningKey,
        domain: Eip712Domain,
        config: DisclosureConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        DecryptionOracle {
            runtime,
            signing_key,
            domain,
            config,
            clock,
        }
    }

    /// Key engines use to verify attestations
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Signing domain
    pub fn domain(&self) -> &Eip712Domain {
        &self.domain
    }

    /// Authorization limits
    pub fn config(&self) -> &DisclosureConfig {
        &self.config
    }

    /// Fresh session keypair
    pub fn generate_keypair(&self) -> EphemeralKeypair {
        EphemeralKeypair::generate()
    }

    /// Typed data for the requester to sign
    pub fn create_authorization(
        &self,
        public_key: [u8; 32],
        contract_addresses: Vec<Address>,
        start_timestamp: u64,
        duration_days: u64,
    ) -> DecryptionAuthorization {
        DecryptionAuthorization::new(public_key, contract_addresses, start_timestamp, duration_days)
    }

    /// Check a signed authorization for `contract` at time `now`
    ///
    /// Returns the recovered signer. Does not consult the ACL.
    pub fn check_authorization(
        &self,
        signed: &SignedAuthorization,
        contract: Address,
        now: u64,
    ) -> Result<Address> {
        let auth = &signed.authorization;

        if auth.duration_days == 0 || auth.duration_days > self.config.max_duration_days {
            return Err(CoreError::AuthorizationScope(format!(
                "duration of {} days outside 1..={}",
                auth.duration_days, self.config.max_duration_days
            )));
        }

        if now < auth.start_timestamp {
            return Err(CoreError::AuthorizationNotYetValid {
                valid_from: auth.start_timestamp,
                now,
            });
        }
        if now >= auth.expires_at() {
            return Err(CoreError::AuthorizationExpired {
                expired_at: auth.expires_at(),
                now,
            });
        }

        if auth.contract_addresses.is_empty() {
            return Err(CoreError::AuthorizationScope("no contract addresses".to_string()));
        }
        if auth.contract_addresses.len() > self.config.max_contract_addresses {
            return Err(CoreError::AuthorizationScope(format!(
                "{} contract addresses, at most {} allowed",
                auth.contract_addresses.len(),
                self.config.max_contract_addresses
            )));
        }
        if !auth.covers(&contract) {
            return Err(CoreError::AuthorizationScope(format!(
                "contract {:?} not covered",
                contract
            )));
        }

        let recovered = signed.recover_signer(&self.domain)?;
        if recovered != signed.signer {
            return Err(CoreError::Unauthorized(format!(
                "signature recovers to {:?}, not {:?}",
                recovered, signed.signer
            )));
        }

        Ok(recovered)
    }

    fn check_request(&self, request: &UserDecryptRequest) -> Result<Address> {
        let signer =
            self.check_authorization(&request.authorization, request.contract, self.clock.now())?;

        let derived = EphemeralKeypair::from_private_key(&request.private_key).public_key();
        if !crypto::verify_hash(&request.authorization.authorization.public_key, &derived) {
            return Err(CoreError::Unauthorized(
                "private key does not match authorized public key".to_string(),
            ));
        }

        if !self.runtime.is_allowed(&request.handle, signer) {
            return Err(CoreError::Unauthorized(format!(
                "{:?} may not decrypt {}",
                signer, request.handle
            )));
        }
        if !self.runtime.is_allowed(&request.handle, request.contract) {
            return Err(CoreError::Unauthorized(format!(
                "{} is not bound to contract {:?}",
                request.handle, request.contract
            )));
        }

        Ok(signer)
    }

    fn authorized_plaintext(&self, request: &UserDecryptRequest) -> Result<u8> {
        let signer = self.check_request(request).map_err(|e| {
            warn!("Rejected decryption of {}: {}", request.handle, e);
            e
        })?;

        let plaintext = self.runtime.decrypt(&request.handle)?;
        info!("Disclosed {} to {:?}", request.handle, signer);

        Ok(plaintext)
    }

    /// Decrypt a handle for the authorization's signer
    pub fn user_decrypt(&self, request: &UserDecryptRequest) -> Result<u8> {
        self.authorized_plaintext(request)
    }

    /// Decrypt a handle and sign a statement of the result
    pub fn attest_decryption(&self, request: &UserDecryptRequest) -> Result<DecryptionAttestation> {
        let plaintext = self.authorized_plaintext(request)?;
        Ok(DecryptionAttestation::sign(
            request.handle,
            request.contract,
            plaintext,
            &self.signing_key,
        ))
    }
}
