//! Disclosure authorization
//!
//! Plaintext never leaves the FHE runtime through the engines. A requester
//! who wants a result decrypted generates an ephemeral keypair and signs an
//! EIP-712-style authorization binding that key to a set of contracts and a
//! validity window. The [`DecryptionOracle`] checks the authorization against
//! the on-chain ACL before releasing anything.
//!
//! The oracle can also attest a decryption: an ed25519-signed statement of
//! `(handle, contract, plaintext)` that engines accept as proof of an
//! outcome without decrypting themselves.

mod oracle;

pub use oracle::{DecryptionOracle, UserDecryptRequest};

use std::fmt::{Debug, Formatter, Result as FmtResult};

use ed25519_dalek::{Signer as _, SigningKey, Verifier as _, VerifyingKey};
use ethers::signers::{LocalWallet, Signer as _};
use ethers::types::{Address, Signature, H256};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use crate::config::{DisclosureConfig, SECONDS_PER_DAY};
use crate::crypto::{self, abi_word_address, abi_word_u64, keccak256};
use crate::error::{to_crypto_error, CoreError, Result};
use crate::models::{domains, CiphertextHandle};

const DOMAIN_TYPE: &str = concat!(
    "EIP712Domain(string name,string version,",
    "uint256 chainId,address verifyingContract)"
);

const USER_DECRYPT_TYPE: &str = concat!(
    "UserDecryptRequestVerification(bytes publicKey,address[] contractAddresses,",
    "uint256 startTimestamp,uint256 durationDays)"
);

/// EIP-712 signing domain of decryption authorizations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eip712Domain {
    /// Domain name
    pub name: String,

    /// Domain version
    pub version: String,

    /// Chain id
    pub chain_id: u64,

    /// Contract verifying the signatures
    pub verifying_contract: Address,
}

impl Eip712Domain {
    /// Domain for `chain_id` as configured
    pub fn from_config(config: &DisclosureConfig, chain_id: u64) -> Self {
        Eip712Domain {
            name: config.domain_name.clone(),
            version: config.domain_version.clone(),
            chain_id,
            verifying_contract: config.verifying_contract,
        }
    }

    /// EIP-712 domain separator
    pub fn separator(&self) -> [u8; 32] {
        keccak256(&[
            &keccak256(&[DOMAIN_TYPE.as_bytes()]),
            &keccak256(&[self.name.as_bytes()]),
            &keccak256(&[self.version.as_bytes()]),
            &abi_word_u64(self.chain_id),
            &abi_word_address(self.verifying_contract.as_fixed_bytes()),
        ])
    }
}

/// Ephemeral keypair of one decryption session
pub struct EphemeralKeypair {
    signing_key: SigningKey,
}

impl Debug for EphemeralKeypair {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("EphemeralKeypair")
            .field("public_key", &hex::encode(self.public_key()))
            .finish_non_exhaustive()
    }
}

impl EphemeralKeypair {
    /// Generate a fresh keypair
    pub fn generate() -> Self {
        EphemeralKeypair {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Rebuild a keypair from its private key
    pub fn from_private_key(private_key: &[u8; 32]) -> Self {
        EphemeralKeypair {
            signing_key: SigningKey::from_bytes(private_key),
        }
    }

    /// Public half, bound into the authorization
    pub fn public_key(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Private half, presented to the oracle as proof of possession
    pub fn private_key(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }
}

/// Typed data a requester signs to authorize decryption
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptionAuthorization {
    /// Ephemeral public key of the session
    pub public_key: [u8; 32],

    /// Contracts whose handles may be decrypted
    pub contract_addresses: Vec<Address>,

    /// Start of the validity window (unix seconds)
    pub start_timestamp: u64,

    /// Length of the validity window in days
    pub duration_days: u64,
}

impl DecryptionAuthorization {
    /// Create an authorization
    pub fn new(
        public_key: [u8; 32],
        contract_addresses: Vec<Address>,
        start_timestamp: u64,
        duration_days: u64,
    ) -> Self {
        DecryptionAuthorization {
            public_key,
            contract_addresses,
            start_timestamp,
            duration_days,
        }
    }

    /// End of the validity window (exclusive)
    pub fn expires_at(&self) -> u64 {
        self.start_timestamp
            .saturating_add(self.duration_days.saturating_mul(SECONDS_PER_DAY))
    }

    /// Whether `now` falls inside the validity window
    pub fn is_valid_at(&self, now: u64) -> bool {
        now >= self.start_timestamp && now < self.expires_at()
    }

    /// Whether the authorization covers `contract`
    pub fn covers(&self, contract: &Address) -> bool {
        self.contract_addresses.contains(contract)
    }

    /// EIP-712 struct hash
    pub fn struct_hash(&self) -> [u8; 32] {
        let addresses: Vec<[u8; 32]> = self
            .contract_addresses
            .iter()
            .map(|address| abi_word_address(address.as_fixed_bytes()))
            .collect();
        let address_parts: Vec<&[u8]> = addresses.iter().map(|word| word.as_slice()).collect();

        keccak256(&[
            &keccak256(&[USER_DECRYPT_TYPE.as_bytes()]),
            &keccak256(&[&self.public_key]),
            &keccak256(&address_parts),
            &abi_word_u64(self.start_timestamp),
            &abi_word_u64(self.duration_days),
        ])
    }

    /// Digest a wallet signs for `domain`
    pub fn digest(&self, domain: &Eip712Domain) -> [u8; 32] {
        keccak256(&[&[0x19, 0x01], &domain.separator(), &self.struct_hash()])
    }

    /// Sign with a local account key
    pub fn sign(self, domain: &Eip712Domain, wallet: &LocalWallet) -> Result<SignedAuthorization> {
        let signature = wallet
            .sign_hash(H256::from(self.digest(domain)))
            .map_err(to_crypto_error)?;
        Ok(SignedAuthorization::new(self, wallet.address(), signature))
    }
}

/// Authorization together with the requester's account signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedAuthorization {
    /// Signed typed data
    pub authorization: DecryptionAuthorization,

    /// Account claiming to have signed
    pub signer: Address,

    /// Account signature over the EIP-712 digest
    pub signature: Signature,
}

impl SignedAuthorization {
    /// Bundle an authorization with its signature
    pub fn new(
        authorization: DecryptionAuthorization,
        signer: Address,
        signature: Signature,
    ) -> Self {
        SignedAuthorization {
            authorization,
            signer,
            signature,
        }
    }

    /// Account that actually produced the signature
    pub fn recover_signer(&self, domain: &Eip712Domain) -> Result<Address> {
        self.signature
            .recover(H256::from(self.authorization.digest(domain)))
            .map_err(|e| CoreError::Unauthorized(format!("signature recovery failed: {}", e)))
    }
}

/// Oracle-signed statement that `handle` on `contract` decrypts to `plaintext`
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptionAttestation {
    /// Decrypted handle
    pub handle: CiphertextHandle,

    /// Contract the handle belongs to
    pub contract: Address,

    /// Decrypted value
    pub plaintext: u8,

    /// ed25519 signature of the oracle
    pub signature: Vec<u8>,
}

impl Debug for DecryptionAttestation {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("DecryptionAttestation")
            .field("handle", &self.handle)
            .field("contract", &self.contract)
            .field("plaintext", &self.plaintext)
            .finish()
    }
}

impl DecryptionAttestation {
    fn message(handle: &CiphertextHandle, contract: &Address, plaintext: u8) -> [u8; 32] {
        crypto::secure_hash_multiple(
            domains::ATTESTATION,
            &[handle.as_bytes(), contract.as_bytes(), &[plaintext]],
        )
    }

    /// Sign an attestation with the oracle key
    pub fn sign(
        handle: CiphertextHandle,
        contract: Address,
        plaintext: u8,
        key: &SigningKey,
    ) -> Self {
        let signature = key.sign(&Self::message(&handle, &contract, plaintext));
        DecryptionAttestation {
            handle,
            contract,
            plaintext,
            signature: signature.to_bytes().to_vec(),
        }
    }

    /// Check the oracle signature
    pub fn verify(&self, oracle_key: &VerifyingKey) -> Result<()> {
        let bytes: [u8; 64] = self
            .signature
            .as_slice()
            .try_into()
            .map_err(|_| CoreError::InvalidAttestation("signature must be 64 bytes".to_string()))?;
        let signature = ed25519_dalek::Signature::from_bytes(&bytes);

        oracle_key
            .verify(&Self::message(&self.handle, &self.contract, self.plaintext), &signature)
            .map_err(|_| {
                CoreError::InvalidAttestation("oracle signature does not verify".to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain() -> Eip712Domain {
        Eip712Domain::from_config(&DisclosureConfig::default(), 11_155_111)
    }

    fn contract() -> Address {
        Address::repeat_byte(0xc0)
    }

    #[test]
    fn test_validity_window() {
        let auth = DecryptionAuthorization::new([1; 32], vec![contract()], 1_000, 1);

        assert_eq!(auth.expires_at(), 1_000 + 86_400);
        assert!(!auth.is_valid_at(999));
        assert!(auth.is_valid_at(1_000));
        assert!(auth.is_valid_at(87_399));
        assert!(!auth.is_valid_at(87_400));

        let forever = DecryptionAuthorization::new([1; 32], vec![], u64::MAX - 1, u64::MAX);
        assert_eq!(forever.expires_at(), u64::MAX);
    }

    #[test]
    fn test_digest_binds_every_field() {
        let base = DecryptionAuthorization::new([1; 32], vec![contract()], 1_000, 1);
        let digest = base.digest(&domain());

        let mut other = base.clone();
        other.public_key = [2; 32];
        assert_ne!(other.digest(&domain()), digest);

        let mut other = base.clone();
        other.contract_addresses.push(Address::repeat_byte(0xc1));
        assert_ne!(other.digest(&domain()), digest);

        let mut other = base.clone();
        other.duration_days = 2;
        assert_ne!(other.digest(&domain()), digest);

        let mut other_domain = domain();
        other_domain.chain_id = 1;
        assert_ne!(base.digest(&other_domain), digest);
    }

    #[test]
    fn test_signature_recovers_signer() {
        let wallet = LocalWallet::new(&mut rand::thread_rng());
        let keypair = EphemeralKeypair::generate();
        let auth = DecryptionAuthorization::new(keypair.public_key(), vec![contract()], 1_000, 1);

        let signed = auth.sign(&domain(), &wallet).unwrap();
        assert_eq!(signed.signer, wallet.address());
        assert_eq!(signed.recover_signer(&domain()).unwrap(), wallet.address());

        // Tampering with the typed data changes the recovered account
        let mut tampered = signed.clone();
        tampered.authorization.duration_days = 365;
        assert_ne!(tampered.recover_signer(&domain()).ok(), Some(wallet.address()));
    }

    #[test]
    fn test_ephemeral_keypair_roundtrip() {
        let keypair = EphemeralKeypair::generate();
        let rebuilt = EphemeralKeypair::from_private_key(&keypair.private_key());

        assert_eq!(rebuilt.public_key(), keypair.public_key());
        assert!(!format!("{:?}", keypair).contains(&hex::encode(keypair.private_key())));
    }

    #[test]
    fn test_attestation_verification() {
        let oracle_key = SigningKey::generate(&mut OsRng);
        let attestation =
            DecryptionAttestation::sign(CiphertextHandle([3; 32]), contract(), 1, &oracle_key);

        assert!(attestation.verify(&oracle_key.verifying_key()).is_ok());

        let mut forged = attestation.clone();
        forged.plaintext = 0;
        assert!(matches!(
            forged.verify(&oracle_key.verifying_key()),
            Err(CoreError::InvalidAttestation(_))
        ));

        let impostor = SigningKey::generate(&mut OsRng);
        assert!(attestation.verify(&impostor.verifying_key()).is_err());

        let mut truncated = attestation;
        truncated.signature.truncate(10);
        assert!(truncated.verify(&oracle_key.verifying_key()).is_err());
    }
}
