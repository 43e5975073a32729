//! # Sealed Compare Core
//!
//! Encrypted comparison engines and the disclosure protocol around them.
//! Engines store opaque ciphertext handles in counter-indexed record stores
//! and grant decryption rights; plaintext is only released by the decryption
//! oracle against a signed, time-bounded authorization.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod clock;
pub mod config;
pub mod crypto;
pub mod disclosure;
pub mod engine;
pub mod error;
pub mod fhe;
pub mod models;
pub mod store;
pub mod utils;

/// Re-export common types for ease of use
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::CoreConfig;
pub use disclosure::{
    DecryptionAttestation, DecryptionAuthorization, DecryptionOracle, Eip712Domain,
    EphemeralKeypair, SignedAuthorization, UserDecryptRequest,
};
pub use engine::{GuessNumber, LedgerEvent, NumberCompare, TxContext};
pub use error::{CoreError, Result};
pub use fhe::{FheRuntime, KeyManagement, LocalFheRuntime};
pub use models::{
    CiphertextHandle, ComparisonRecord, ExternalInput, GameInfo, GameRecord, GameStatus,
};

/// Version of the core crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Create a domain-separated secure hash
pub fn secure_hash(domain: &str, data: &[u8]) -> [u8; 32] {
    crypto::secure_hash(domain, data)
}

/// Create a domain-separated secure hash of multiple inputs
pub fn secure_hash_multiple(domain: &str, data: &[&[u8]]) -> [u8; 32] {
    crypto::secure_hash_multiple(domain, data)
}
