//! Data models for Sealed Compare
//!
//! This module provides data structures for the records kept by the
//! engines: ciphertext handles and encrypted inputs, comparison records,
//! game records and the decoded result constants.

mod game;
mod handle;
mod outcome;
mod record;

pub use game::{GameInfo, GameRecord, GameStatus};
pub use handle::{CiphertextHandle, ExternalInput, InputProof};
pub use outcome::{CompareOutcome, GuessOutcome};
pub use record::ComparisonRecord;

/// Domain constants for hashing
pub mod domains {
    /// Domain for handles of encrypted inputs
    pub const INPUT_HANDLE: &str = "SEALED_INPUT_HANDLE";

    /// Domain for input validity proofs
    pub const INPUT_PROOF: &str = "SEALED_INPUT_PROOF";

    /// Domain for handles produced by homomorphic operations
    pub const COMPUTED_HANDLE: &str = "SEALED_COMPUTED_HANDLE";

    /// Domain for oracle decryption attestations
    pub const ATTESTATION: &str = "SEALED_ATTESTATION";

    /// Domain for signed ledger transactions
    pub const TRANSACTION: &str = "SEALED_TRANSACTION";
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::crypto;

    #[test]
    fn test_domain_separation() {
        let data = b"test data";

        let all = [
            crypto::secure_hash(domains::INPUT_HANDLE, data),
            crypto::secure_hash(domains::INPUT_PROOF, data),
            crypto::secure_hash(domains::COMPUTED_HANDLE, data),
            crypto::secure_hash(domains::ATTESTATION, data),
            crypto::secure_hash(domains::TRANSACTION, data),
        ];

        for (i, a) in all.iter().enumerate() {
            for b in all.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }
}
