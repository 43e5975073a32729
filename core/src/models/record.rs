//! Comparison record representation

use ethers::types::Address;
use serde::{Deserialize, Serialize};

use super::handle::CiphertextHandle;

/// A stored encrypted comparison
///
/// The zero value (zero address, zero timestamp, zero handle) is what the
/// store hands back for ids it has never allocated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonRecord {
    /// Record id
    pub id: u64,

    /// Account that submitted the comparison
    pub submitter: Address,

    /// Ledger timestamp of creation (unix seconds)
    pub created_at: u64,

    /// Encrypted LOWER/EQUAL/HIGHER result
    pub encrypted_result: CiphertextHandle,
}

impl ComparisonRecord {
    /// Create a new record
    pub fn new(
        id: u64,
        submitter: Address,
        created_at: u64,
        encrypted_result: CiphertextHandle,
    ) -> Self {
        ComparisonRecord {
            id,
            submitter,
            created_at,
            encrypted_result,
        }
    }

    /// Whether this is the zero-value "not found" record
    pub fn is_empty(&self) -> bool {
        self.submitter.is_zero() && self.created_at == 0 && self.encrypted_result.is_zero()
    }
}
