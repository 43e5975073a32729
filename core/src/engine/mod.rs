//! Contract engines
//!
//! [`NumberCompare`] stores encrypted comparisons of two submitted numbers;
//! [`GuessNumber`] runs guessing games against an encrypted secret. Both
//! compute only on handles through the FHE runtime and never see plaintext.
//! Mutations are driven by a [`TxContext`] supplied by the ledger that
//! orders them.

mod compare;
mod events;
mod game;

pub use compare::{NumberCompare, RESULT_EQUAL, RESULT_HIGHER, RESULT_LOWER};
pub use events::{EventLog, LedgerEvent};
pub use game::{GuessNumber, RESULT_CORRECT, RESULT_TOO_HIGH, RESULT_TOO_LOW};

use ethers::types::Address;
use serde::{Deserialize, Serialize};

/// Execution context of one ledger transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxContext {
    /// Account that sent the transaction
    pub sender: Address,

    /// Timestamp of the block including the transaction (unix seconds)
    pub timestamp: u64,
}

impl TxContext {
    /// Create a context
    pub fn new(sender: Address, timestamp: u64) -> Self {
        TxContext { sender, timestamp }
    }
}
