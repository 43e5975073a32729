//! Error types for the client crate

use std::time::Duration;

use sealed_compare_core::CoreError;
use thiserror::Error;
use uuid::Uuid;

/// Client error type
#[derive(Error, Debug)]
pub enum ClientError {
    /// Local failure in encryption, authorization or decryption
    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    /// The ledger included the transaction but the contract rejected it
    #[error("Transaction {tx_id} reverted: {reason}")]
    Reverted {
        /// Ledger transaction id
        tx_id: Uuid,
        /// Contract error
        #[source]
        reason: CoreError,
    },

    /// The wallet refused to sign
    #[error("Wallet rejected the request: {0}")]
    Rejected(String),

    /// The caller cancelled the operation
    #[error("Operation cancelled")]
    Cancelled,

    /// No answer within the allotted time
    #[error("{stage} timed out after {after:?}")]
    Timeout {
        /// Stage that timed out
        stage: &'static str,
        /// Time waited
        after: Duration,
    },

    /// The ledger queue is full
    #[error("Ledger busy: {0} transactions pending")]
    QueueFull(usize),

    /// The ledger stopped before answering
    #[error("Ledger closed")]
    LedgerClosed,

    /// Network or relayer failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClientError {
    /// Whether retrying the same request may succeed
    ///
    /// Timeouts are not transient: the transaction may still be included,
    /// and resubmitting would create a second record.
    pub fn is_transient(&self) -> bool {
        matches!(self, ClientError::QueueFull(_) | ClientError::Transport(_))
    }

    /// Whether the contract or the oracle refused the request
    pub fn is_rejection(&self) -> bool {
        match self {
            ClientError::Reverted { .. } | ClientError::Rejected(_) => true,
            ClientError::Core(e) => e.is_validation() || e.is_authorization(),
            _ => false,
        }
    }
}

/// Result type for the client crate
pub type Result<T> = std::result::Result<T, ClientError>;

/// Convert an error to a Transport error
pub fn to_transport_error<E: std::fmt::Display>(err: E) -> ClientError {
    ClientError::Transport(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ClientError::QueueFull(64).is_transient());
        assert!(to_transport_error("connection reset").is_transient());
        assert!(!ClientError::Cancelled.is_transient());
        let timeout = ClientError::Timeout {
            stage: "confirmation",
            after: Duration::from_secs(1),
        };
        assert!(!timeout.is_transient());
        assert!(!ClientError::Core(CoreError::InvalidId(1)).is_transient());
    }

    #[test]
    fn test_rejection_classification() {
        let reverted = ClientError::Reverted {
            tx_id: Uuid::new_v4(),
            reason: CoreError::GameNotActive(0),
        };
        assert!(reverted.is_rejection());
        assert!(ClientError::Rejected("user denied".into()).is_rejection());
        assert!(ClientError::Core(CoreError::Unauthorized("acl".into())).is_rejection());
        assert!(!ClientError::LedgerClosed.is_rejection());
    }

    #[test]
    fn test_error_display() {
        let err = ClientError::Timeout {
            stage: "confirmation",
            after: Duration::from_secs(60),
        };
        assert_eq!(err.to_string(), "confirmation timed out after 60s");
        assert_eq!(
            ClientError::from(CoreError::InvalidId(7)).to_string(),
            "Core error: Invalid ID: 7"
        );
    }
}
