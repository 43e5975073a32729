//! Ciphertext handles and encrypted inputs

use std::fmt::{Debug, Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Opaque reference to an encrypted value held by the FHE runtime
///
/// The handle is not the ciphertext itself; it only names one. The zero
/// handle is the uninitialized value stored in zero-value records.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CiphertextHandle(pub [u8; 32]);

impl CiphertextHandle {
    /// The uninitialized handle
    pub const ZERO: CiphertextHandle = CiphertextHandle([0u8; 32]);

    /// Whether this is the uninitialized handle
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Raw handle bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl Display for CiphertextHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Debug for CiphertextHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "CiphertextHandle(0x{}..)", hex::encode(&self.0[0..4]))
    }
}

impl FromStr for CiphertextHandle {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s.trim_start_matches("0x"))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CoreError::CryptoError("handle must be 32 bytes".to_string()))?;
        Ok(CiphertextHandle(bytes))
    }
}

/// Validity proof attached to an encrypted input
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputProof(pub Vec<u8>);

impl Debug for InputProof {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "InputProof({} bytes)", self.0.len())
    }
}

/// An encrypted input as submitted to an engine: a handle plus its proof
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalInput {
    /// Handle of the encrypted value
    pub handle: CiphertextHandle,

    /// Proof that the value was honestly encrypted for a contract and sender
    pub proof: InputProof,
}

impl ExternalInput {
    /// Pair a handle with its proof
    pub fn new(handle: CiphertextHandle, proof: InputProof) -> Self {
        ExternalInput { handle, proof }
    }
}
