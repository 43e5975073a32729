//! FHE runtime seam
//!
//! The engines compute on ciphertexts only through [`FheRuntime`]; the
//! decryption oracle additionally needs [`KeyManagement`]. A production
//! deployment binds these to a real FHE coprocessor and key management
//! service. [`LocalFheRuntime`] is an in-process reference runtime with
//! the same observable behavior and no secrecy guarantees.

mod local;

pub use local::{FheType, LocalFheRuntime};

use ethers::types::Address;

use crate::error::Result;
use crate::models::{CiphertextHandle, ExternalInput};

/// Homomorphic operations over 8-bit encrypted integers and encrypted booleans
pub trait FheRuntime: Send + Sync {
    /// Check an input proof for `contract` and `sender`, returning the usable handle
    ///
    /// Fails with `InvalidProof` if the proof was not produced for exactly
    /// this contract and sender.
    fn verify_input(
        &self,
        input: &ExternalInput,
        contract: Address,
        sender: Address,
    ) -> Result<CiphertextHandle>;

    /// Encrypt a public constant
    fn trivial_encrypt(&self, value: u8) -> Result<CiphertextHandle>;

    /// Encrypted `lhs < rhs`
    fn less_than(&self, lhs: &CiphertextHandle, rhs: &CiphertextHandle) -> Result<CiphertextHandle>;

    /// Encrypted `lhs == rhs`
    fn equal(&self, lhs: &CiphertextHandle, rhs: &CiphertextHandle) -> Result<CiphertextHandle>;

    /// Encrypted `if condition { if_true } else { if_false }`
    fn select(
        &self,
        condition: &CiphertextHandle,
        if_true: &CiphertextHandle,
        if_false: &CiphertextHandle,
    ) -> Result<CiphertextHandle>;

    /// Grant `account` the right to have `handle` decrypted
    fn allow(&self, handle: &CiphertextHandle, account: Address) -> Result<()>;

    /// Whether `account` may have `handle` decrypted
    fn is_allowed(&self, handle: &CiphertextHandle, account: Address) -> bool;
}

/// Access to plaintexts, reserved for the decryption oracle
pub trait KeyManagement: Send + Sync {
    /// Decrypt `handle`
    fn decrypt(&self, handle: &CiphertextHandle) -> Result<u8>;
}

/// Encrypted three-way ordering of `lhs` against `rhs`
///
/// Selects the encrypted constant `codes[0]` when `lhs < rhs`, `codes[1]`
/// when equal and `codes[2]` otherwise. Operand values are fixed-width
/// unsigned integers, so exactly one branch holds.
pub fn encrypted_ordering<R: FheRuntime + ?Sized>(
    runtime: &R,
    lhs: &CiphertextHandle,
    rhs: &CiphertextHandle,
    codes: [u8; 3],
) -> Result<CiphertextHandle> {
    let is_lower = runtime.less_than(lhs, rhs)?;
    let is_equal = runtime.equal(lhs, rhs)?;

    let lower = runtime.trivial_encrypt(codes[0])?;
    let equal = runtime.trivial_encrypt(codes[1])?;
    let higher = runtime.trivial_encrypt(codes[2])?;

    let equal_or_higher = runtime.select(&is_equal, &equal, &higher)?;
    runtime.select(&is_lower, &lower, &equal_or_higher)
}
