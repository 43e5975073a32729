//! In-process reference FHE runtime
//!
//! Ciphertexts are kept as typed plaintexts behind 32-byte handles. Handles
//! are domain-separated hashes of the operation, its operands and a nonce.
//! Input proofs are keyed tags over (handle, contract, sender), checked in
//! constant time. An ACL records which accounts may have a handle decrypted.

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockWriteGuard};

use ethers::types::Address;
use log::{debug, warn};
use rand::RngCore;

use crate::crypto;
use crate::error::{CoreError, Result};
use crate::models::{domains, CiphertextHandle, ExternalInput, InputProof};

use super::{FheRuntime, KeyManagement};

/// Type of an encrypted value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FheType {
    /// Encrypted boolean
    Bool,

    /// Encrypted 8-bit unsigned integer
    Uint8,
}

#[derive(Debug, Clone, Copy)]
struct Ciphertext {
    fhe_type: FheType,
    value: u8,
}

#[derive(Debug, Default)]
struct RuntimeState {
    ciphertexts: HashMap<CiphertextHandle, Ciphertext>,
    acl: HashMap<CiphertextHandle, HashSet<Address>>,
    nonce: u64,
}

impl RuntimeState {
    fn next_nonce(&mut self) -> [u8; 8] {
        self.nonce += 1;
        self.nonce.to_be_bytes()
    }

    fn load(&self, handle: &CiphertextHandle, expected: FheType) -> Result<u8> {
        let ciphertext = self
            .ciphertexts
            .get(handle)
            .ok_or(CoreError::UnknownHandle(*handle))?;

        if ciphertext.fhe_type != expected {
            return Err(CoreError::CryptoError(format!(
                "handle {} holds {:?}, expected {:?}",
                handle, ciphertext.fhe_type, expected
            )));
        }

        Ok(ciphertext.value)
    }

    fn store(
        &mut self,
        op: &str,
        operands: &[CiphertextHandle],
        fhe_type: FheType,
        value: u8,
    ) -> CiphertextHandle {
        let nonce = self.next_nonce();
        let mut parts: Vec<&[u8]> = Vec::with_capacity(operands.len() + 2);
        parts.push(op.as_bytes());
        parts.extend(operands.iter().map(|h| h.0.as_slice()));
        parts.push(&nonce);

        let handle =
            CiphertextHandle(crypto::secure_hash_multiple(domains::COMPUTED_HANDLE, &parts));
        self.ciphertexts.insert(handle, Ciphertext { fhe_type, value });
        handle
    }
}

/// Reference runtime: correct results, no confidentiality
#[derive(Debug)]
pub struct LocalFheRuntime {
    /// Key of the input verifier
    proof_key: [u8; 32],

    state: RwLock<RuntimeState>,
}

impl Default for LocalFheRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalFheRuntime {
    /// Create a runtime with a random input-verifier key
    pub fn new() -> Self {
        let mut proof_key = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut proof_key);
        Self::with_proof_key(proof_key)
    }

    /// Create a runtime with a fixed input-verifier key
    pub fn with_proof_key(proof_key: [u8; 32]) -> Self {
        LocalFheRuntime {
            proof_key,
            state: RwLock::new(RuntimeState::default()),
        }
    }

    fn state(&self) -> RwLockWriteGuard<'_, RuntimeState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn proof_tag(&self, handle: &CiphertextHandle, contract: Address, sender: Address) -> [u8; 32] {
        crypto::secure_hash_multiple(
            domains::INPUT_PROOF,
            &[&self.proof_key, handle.as_bytes(), contract.as_bytes(), sender.as_bytes()],
        )
    }

    /// Encryption input builder: encrypt `value` for use by `sender` on `contract`
    pub fn encrypt_input(
        &self,
        contract: Address,
        sender: Address,
        value: u8,
    ) -> Result<ExternalInput> {
        let mut salt = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut salt);

        let handle = {
            let mut state = self.state();
            let nonce = state.next_nonce();
            let handle = CiphertextHandle(crypto::secure_hash_multiple(
                domains::INPUT_HANDLE,
                &[contract.as_bytes(), sender.as_bytes(), &nonce, &salt],
            ));
            state.ciphertexts.insert(handle, Ciphertext { fhe_type: FheType::Uint8, value });
            handle
        };

        let proof = InputProof(self.proof_tag(&handle, contract, sender).to_vec());
        debug!("Encrypted input {} for contract {:?}", handle, contract);

        Ok(ExternalInput::new(handle, proof))
    }

    /// Number of ciphertexts held
    pub fn ciphertext_count(&self) -> usize {
        self.state().ciphertexts.len()
    }
}

impl FheRuntime for LocalFheRuntime {
    fn verify_input(
        &self,
        input: &ExternalInput,
        contract: Address,
        sender: Address,
    ) -> Result<CiphertextHandle> {
        let expected = self.proof_tag(&input.handle, contract, sender);
        if !crypto::verify_hash(&expected, &input.proof.0) {
            warn!("Rejected input {} from {:?}: proof mismatch", input.handle, sender);
            return Err(CoreError::InvalidProof(format!(
                "proof for {} is not valid for sender {:?} on contract {:?}",
                input.handle, sender, contract
            )));
        }

        let state = self.state();
        match state.ciphertexts.get(&input.handle) {
            Some(ct) if ct.fhe_type == FheType::Uint8 => Ok(input.handle),
            _ => Err(CoreError::InvalidProof(format!(
                "no encrypted input behind {}",
                input.handle
            ))),
        }
    }

    fn trivial_encrypt(&self, value: u8) -> Result<CiphertextHandle> {
        Ok(self.state().store("trivial", &[], FheType::Uint8, value))
    }

    fn less_than(
        &self,
        lhs: &CiphertextHandle,
        rhs: &CiphertextHandle,
    ) -> Result<CiphertextHandle> {
        let mut state = self.state();
        let a = state.load(lhs, FheType::Uint8)?;
        let b = state.load(rhs, FheType::Uint8)?;
        Ok(state.store("lt", &[*lhs, *rhs], FheType::Bool, u8::from(a < b)))
    }

    fn equal(&self, lhs: &CiphertextHandle, rhs: &CiphertextHandle) -> Result<CiphertextHandle> {
        let mut state = self.state();
        let a = state.load(lhs, FheType::Uint8)?;
        let b = state.load(rhs, FheType::Uint8)?;
        Ok(state.store("eq", &[*lhs, *rhs], FheType::Bool, u8::from(a == b)))
    }

    fn select(
        &self,
        condition: &CiphertextHandle,
        if_true: &CiphertextHandle,
        if_false: &CiphertextHandle,
    ) -> Result<CiphertextHandle> {
        let mut state = self.state();
        let cond = state.load(condition, FheType::Bool)?;
        let a = state.load(if_true, FheType::Uint8)?;
        let b = state.load(if_false, FheType::Uint8)?;
        let value = if cond != 0 { a } else { b };
        Ok(state.store("select", &[*condition, *if_true, *if_false], FheType::Uint8, value))
    }

    fn allow(&self, handle: &CiphertextHandle, account: Address) -> Result<()> {
        let mut state = self.state();
        if !state.ciphertexts.contains_key(handle) {
            return Err(CoreError::UnknownHandle(*handle));
        }
        state.acl.entry(*handle).or_default().insert(account);
        Ok(())
    }

    fn is_allowed(&self, handle: &CiphertextHandle, account: Address) -> bool {
        self.state()
            .acl
            .get(handle)
            .map(|accounts| accounts.contains(&account))
            .unwrap_or(false)
    }
}

impl KeyManagement for LocalFheRuntime {
    fn decrypt(&self, handle: &CiphertextHandle) -> Result<u8> {
        self.state()
            .ciphertexts
            .get(handle)
            .map(|ct| ct.value)
            .ok_or(CoreError::UnknownHandle(*handle))
    }
}
