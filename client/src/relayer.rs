//! In-process relayer
//!
//! Serves encryption and decryption from a [`LocalFheRuntime`] and its
//! decryption oracle. A remote relayer would implement the same traits over
//! the network.

use std::sync::Arc;

use ethers::types::Address;
use sealed_compare_core::{
    DecryptionAttestation, DecryptionOracle, Eip712Domain, ExternalInput, LocalFheRuntime,
    UserDecryptRequest,
};

use crate::capability::{Decryptor, Encryptor};
use crate::error::Result;

/// Relayer backed by the reference runtime
#[derive(Debug, Clone)]
pub struct LocalRelayer {
    runtime: Arc<LocalFheRuntime>,
    oracle: Arc<DecryptionOracle<LocalFheRuntime>>,
}

impl LocalRelayer {
    /// Serve `runtime` and `oracle`
    pub fn new(
        runtime: Arc<LocalFheRuntime>,
        oracle: Arc<DecryptionOracle<LocalFheRuntime>>,
    ) -> Self {
        LocalRelayer { runtime, oracle }
    }

    /// Oracle behind this relayer
    pub fn oracle(&self) -> &DecryptionOracle<LocalFheRuntime> {
        &self.oracle
    }
}

impl Encryptor for LocalRelayer {
    async fn encrypt(
        &self,
        contract: Address,
        signer: Address,
        value: u8,
    ) -> Result<ExternalInput> {
        Ok(self.runtime.encrypt_input(contract, signer, value)?)
    }
}

impl Decryptor for LocalRelayer {
    fn domain(&self) -> Eip712Domain {
        self.oracle.domain().clone()
    }

    async fn decrypt(&self, request: UserDecryptRequest) -> Result<u8> {
        Ok(self.oracle.user_decrypt(&request)?)
    }

    async fn attest(&self, request: UserDecryptRequest) -> Result<DecryptionAttestation> {
        Ok(self.oracle.attest_decryption(&request)?)
    }
}
