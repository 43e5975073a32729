//! Capabilities a client needs from its environment
//!
//! Encryption, decryption, signing and transaction submission are injected
//! into the pipelines through these traits. Each may suspend, and each may be
//! backed by an in-process implementation or by a remote service.

use std::future::Future;

use ethers::types::Address;
use sealed_compare_core::{
    CiphertextHandle, DecryptionAttestation, DecryptionAuthorization, Eip712Domain, ExternalInput,
    GameInfo, SignedAuthorization, UserDecryptRequest,
};

use crate::error::Result;
use crate::ledger::{PendingTransaction, SignedTransaction, Transaction};

/// Encryption input builder
pub trait Encryptor: Send + Sync {
    /// Encrypt `value` for use by `signer` on `contract`
    fn encrypt(
        &self,
        contract: Address,
        signer: Address,
        value: u8,
    ) -> impl Future<Output = Result<ExternalInput>> + Send;
}

/// Decryption oracle access
pub trait Decryptor: Send + Sync {
    /// Domain authorizations must be signed for
    fn domain(&self) -> Eip712Domain;

    /// Plaintext of an authorized handle
    fn decrypt(&self, request: UserDecryptRequest) -> impl Future<Output = Result<u8>> + Send;

    /// Oracle-signed plaintext of an authorized handle
    fn attest(
        &self,
        request: UserDecryptRequest,
    ) -> impl Future<Output = Result<DecryptionAttestation>> + Send;
}

/// Account key holder
///
/// Signing may wait on a human; implementations may fail with `Rejected`.
pub trait WalletSigner: Send + Sync {
    /// Account address
    fn address(&self) -> Address;

    /// Sign a decryption authorization
    fn sign_authorization(
        &self,
        authorization: DecryptionAuthorization,
        domain: &Eip712Domain,
    ) -> impl Future<Output = Result<SignedAuthorization>> + Send;

    /// Sign a ledger transaction
    fn sign_transaction(
        &self,
        transaction: Transaction,
    ) -> impl Future<Output = Result<SignedTransaction>> + Send;
}

/// Ordered ledger hosting the contracts
pub trait Ledger: Send + Sync {
    /// Address of the comparison contract
    fn compare_contract(&self) -> Address;

    /// Address of the guessing game contract
    fn game_contract(&self) -> Address;

    /// Queue a signed transaction for inclusion
    fn submit(
        &self,
        transaction: SignedTransaction,
    ) -> impl Future<Output = Result<PendingTransaction>> + Send;

    /// Encrypted result of comparison `compare_id`
    fn compare_result(
        &self,
        compare_id: u64,
    ) -> impl Future<Output = Result<CiphertextHandle>> + Send;

    /// Encrypted result of `player`'s latest guess in game `game_id`
    fn guess_result(
        &self,
        game_id: u64,
        player: Address,
    ) -> impl Future<Output = Result<CiphertextHandle>> + Send;

    /// Public summary of game `game_id`
    fn game_info(&self, game_id: u64) -> impl Future<Output = Result<GameInfo>> + Send;
}
