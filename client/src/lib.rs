//! Client library for Sealed Compare
//!
//! This library drives requests against the comparison and guessing game
//! contracts: encrypting inputs, submitting signed transactions to a ledger,
//! waiting for inclusion and decrypting results through the oracle.
//! Capabilities are injected through the traits in [`capability`]; the
//! `Local*` types implement them in-process.

pub mod capability;
pub mod error;
pub mod ledger;
pub mod pipeline;
pub mod relayer;
pub mod retry;
pub mod wallet;

pub use capability::{Decryptor, Encryptor, Ledger, WalletSigner};
pub use error::{ClientError, Result};
pub use ledger::{
    Contracts, LocalLedger, PendingTransaction, Receipt, SignedTransaction, Transaction, TxOutput,
};
pub use pipeline::{
    ComparePipeline, CompareReport, GamePipeline, GuessReport, Pipeline, PipelineConfig,
    PipelineStage,
};
pub use relayer::LocalRelayer;
pub use tokio_util::sync::CancellationToken;
pub use wallet::{Approval, LocalWalletSigner};
