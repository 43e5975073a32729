//! Transactions, receipts and the in-process ledger
//!
//! [`LocalLedger`] hosts one `NumberCompare` and one `GuessNumber` contract
//! behind a single sequencer task. Transactions are applied strictly in
//! submission order, one per block, and each submitter gets its receipt
//! through a [`PendingTransaction`].

use std::sync::Arc;
use std::time::Duration;

use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, Signature, H256};
use log::{debug, info, warn};
use sealed_compare_core::config::LedgerConfig;
use sealed_compare_core::error::to_crypto_error;
use sealed_compare_core::models::domains;
use sealed_compare_core::{
    crypto, CiphertextHandle, Clock, CoreError, DecryptionAttestation, ExternalInput, FheRuntime,
    GameInfo, GuessNumber, LedgerEvent, NumberCompare, TxContext,
};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::capability::Ledger;
use crate::error::{ClientError, Result};

/// Contract call carried by a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transaction {
    /// `NumberCompare::compare_numbers`
    CompareNumbers {
        /// Encrypted system number
        encrypted_system: ExternalInput,
        /// Encrypted user number
        encrypted_user: ExternalInput,
    },

    /// `GuessNumber::create_game`
    CreateGame {
        /// Encrypted secret
        encrypted_secret: ExternalInput,
    },

    /// `GuessNumber::make_guess`
    MakeGuess {
        /// Game id
        game_id: u64,
        /// Encrypted guess
        encrypted_guess: ExternalInput,
    },

    /// `GuessNumber::claim_win`
    ClaimWin {
        /// Game id
        game_id: u64,
        /// Attested decryption of the latest guess result
        attestation: DecryptionAttestation,
    },

    /// `GuessNumber::end_game`
    EndGame {
        /// Game id
        game_id: u64,
    },
}

impl Transaction {
    /// Short name for log lines
    pub fn name(&self) -> &'static str {
        match self {
            Transaction::CompareNumbers { .. } => "compare_numbers",
            Transaction::CreateGame { .. } => "create_game",
            Transaction::MakeGuess { .. } => "make_guess",
            Transaction::ClaimWin { .. } => "claim_win",
            Transaction::EndGame { .. } => "end_game",
        }
    }

    /// Digest the sender signs
    pub fn digest(&self) -> Result<[u8; 32]> {
        let encoded = serde_json::to_vec(self)?;
        Ok(crypto::secure_hash(domains::TRANSACTION, &encoded))
    }
}

/// Transaction signed by its sender
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    /// Contract call
    pub transaction: Transaction,

    /// Claimed sender
    pub sender: Address,

    /// Sender's signature over the transaction digest
    pub signature: Signature,
}

impl SignedTransaction {
    /// Sign `transaction` with a local account key
    pub fn sign(transaction: Transaction, wallet: &LocalWallet) -> Result<Self> {
        let digest = transaction.digest()?;
        let signature = wallet
            .sign_hash(H256::from(digest))
            .map_err(|e| ClientError::Core(to_crypto_error(e)))?;

        Ok(SignedTransaction {
            transaction,
            sender: wallet.address(),
            signature,
        })
    }

    /// Account that produced the signature
    pub fn recover_sender(&self) -> Result<Address> {
        let digest = self.transaction.digest()?;
        self.signature
            .recover(H256::from(digest))
            .map_err(|e| {
                ClientError::Core(CoreError::Unauthorized(format!(
                    "bad transaction signature: {}",
                    e
                )))
            })
    }
}

/// Value returned by an included transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxOutput {
    /// Id of the new comparison record
    CompareId(u64),

    /// Id of the new game
    GameId(u64),

    /// Encrypted guess result
    GuessResult(CiphertextHandle),

    /// No return value
    Unit,
}

/// Proof of inclusion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Ledger transaction id
    pub tx_id: Uuid,

    /// Block that included the transaction
    pub block_number: u64,

    /// Block timestamp (unix seconds)
    pub timestamp: u64,

    /// Verified sender
    pub sender: Address,

    /// Return value
    pub output: TxOutput,

    /// Events emitted by the transaction
    pub events: Vec<LedgerEvent>,
}

/// A submitted transaction awaiting inclusion
#[derive(Debug)]
pub struct PendingTransaction {
    tx_id: Uuid,
    receiver: Option<oneshot::Receiver<Result<Receipt>>>,
    confirmed: Option<Receipt>,
}

impl PendingTransaction {
    /// Wrap the receiving end of a receipt channel
    pub fn new(tx_id: Uuid, receiver: oneshot::Receiver<Result<Receipt>>) -> Self {
        PendingTransaction {
            tx_id,
            receiver: Some(receiver),
            confirmed: None,
        }
    }

    /// Ledger transaction id
    pub fn tx_id(&self) -> Uuid {
        self.tx_id
    }

    /// Wait until the ledger includes the transaction
    ///
    /// A timeout or cancellation does not withdraw the transaction; it may
    /// still be included, and waiting again picks up its receipt. Once the
    /// receipt arrived, further calls return it immediately.
    pub async fn wait_for_confirmation(
        &mut self,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Receipt> {
        if let Some(receipt) = &self.confirmed {
            return Ok(receipt.clone());
        }

        let outcome = {
            let receiver = self.receiver.as_mut().ok_or(ClientError::LedgerClosed)?;
            tokio::select! {
                _ = cancel.cancelled() => return Err(ClientError::Cancelled),
                outcome = tokio::time::timeout(timeout, receiver) => outcome,
            }
        };

        let received = outcome.map_err(|_| {
            warn!("Transaction {} not confirmed after {:?}", self.tx_id, timeout);
            ClientError::Timeout {
                stage: "confirmation",
                after: timeout,
            }
        })?;
        self.receiver = None;

        let receipt = received.map_err(|_| ClientError::LedgerClosed)??;
        self.confirmed = Some(receipt.clone());
        Ok(receipt)
    }
}

/// Contracts hosted by a ledger
#[derive(Debug)]
pub struct Contracts<R: FheRuntime> {
    /// Comparison contract
    pub compare: Arc<NumberCompare<R>>,

    /// Guessing game contract
    pub game: Arc<GuessNumber<R>>,
}

impl<R: FheRuntime> Clone for Contracts<R> {
    fn clone(&self) -> Self {
        Contracts {
            compare: self.compare.clone(),
            game: self.game.clone(),
        }
    }
}

struct Envelope {
    tx_id: Uuid,
    transaction: SignedTransaction,
    reply: oneshot::Sender<Result<Receipt>>,
}

impl std::fmt::Debug for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Envelope").field("tx_id", &self.tx_id).finish_non_exhaustive()
    }
}

struct Sequencer<R: FheRuntime> {
    contracts: Contracts<R>,
    clock: Arc<dyn Clock>,
    block_time: Duration,
    block_number: u64,
    last_timestamp: u64,
}

impl<R: FheRuntime> Sequencer<R> {
    async fn run(mut self, mut queue: mpsc::Receiver<Envelope>) {
        while let Some(envelope) = queue.recv().await {
            if !self.block_time.is_zero() {
                tokio::time::sleep(self.block_time).await;
            }

            let result = self.apply(envelope.tx_id, envelope.transaction);
            if envelope.reply.send(result).is_err() {
                debug!("Submitter of {} stopped waiting for its receipt", envelope.tx_id);
            }
        }
        info!("Ledger sequencer stopped at block {}", self.block_number);
    }

    fn apply(&mut self, tx_id: Uuid, signed: SignedTransaction) -> Result<Receipt> {
        self.block_number += 1;
        self.last_timestamp = self.clock.now().max(self.last_timestamp);

        let revert = |reason: CoreError| {
            warn!("Transaction {} reverted: {}", tx_id, reason);
            ClientError::Reverted { tx_id, reason }
        };

        let sender = signed.recover_sender().map_err(|e| match e {
            ClientError::Core(reason) => revert(reason),
            other => other,
        })?;
        if sender != signed.sender {
            return Err(revert(CoreError::Unauthorized(format!(
                "signed by {:?}, claims {:?}",
                sender, signed.sender
            ))));
        }

        let ctx = TxContext::new(sender, self.last_timestamp);
        let compare = &self.contracts.compare;
        let game = &self.contracts.game;
        let name = signed.transaction.name();

        let (output, events) = match signed.transaction {
            Transaction::CompareNumbers {
                encrypted_system,
                encrypted_user,
            } => {
                let before = compare.events().len();
                let id = compare
                    .compare_numbers(&ctx, &encrypted_system, &encrypted_user)
                    .map_err(revert)?;
                (TxOutput::CompareId(id), compare.events().since(before))
            }
            Transaction::CreateGame { encrypted_secret } => {
                let before = game.events().len();
                let id = game.create_game(&ctx, &encrypted_secret).map_err(revert)?;
                (TxOutput::GameId(id), game.events().since(before))
            }
            Transaction::MakeGuess {
                game_id,
                encrypted_guess,
            } => {
                let before = game.events().len();
                let handle = game.make_guess(&ctx, game_id, &encrypted_guess).map_err(revert)?;
                (TxOutput::GuessResult(handle), game.events().since(before))
            }
            Transaction::ClaimWin { game_id, attestation } => {
                let before = game.events().len();
                game.claim_win(&ctx, game_id, &attestation).map_err(revert)?;
                (TxOutput::Unit, game.events().since(before))
            }
            Transaction::EndGame { game_id } => {
                let before = game.events().len();
                game.end_game(&ctx, game_id).map_err(revert)?;
                (TxOutput::Unit, game.events().since(before))
            }
        };

        debug!("Block {}: {} {} by {:?}", self.block_number, name, tx_id, sender);

        Ok(Receipt {
            tx_id,
            block_number: self.block_number,
            timestamp: self.last_timestamp,
            sender,
            output,
            events,
        })
    }
}

/// In-process ledger with a single sequencer
#[derive(Debug)]
pub struct LocalLedger<R: FheRuntime> {
    queue: mpsc::Sender<Envelope>,
    capacity: usize,
    contracts: Contracts<R>,
}

impl<R: FheRuntime + 'static> LocalLedger<R> {
    /// Start a sequencer that seals blocks as soon as transactions arrive
    ///
    /// Must be called within a tokio runtime.
    pub fn spawn(contracts: Contracts<R>, clock: Arc<dyn Clock>, config: &LedgerConfig) -> Self {
        Self::with_block_time(contracts, clock, config, Duration::ZERO)
    }

    /// Start a sequencer that waits `block_time` before sealing each block
    pub fn with_block_time(
        contracts: Contracts<R>,
        clock: Arc<dyn Clock>,
        config: &LedgerConfig,
        block_time: Duration,
    ) -> Self {
        let capacity = config.queue_capacity.max(1);
        let (queue, receiver) = mpsc::channel(capacity);

        let sequencer = Sequencer {
            contracts: contracts.clone(),
            clock,
            block_time,
            block_number: 0,
            last_timestamp: 0,
        };
        tokio::spawn(sequencer.run(receiver));
        info!("Ledger started with queue capacity {}", capacity);

        LocalLedger {
            queue,
            capacity,
            contracts,
        }
    }

    /// Hosted contracts
    pub fn contracts(&self) -> &Contracts<R> {
        &self.contracts
    }
}

impl<R: FheRuntime + 'static> Ledger for LocalLedger<R> {
    fn compare_contract(&self) -> Address {
        self.contracts.compare.address()
    }

    fn game_contract(&self) -> Address {
        self.contracts.game.address()
    }

    async fn submit(&self, transaction: SignedTransaction) -> Result<PendingTransaction> {
        let tx_id = Uuid::new_v4();
        let (reply, receiver) = oneshot::channel();

        self.queue
            .try_send(Envelope {
                tx_id,
                transaction,
                reply,
            })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => ClientError::QueueFull(self.capacity),
                mpsc::error::TrySendError::Closed(_) => ClientError::LedgerClosed,
            })?;

        debug!("Queued transaction {}", tx_id);
        Ok(PendingTransaction::new(tx_id, receiver))
    }

    async fn compare_result(&self, compare_id: u64) -> Result<CiphertextHandle> {
        Ok(self.contracts.compare.get_result(compare_id)?)
    }

    async fn guess_result(&self, game_id: u64, player: Address) -> Result<CiphertextHandle> {
        Ok(self.contracts.game.get_guess_result(game_id, player)?)
    }

    async fn game_info(&self, game_id: u64) -> Result<GameInfo> {
        Ok(self.contracts.game.get_game_info(game_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ed25519_dalek::SigningKey;
    use ethers::types::U256;
    use rand::rngs::OsRng;
    use sealed_compare_core::{FixedClock, LocalFheRuntime};

    struct Fixture {
        runtime: Arc<LocalFheRuntime>,
        wallet: LocalWallet,
    }

    impl Fixture {
        fn new() -> Self {
            Fixture {
                runtime: Arc::new(LocalFheRuntime::new()),
                wallet: LocalWallet::new(&mut rand::thread_rng()),
            }
        }

        fn contracts(&self) -> Contracts<LocalFheRuntime> {
            let oracle_key = SigningKey::generate(&mut OsRng).verifying_key();
            Contracts {
                compare: Arc::new(NumberCompare::new(
                    Address::repeat_byte(0xc0),
                    self.runtime.clone(),
                )),
                game: Arc::new(GuessNumber::new(
                    Address::repeat_byte(0x6a),
                    self.runtime.clone(),
                    oracle_key,
                )),
            }
        }

        fn compare_tx(&self, system: u8, user: u8) -> SignedTransaction {
            let contract = Address::repeat_byte(0xc0);
            let sender = self.wallet.address();
            let transaction = Transaction::CompareNumbers {
                encrypted_system: self.runtime.encrypt_input(contract, sender, system).unwrap(),
                encrypted_user: self.runtime.encrypt_input(contract, sender, user).unwrap(),
            };
            SignedTransaction::sign(transaction, &self.wallet).unwrap()
        }
    }

    fn ledger_config() -> LedgerConfig {
        LedgerConfig::default()
    }

    #[test]
    fn test_signature_binds_transaction() {
        let f = Fixture::new();
        let mut signed = f.compare_tx(1, 2);
        assert_eq!(signed.recover_sender().unwrap(), f.wallet.address());

        signed.transaction = Transaction::EndGame { game_id: 0 };
        assert_ne!(signed.recover_sender().ok(), Some(f.wallet.address()));
    }

    #[tokio::test]
    async fn test_transactions_apply_in_order() {
        let f = Fixture::new();
        let ledger =
            LocalLedger::spawn(f.contracts(), Arc::new(FixedClock(1_000)), &ledger_config());
        let cancel = CancellationToken::new();

        let mut pending = Vec::new();
        for i in 0..5u8 {
            pending.push(ledger.submit(f.compare_tx(i, 10)).await.unwrap());
        }

        for (expected, tx) in pending.iter_mut().enumerate() {
            let receipt = tx.wait_for_confirmation(Duration::from_secs(5), &cancel).await.unwrap();
            assert_eq!(receipt.output, TxOutput::CompareId(expected as u64));
            assert_eq!(receipt.block_number, expected as u64 + 1);
            assert_eq!(receipt.timestamp, 1_000);
            assert_eq!(receipt.sender, f.wallet.address());
            assert_eq!(receipt.events.len(), 1);
        }
        assert_eq!(ledger.contracts().compare.compare_counter(), 5);
    }

    #[tokio::test]
    async fn test_rejected_call_reverts() {
        let f = Fixture::new();
        let ledger =
            LocalLedger::spawn(f.contracts(), Arc::new(FixedClock(1_000)), &ledger_config());

        let tx = SignedTransaction::sign(Transaction::EndGame { game_id: 3 }, &f.wallet).unwrap();
        let mut pending = ledger.submit(tx).await.unwrap();
        let err = pending
            .wait_for_confirmation(Duration::from_secs(5), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ClientError::Reverted { reason: CoreError::GameNotActive(3), .. }
        ));
    }

    #[tokio::test]
    async fn test_forged_sender_reverts() {
        let f = Fixture::new();
        let ledger =
            LocalLedger::spawn(f.contracts(), Arc::new(FixedClock(1_000)), &ledger_config());

        let mut tx = f.compare_tx(1, 2);
        tx.sender = Address::repeat_byte(0xee);
        let err = ledger
            .submit(tx)
            .await
            .unwrap()
            .wait_for_confirmation(Duration::from_secs(5), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Reverted { reason: CoreError::Unauthorized(_), .. }));
        assert_eq!(ledger.contracts().compare.compare_counter(), 0);
    }

    #[tokio::test]
    async fn test_unrecoverable_signature_reverts() {
        let f = Fixture::new();
        let ledger =
            LocalLedger::spawn(f.contracts(), Arc::new(FixedClock(1_000)), &ledger_config());
        let cancel = CancellationToken::new();

        let mut tx = f.compare_tx(1, 2);
        tx.signature = Signature {
            r: U256::zero(),
            s: U256::zero(),
            v: 27,
        };
        let err = ledger
            .submit(tx)
            .await
            .unwrap()
            .wait_for_confirmation(Duration::from_secs(5), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Reverted { reason: CoreError::Unauthorized(_), .. }));
        assert_eq!(ledger.contracts().compare.compare_counter(), 0);

        // The rejected transaction still occupied a block
        let receipt = ledger
            .submit(f.compare_tx(1, 2))
            .await
            .unwrap()
            .wait_for_confirmation(Duration::from_secs(5), &cancel)
            .await
            .unwrap();
        assert_eq!(receipt.block_number, 2);
    }

    #[tokio::test]
    async fn test_timeout_then_late_confirmation() {
        let f = Fixture::new();
        let ledger = LocalLedger::with_block_time(
            f.contracts(),
            Arc::new(FixedClock(1_000)),
            &ledger_config(),
            Duration::from_millis(200),
        );
        let cancel = CancellationToken::new();

        let mut pending = ledger.submit(f.compare_tx(1, 2)).await.unwrap();
        let err = pending
            .wait_for_confirmation(Duration::from_millis(10), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Timeout { stage: "confirmation", .. }));

        let receipt = pending.wait_for_confirmation(Duration::from_secs(5), &cancel).await.unwrap();
        assert_eq!(receipt.output, TxOutput::CompareId(0));

        // Confirmed receipts are cached
        let again = pending.wait_for_confirmation(Duration::ZERO, &cancel).await.unwrap();
        assert_eq!(again, receipt);
    }

    #[tokio::test]
    async fn test_cancelled_wait() {
        let f = Fixture::new();
        let ledger = LocalLedger::with_block_time(
            f.contracts(),
            Arc::new(FixedClock(1_000)),
            &ledger_config(),
            Duration::from_secs(60),
        );
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut pending = ledger.submit(f.compare_tx(1, 2)).await.unwrap();
        let err = pending
            .wait_for_confirmation(Duration::from_secs(5), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Cancelled));
    }

    #[tokio::test]
    async fn test_full_queue_pushes_back() {
        let f = Fixture::new();
        let mut config = ledger_config();
        config.queue_capacity = 1;
        let ledger = LocalLedger::with_block_time(
            f.contracts(),
            Arc::new(FixedClock(1_000)),
            &config,
            Duration::from_secs(60),
        );

        let mut results = Vec::new();
        for _ in 0..3 {
            results.push(ledger.submit(f.compare_tx(1, 2)).await);
        }

        assert!(results.iter().any(|r| matches!(r, Err(ClientError::QueueFull(1)))));
    }

    #[tokio::test]
    async fn test_views() {
        let f = Fixture::new();
        let ledger =
            LocalLedger::spawn(f.contracts(), Arc::new(FixedClock(1_000)), &ledger_config());

        assert!(matches!(
            ledger.compare_result(0).await,
            Err(ClientError::Core(CoreError::InvalidId(0)))
        ));
        assert_eq!(ledger.game_info(0).await.unwrap(), GameInfo::default());
        assert_eq!(ledger.compare_contract(), Address::repeat_byte(0xc0));
        assert_eq!(ledger.game_contract(), Address::repeat_byte(0x6a));
    }
}
