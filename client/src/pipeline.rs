//! Client pipelines
//!
//! Every request runs the same sequence: encrypt the inputs, sign and submit
//! the transaction, wait for inclusion, then authorize and decrypt the result.
//! Each suspension point honors the pipeline's [`CancellationToken`] and a
//! timeout, and progress is published on a `watch` channel.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use ethers::types::Address;
use log::{debug, info, warn};
use sealed_compare_core::models::{CompareOutcome, GuessOutcome};
use sealed_compare_core::utils::Timer;
use sealed_compare_core::{
    CiphertextHandle, Clock, CoreConfig, DecryptionAttestation, DecryptionAuthorization,
    EphemeralKeypair, ExternalInput, GameInfo, LedgerEvent, SignedAuthorization, UserDecryptRequest,
};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::capability::{Decryptor, Encryptor, Ledger, WalletSigner};
use crate::error::{ClientError, Result};
use crate::ledger::{Receipt, Transaction, TxOutput};
use crate::retry::retry_with_backoff;

/// Progress of the current request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineStage {
    /// Nothing started yet
    #[default]
    Idle,

    /// Encrypting inputs
    Encrypting,

    /// Signing and submitting the transaction
    Submitting,

    /// Waiting for ledger inclusion
    Confirming,

    /// Signing a decryption authorization
    AuthorizingDecryption,

    /// Waiting for the oracle
    Decrypting,

    /// Finished successfully
    Done,

    /// Finished with an error
    Failed,
}

/// Timeouts and retry policy of a pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Wait for ledger inclusion
    pub confirmation_timeout: Duration,

    /// Wait for the wallet
    pub wallet_timeout: Duration,

    /// Retries of transient submission failures
    pub max_retries: usize,

    /// Backoff before the first retry
    pub initial_backoff: Duration,

    /// Validity of decryption authorizations
    pub authorization_days: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_core(&CoreConfig::default())
    }
}

impl PipelineConfig {
    /// Take the ledger and disclosure sections of a core configuration
    pub fn from_core(config: &CoreConfig) -> Self {
        PipelineConfig {
            confirmation_timeout: config.ledger.confirmation_timeout,
            wallet_timeout: config.ledger.wallet_timeout,
            max_retries: config.ledger.max_retries,
            initial_backoff: config.ledger.initial_backoff,
            authorization_days: config.disclosure.default_duration_days,
        }
    }
}

struct DecryptionSession {
    keypair: EphemeralKeypair,
    authorization: SignedAuthorization,
}

/// Shared machinery of the compare and game pipelines
pub struct Pipeline<E, D, W, L> {
    encryptor: Arc<E>,
    decryptor: Arc<D>,
    wallet: Arc<W>,
    ledger: Arc<L>,
    clock: Arc<dyn Clock>,
    config: PipelineConfig,
    cancel: CancellationToken,
    stage: watch::Sender<PipelineStage>,

    /// Authorizations still valid, by contract
    sessions: Mutex<HashMap<Address, Arc<DecryptionSession>>>,
}

impl<E, D, W, L> std::fmt::Debug for Pipeline<E, D, W, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("stage", &*self.stage.borrow())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl<E, D, W, L> Pipeline<E, D, W, L>
where
    E: Encryptor,
    D: Decryptor,
    W: WalletSigner,
    L: Ledger,
{
    /// Assemble a pipeline from its capabilities
    pub fn new(
        encryptor: Arc<E>,
        decryptor: Arc<D>,
        wallet: Arc<W>,
        ledger: Arc<L>,
        clock: Arc<dyn Clock>,
        config: PipelineConfig,
    ) -> Self {
        let (stage, _) = watch::channel(PipelineStage::Idle);
        Pipeline {
            encryptor,
            decryptor,
            wallet,
            ledger,
            clock,
            config,
            cancel: CancellationToken::new(),
            stage,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Account requests are made from
    pub fn account(&self) -> Address {
        self.wallet.address()
    }

    /// Ledger requests are submitted to
    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Progress updates
    pub fn subscribe(&self) -> watch::Receiver<PipelineStage> {
        self.stage.subscribe()
    }

    /// Current stage
    pub fn stage(&self) -> PipelineStage {
        *self.stage.borrow()
    }

    /// Token that cancels every pending and future wait of this pipeline
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel the pipeline
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Contracts with a live decryption authorization
    pub fn authorized_contracts(&self) -> Vec<Address> {
        let now = self.clock.now();
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(_, session)| session.authorization.authorization.is_valid_at(now))
            .map(|(contract, _)| *contract)
            .collect()
    }

    fn set_stage(&self, stage: PipelineStage) {
        debug!("Pipeline stage: {:?}", stage);
        self.stage.send_replace(stage);
    }

    async fn guard<T>(&self, operation: impl Future<Output = Result<T>>) -> Result<T> {
        if self.cancel.is_cancelled() {
            return Err(ClientError::Cancelled);
        }
        tokio::select! {
            _ = self.cancel.cancelled() => Err(ClientError::Cancelled),
            result = operation => result,
        }
    }

    async fn wallet_call<T>(&self, operation: impl Future<Output = Result<T>>) -> Result<T> {
        let timeout = self.config.wallet_timeout;
        self.guard(async move {
            tokio::time::timeout(timeout, operation)
                .await
                .map_err(|_| ClientError::Timeout { stage: "wallet", after: timeout })?
        })
        .await
    }

    async fn track<T>(&self, request: impl Future<Output = Result<T>>) -> Result<T> {
        let result = request.await;
        match &result {
            Ok(_) => self.set_stage(PipelineStage::Done),
            Err(e) => {
                warn!("Request failed: {}", e);
                self.set_stage(PipelineStage::Failed);
            }
        }
        result
    }

    async fn encrypt(&self, contract: Address, value: u8) -> Result<ExternalInput> {
        self.set_stage(PipelineStage::Encrypting);
        self.guard(self.encryptor.encrypt(contract, self.wallet.address(), value))
            .await
    }

    /// Sign, submit and wait for inclusion of `transaction`
    async fn execute(&self, transaction: Transaction) -> Result<Receipt> {
        self.set_stage(PipelineStage::Submitting);
        let name = transaction.name();
        let signed = self.wallet_call(self.wallet.sign_transaction(transaction)).await?;

        let mut timer = Timer::new(name)
            .with_warning_threshold(self.config.confirmation_timeout / 2)
            .with_error_threshold(self.config.confirmation_timeout)
            .without_auto_log();
        let mut pending = self
            .guard(retry_with_backoff(
                || self.ledger.submit(signed.clone()),
                self.config.max_retries,
                self.config.initial_backoff,
            ))
            .await?;
        timer.checkpoint(format!("submitted {}", pending.tx_id()));

        self.set_stage(PipelineStage::Confirming);
        let receipt = pending
            .wait_for_confirmation(self.config.confirmation_timeout, &self.cancel)
            .await?;
        timer.log(format!("confirmed {}", receipt.tx_id));
        info!("{} included in block {}", name, receipt.block_number);

        Ok(receipt)
    }

    async fn session(&self, contract: Address) -> Result<Arc<DecryptionSession>> {
        let now = self.clock.now();
        let cached = {
            let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
            sessions.retain(|_, session| session.authorization.authorization.is_valid_at(now));
            sessions.get(&contract).cloned()
        };
        if let Some(session) = cached {
            return Ok(session);
        }

        self.set_stage(PipelineStage::AuthorizingDecryption);
        let keypair = EphemeralKeypair::generate();
        let authorization = DecryptionAuthorization::new(
            keypair.public_key(),
            vec![contract],
            now,
            self.config.authorization_days,
        );
        let domain = self.decryptor.domain();
        let authorization = self
            .wallet_call(self.wallet.sign_authorization(authorization, &domain))
            .await?;

        let session = Arc::new(DecryptionSession { keypair, authorization });
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(contract, session.clone());

        Ok(session)
    }

    async fn request(
        &self,
        handle: CiphertextHandle,
        contract: Address,
    ) -> Result<UserDecryptRequest> {
        let session = self.session(contract).await?;
        self.set_stage(PipelineStage::Decrypting);
        Ok(UserDecryptRequest::new(
            handle,
            contract,
            &session.keypair,
            session.authorization.clone(),
        ))
    }

    /// Decrypt a handle the account may read
    pub async fn decrypt(&self, handle: CiphertextHandle, contract: Address) -> Result<u8> {
        let request = self.request(handle, contract).await?;
        self.guard(self.decryptor.decrypt(request)).await
    }

    async fn attest(
        &self,
        handle: CiphertextHandle,
        contract: Address,
    ) -> Result<DecryptionAttestation> {
        let request = self.request(handle, contract).await?;
        self.guard(self.decryptor.attest(request)).await
    }
}

fn unexpected(receipt: &Receipt, expected: &str) -> ClientError {
    ClientError::Transport(format!(
        "receipt {} carries {:?}, expected {}",
        receipt.tx_id, receipt.output, expected
    ))
}

/// Outcome of a comparison request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompareReport {
    /// Record id
    pub compare_id: u64,

    /// Decrypted ordering of the user number against the system number
    pub outcome: CompareOutcome,

    /// Inclusion receipt
    pub receipt: Receipt,
}

/// Comparison requests against `NumberCompare`
#[derive(Debug)]
pub struct ComparePipeline<E, D, W, L> {
    pipeline: Pipeline<E, D, W, L>,
}

impl<E, D, W, L> ComparePipeline<E, D, W, L>
where
    E: Encryptor,
    D: Decryptor,
    W: WalletSigner,
    L: Ledger,
{
    /// Wrap a pipeline
    pub fn new(pipeline: Pipeline<E, D, W, L>) -> Self {
        ComparePipeline { pipeline }
    }

    /// Underlying pipeline
    pub fn pipeline(&self) -> &Pipeline<E, D, W, L> {
        &self.pipeline
    }

    /// Compare `user` against `system` and reveal the result
    pub async fn compare(&self, system: u8, user: u8) -> Result<CompareReport> {
        let p = &self.pipeline;
        p.track(async {
            let contract = p.ledger.compare_contract();
            let encrypted_system = p.encrypt(contract, system).await?;
            let encrypted_user = p.encrypt(contract, user).await?;

            let receipt = p
                .execute(Transaction::CompareNumbers {
                    encrypted_system,
                    encrypted_user,
                })
                .await?;
            let compare_id = match receipt.output {
                TxOutput::CompareId(id) => id,
                _ => return Err(unexpected(&receipt, "a compare id")),
            };

            let outcome = self.decrypt_result(compare_id).await?;
            info!("Comparison {}: {}", compare_id, outcome);

            Ok(CompareReport {
                compare_id,
                outcome,
                receipt,
            })
        })
        .await
    }

    /// Reveal a stored comparison made from this account
    pub async fn reveal(&self, compare_id: u64) -> Result<CompareOutcome> {
        self.pipeline.track(self.decrypt_result(compare_id)).await
    }

    async fn decrypt_result(&self, compare_id: u64) -> Result<CompareOutcome> {
        let p = &self.pipeline;
        let handle = p.ledger.compare_result(compare_id).await?;
        let plaintext = p.decrypt(handle, p.ledger.compare_contract()).await?;
        Ok(CompareOutcome::try_from(plaintext)?)
    }
}

/// Outcome of a guess
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuessReport {
    /// Game id
    pub game_id: u64,

    /// Player's guess count after this guess
    pub guess_number: u64,

    /// Encrypted result
    pub handle: CiphertextHandle,

    /// Decrypted result
    pub outcome: GuessOutcome,
}

/// Guessing game requests against `GuessNumber`
#[derive(Debug)]
pub struct GamePipeline<E, D, W, L> {
    pipeline: Pipeline<E, D, W, L>,
}

impl<E, D, W, L> GamePipeline<E, D, W, L>
where
    E: Encryptor,
    D: Decryptor,
    W: WalletSigner,
    L: Ledger,
{
    /// Wrap a pipeline
    pub fn new(pipeline: Pipeline<E, D, W, L>) -> Self {
        GamePipeline { pipeline }
    }

    /// Underlying pipeline
    pub fn pipeline(&self) -> &Pipeline<E, D, W, L> {
        &self.pipeline
    }

    /// Host a game around `secret`
    pub async fn create_game(&self, secret: u8) -> Result<u64> {
        let p = &self.pipeline;
        p.track(async {
            let encrypted_secret = p.encrypt(p.ledger.game_contract(), secret).await?;
            let receipt = p.execute(Transaction::CreateGame { encrypted_secret }).await?;
            match receipt.output {
                TxOutput::GameId(id) => Ok(id),
                _ => Err(unexpected(&receipt, "a game id")),
            }
        })
        .await
    }

    /// Guess `value` in game `game_id` and reveal the result
    pub async fn guess(&self, game_id: u64, value: u8) -> Result<GuessReport> {
        let p = &self.pipeline;
        p.track(async {
            let contract = p.ledger.game_contract();
            let encrypted_guess = p.encrypt(contract, value).await?;
            let receipt = p
                .execute(Transaction::MakeGuess {
                    game_id,
                    encrypted_guess,
                })
                .await?;

            let handle = match receipt.output {
                TxOutput::GuessResult(handle) => handle,
                _ => return Err(unexpected(&receipt, "a guess result")),
            };
            let guess_number = receipt
                .events
                .iter()
                .find_map(|event| match event {
                    LedgerEvent::GuessMade { guess_number, .. } => Some(*guess_number),
                    _ => None,
                })
                .ok_or_else(|| unexpected(&receipt, "a GuessMade event"))?;

            let outcome = GuessOutcome::try_from(p.decrypt(handle, contract).await?)?;
            info!("Game {}: guess #{} is {}", game_id, guess_number, outcome);

            Ok(GuessReport {
                game_id,
                guess_number,
                handle,
                outcome,
            })
        })
        .await
    }

    /// Claim game `game_id` with this account's latest guess
    pub async fn claim_win(&self, game_id: u64) -> Result<Receipt> {
        let p = &self.pipeline;
        p.track(async {
            let contract = p.ledger.game_contract();
            let handle = p.ledger.guess_result(game_id, p.account()).await?;
            let attestation = p.attest(handle, contract).await?;
            p.execute(Transaction::ClaimWin { game_id, attestation }).await
        })
        .await
    }

    /// End game `game_id`; host only
    pub async fn end_game(&self, game_id: u64) -> Result<Receipt> {
        let p = &self.pipeline;
        p.track(p.execute(Transaction::EndGame { game_id })).await
    }

    /// Public summary of game `game_id`
    pub async fn game_info(&self, game_id: u64) -> Result<GameInfo> {
        self.pipeline.ledger.game_info(game_id).await
    }
}
