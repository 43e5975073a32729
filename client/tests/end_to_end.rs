//! Several clients sharing one in-process deployment

use std::sync::Arc;
use std::time::Duration;

use rstest::rstest;
use sealed_compare_client::{
    ClientError, ComparePipeline, Contracts, GamePipeline, Ledger, LocalLedger, LocalRelayer,
    LocalWalletSigner, Pipeline, PipelineConfig,
};
use sealed_compare_core::models::{CompareOutcome, GuessOutcome};
use sealed_compare_core::{
    Clock, CoreConfig, CoreError, DecryptionOracle, Eip712Domain, GuessNumber, LocalFheRuntime,
    NumberCompare, SystemClock,
};

type LocalPipeline =
    Pipeline<LocalRelayer, LocalRelayer, LocalWalletSigner, LocalLedger<LocalFheRuntime>>;
type LocalCompare =
    ComparePipeline<LocalRelayer, LocalRelayer, LocalWalletSigner, LocalLedger<LocalFheRuntime>>;
type LocalGame =
    GamePipeline<LocalRelayer, LocalRelayer, LocalWalletSigner, LocalLedger<LocalFheRuntime>>;

struct Deployment {
    config: CoreConfig,
    clock: Arc<dyn Clock>,
    relayer: Arc<LocalRelayer>,
    ledger: Arc<LocalLedger<LocalFheRuntime>>,
}

impl Deployment {
    fn new() -> Self {
        let config = CoreConfig::testing();
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let runtime = Arc::new(LocalFheRuntime::new());

        let domain = Eip712Domain::from_config(&config.disclosure, config.engine.chain_id);
        let oracle = Arc::new(DecryptionOracle::new(
            runtime.clone(),
            domain,
            config.disclosure.clone(),
            clock.clone(),
        ));
        let contracts = Contracts {
            compare: Arc::new(NumberCompare::new(config.engine.compare_contract, runtime.clone())),
            game: Arc::new(GuessNumber::new(
                config.engine.game_contract,
                runtime.clone(),
                oracle.verifying_key(),
            )),
        };
        let ledger = Arc::new(LocalLedger::spawn(contracts, clock.clone(), &config.ledger));
        let relayer = Arc::new(LocalRelayer::new(runtime, oracle));

        Deployment {
            config,
            clock,
            relayer,
            ledger,
        }
    }

    fn pipeline(&self, wallet: Arc<LocalWalletSigner>) -> LocalPipeline {
        Pipeline::new(
            self.relayer.clone(),
            self.relayer.clone(),
            wallet,
            self.ledger.clone(),
            self.clock.clone(),
            PipelineConfig::from_core(&self.config),
        )
    }

    fn compare_client(&self) -> LocalCompare {
        ComparePipeline::new(self.pipeline(Arc::new(LocalWalletSigner::random())))
    }

    fn game_client(&self) -> LocalGame {
        GamePipeline::new(self.pipeline(Arc::new(LocalWalletSigner::random())))
    }
}

#[rstest]
#[case(50, 50, CompareOutcome::Equal)]
#[case(90, 10, CompareOutcome::Lower)]
#[case(10, 90, CompareOutcome::Higher)]
#[tokio::test]
async fn test_compare_scenarios(
    #[case] system: u8,
    #[case] user: u8,
    #[case] expected: CompareOutcome,
) {
    let deployment = Deployment::new();
    let client = deployment.compare_client();

    let report = client.compare(system, user).await.unwrap();
    assert_eq!(report.outcome, expected);
    assert_eq!(report.receipt.sender, client.pipeline().account());
}

#[tokio::test]
async fn test_concurrent_clients_get_distinct_records() {
    let deployment = Deployment::new();
    let alice = deployment.compare_client();
    let bob = deployment.compare_client();

    let (a, b) = tokio::join!(alice.compare(1, 2), bob.compare(2, 1));
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_ne!(a.compare_id, b.compare_id);
    assert_eq!(a.outcome, CompareOutcome::Higher);
    assert_eq!(b.outcome, CompareOutcome::Lower);
    assert_eq!(deployment.ledger.contracts().compare.compare_counter(), 2);

    // Bob cannot reveal Alice's record
    let err = bob.reveal(a.compare_id).await.unwrap_err();
    assert!(matches!(err, ClientError::Core(CoreError::Unauthorized(_))));
}

#[tokio::test]
async fn test_game_between_host_and_player() {
    let deployment = Deployment::new();
    let host = deployment.game_client();
    let player = deployment.game_client();

    let id = host.create_game(42).await.unwrap();

    let outcomes = [10, 90, 42];
    let mut seen = Vec::new();
    for value in outcomes {
        seen.push(player.guess(id, value).await.unwrap().outcome);
    }
    assert_eq!(seen, vec![GuessOutcome::TooLow, GuessOutcome::TooHigh, GuessOutcome::Correct]);

    // Only the host may end the game
    let err = player.end_game(id).await.unwrap_err();
    assert!(matches!(err, ClientError::Reverted { reason: CoreError::NotHost { .. }, .. }));

    player.claim_win(id).await.unwrap();
    let info = host.game_info(id).await.unwrap();
    assert!(!info.is_active);
    assert_eq!(info.winner, player.pipeline().account());
    assert_eq!(info.total_guesses, 3);

    let err = host.end_game(id).await.unwrap_err();
    assert!(matches!(err, ClientError::Reverted { reason: CoreError::GameNotActive(_), .. }));

    // Once won, even a non-host sees the game as inactive
    let err = player.end_game(id).await.unwrap_err();
    assert!(matches!(err, ClientError::Reverted { reason: CoreError::GameNotActive(_), .. }));
}

#[tokio::test]
async fn test_host_cannot_claim_without_guessing() {
    let deployment = Deployment::new();
    let host = deployment.game_client();

    let id = host.create_game(7).await.unwrap();
    let err = host.claim_win(id).await.unwrap_err();
    assert!(matches!(err, ClientError::Core(CoreError::NoGuess { .. })));
    assert!(deployment.ledger.game_info(id).await.unwrap().is_active);
}

#[tokio::test]
async fn test_cancellation_mid_flight() {
    let deployment = Deployment::new();
    let client = deployment.compare_client();
    let token = client.pipeline().cancellation_token();
    let cancelled = token.clone();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(1)).await;
        token.cancel();
    });

    // Either the request beat the cancellation or it was cancelled
    match client.compare(3, 4).await {
        Ok(report) => assert_eq!(report.outcome, CompareOutcome::Higher),
        Err(err) => assert!(matches!(err, ClientError::Cancelled)),
    }

    cancelled.cancelled().await;
    assert!(matches!(client.compare(3, 4).await, Err(ClientError::Cancelled)));
}
