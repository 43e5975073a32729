use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::{info, warn};
use sealed_compare_client::{
    ComparePipeline, Contracts, GamePipeline, LocalLedger, LocalRelayer, LocalWalletSigner,
    Pipeline, PipelineConfig,
};
use sealed_compare_core::models::GuessOutcome;
use sealed_compare_core::{
    Clock, CoreConfig, DecryptionOracle, Eip712Domain, GuessNumber, LocalFheRuntime, NumberCompare,
    SystemClock,
};

type LocalPipeline =
    Pipeline<LocalRelayer, LocalRelayer, LocalWalletSigner, LocalLedger<LocalFheRuntime>>;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Encrypted number comparison and guessing game runner")]
struct Args {
    /// Config file path
    #[clap(short, long, env = "SEALED_COMPARE_CONFIG", global = true)]
    config: Option<String>,

    /// Configuration preset used when no file is given
    #[clap(
        long,
        env = "SEALED_COMPARE_PRESET",
        value_enum,
        default_value = "development",
        global = true
    )]
    preset: Preset,

    /// Delay before sealing each block, in milliseconds
    #[clap(long, env = "BLOCK_TIME_MS", global = true)]
    block_time_ms: Option<u64>,

    /// Confirmation timeout, in milliseconds
    #[clap(long, env = "CONFIRMATION_TIMEOUT_MS", global = true)]
    confirmation_timeout_ms: Option<u64>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compare a user number against a system number
    Compare {
        /// Number held by the system
        #[clap(long)]
        system: u8,

        /// Number supplied by the user
        #[clap(long)]
        user: u8,
    },

    /// Host a game and play guesses against it
    Game {
        /// Secret the host encrypts
        #[clap(long)]
        secret: u8,

        /// Guesses made in order until one is correct
        #[clap(long, num_args = 1.., required = true)]
        guesses: Vec<u8>,
    },

    /// Print the effective configuration, optionally writing it to a file
    Config {
        /// Output path
        #[clap(long)]
        write: Option<String>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Preset {
    Development,
    Production,
    Testing,
}

impl Preset {
    fn config(self) -> CoreConfig {
        match self {
            Preset::Development => CoreConfig::development(),
            Preset::Production => CoreConfig::production(),
            Preset::Testing => CoreConfig::testing(),
        }
    }
}

fn load_config(args: &Args) -> Result<CoreConfig> {
    let mut config = match &args.config {
        Some(path) => CoreConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path))?,
        None => args.preset.config(),
    };

    if let Some(ms) = args.confirmation_timeout_ms {
        config.ledger.confirmation_timeout = Duration::from_millis(ms);
    }

    config.validate()?;
    Ok(config)
}

/// In-process deployment of both contracts behind one ledger
struct Deployment {
    config: CoreConfig,
    clock: Arc<dyn Clock>,
    relayer: Arc<LocalRelayer>,
    ledger: Arc<LocalLedger<LocalFheRuntime>>,
}

impl Deployment {
    fn start(config: CoreConfig, block_time: Duration) -> Self {
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
        let ledger = Arc::new(LocalLedger::with_block_time(
            contracts,
            clock.clone(),
            &config.ledger,
            block_time,
        ));
        let relayer = Arc::new(LocalRelayer::new(runtime, oracle));

        Deployment {
            config,
            clock,
            relayer,
            ledger,
        }
    }

    fn pipeline(&self) -> LocalPipeline {
        Pipeline::new(
            self.relayer.clone(),
            self.relayer.clone(),
            Arc::new(LocalWalletSigner::random()),
            self.ledger.clone(),
            self.clock.clone(),
            PipelineConfig::from_core(&self.config),
        )
    }
}

async fn run_compare(deployment: &Deployment, system: u8, user: u8) -> Result<()> {
    let client = ComparePipeline::new(deployment.pipeline());
    let report = client.compare(system, user).await?;

    info!(
        "Comparison {} included in block {} for {:?}",
        report.compare_id,
        report.receipt.block_number,
        report.receipt.sender
    );
    println!("compare #{}: {}", report.compare_id, report.outcome);
    Ok(())
}

async fn run_game(deployment: &Deployment, secret: u8, guesses: &[u8]) -> Result<()> {
    let host = GamePipeline::new(deployment.pipeline());
    let player = GamePipeline::new(deployment.pipeline());

    let game_id = host.create_game(secret).await?;
    println!("game #{} hosted by {:?}", game_id, host.pipeline().account());

    for &value in guesses {
        let report = player.guess(game_id, value).await?;
        println!("guess {} ({}): {}", report.guess_number, value, report.outcome);

        if report.outcome == GuessOutcome::Correct {
            player.claim_win(game_id).await?;
            let game = host.game_info(game_id).await?;
            println!("winner {:?} after {} guesses", game.winner, game.total_guesses);
            return Ok(());
        }
    }

    warn!("No correct guess in {} attempts, ending game {}", guesses.len(), game_id);
    host.end_game(game_id).await?;
    bail!("game #{} ended without a winner", game_id)
}

fn run_config(config: &CoreConfig, write: Option<&str>) -> Result<()> {
    if let Some(path) = write {
        config.to_file(path)?;
        info!("Configuration written to {}", path);
    }
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let config = load_config(&args)?;

    env_logger::init_from_env(
        env_logger::Env::default()
            .filter_or(env_logger::DEFAULT_FILTER_ENV, config.log_level.as_str()),
    );

    match &args.command {
        Command::Config { write } => run_config(&config, write.as_deref()),
        Command::Compare { system, user } => {
            let deployment = Deployment::start(config, block_time(&args));
            run_compare(&deployment, *system, *user).await
        }
        Command::Game { secret, guesses } => {
            let deployment = Deployment::start(config, block_time(&args));
            run_game(&deployment, *secret, guesses).await
        }
    }
}

fn block_time(args: &Args) -> Duration {
    Duration::from_millis(args.block_time_ms.unwrap_or(0))
}
