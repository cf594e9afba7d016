use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use ft_engine::{measure, PoolConfig, TrialRunner};
use ft_optimizer::{
    CandidateFailurePolicy, OptimizationConfig, ParameterOptimizer, StrategyKind, TrialEvaluator,
};
use ft_store::{
    load_clock_declarations, render_frequencies, render_statistics, ArtifactStore,
    OptimizationReport, ARGS_FILE_NAME, CLOCKS_FILE_NAME,
};
use ft_types::{clock_report, SearchSpace, ToolConfig, DEFAULT_PROGRAM};

/// Measure and tune the achievable clock frequencies of an iCE40 design
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Route the design repeatedly and print per-clock statistics
    Stats {
        #[command(flatten)]
        tool: ToolArgs,

        /// Number of independent trials
        #[arg(short, long, default_value = "16")]
        trials: usize,

        /// Persisted tuning (defaults to <PROJECT>/NextpnrArgs.json)
        #[arg(long)]
        args: Option<PathBuf>,
    },

    /// Search for the placer tuning that best meets a target frequency
    Optimize {
        #[command(flatten)]
        tool: ToolArgs,

        /// Tracked clock declaration (defaults to <PROJECT>/Clocks.json)
        #[arg(long)]
        clocks: Option<PathBuf>,

        /// Target frequency for every tracked clock, in MHz
        #[arg(long)]
        target: f64,

        /// Number of propose/evaluate rounds
        #[arg(short, long, default_value = "10")]
        iterations: usize,

        /// Candidates per round (defaults to the worker count)
        #[arg(short, long)]
        batch: Option<usize>,

        /// Where to write the winning tuning (defaults to <PROJECT>/NextpnrArgs.json)
        #[arg(short, long)]
        out: Option<PathBuf>,

        #[arg(long, value_enum, default_value = "bayesian")]
        strategy: StrategyArg,

        /// What a failed candidate does to the run
        #[arg(long, value_enum, default_value = "abort")]
        on_failure: FailureArg,

        /// Seed for candidate selection
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Route once with the persisted tuning and write the routed design
    Route {
        #[command(flatten)]
        tool: ToolArgs,

        /// Persisted tuning (defaults to <PROJECT>/NextpnrArgs.json)
        #[arg(long)]
        args: Option<PathBuf>,

        /// Output path for the placed-and-routed design
        #[arg(long)]
        asc: PathBuf,
    },
}

/// How to reach the design and run the tool.
#[derive(Args)]
struct ToolArgs {
    /// Device family, e.g. hx1k or hx8k
    device: String,

    /// Device package, e.g. tq144, bg121:4k or ct256
    package: String,

    /// Project directory containing Synth/Top.json
    project: PathBuf,

    /// Synthesized netlist (defaults to <PROJECT>/Synth/Top.json)
    #[arg(long)]
    netlist: Option<PathBuf>,

    /// Pin constraint file
    #[arg(long, default_value = "Pins.pcf")]
    pcf: PathBuf,

    /// Per-attempt timeout in seconds
    #[arg(long, default_value_t = ft_types::DEFAULT_TIMEOUT_SECS)]
    timeout: u64,

    /// Attempts per trial before a timeout is fatal (0 retries forever)
    #[arg(long, default_value_t = ft_types::DEFAULT_MAX_ATTEMPTS)]
    max_attempts: u32,

    /// Concurrent tool processes (defaults to available parallelism)
    #[arg(short, long)]
    workers: Option<usize>,
}

impl ToolArgs {
    fn tool_config(&self) -> Result<ToolConfig> {
        let program =
            std::env::var("FMAXTUNE_NEXTPNR").unwrap_or_else(|_| DEFAULT_PROGRAM.to_string());
        let netlist = self
            .netlist
            .clone()
            .unwrap_or_else(|| self.project.join("Synth").join("Top.json"));
        let max_attempts = (self.max_attempts > 0).then_some(self.max_attempts);

        let config = ToolConfig::new(&self.device, &self.package, netlist, &self.pcf)
            .with_program(program)
            .with_timeout_secs(self.timeout)
            .with_max_attempts(max_attempts);
        config.validate().context("invalid tool configuration")?;
        Ok(config)
    }

    fn pool(&self) -> PoolConfig {
        self.workers.map(PoolConfig::new).unwrap_or_default()
    }

    fn store(&self, path: Option<PathBuf>) -> ArtifactStore {
        ArtifactStore::new(path.unwrap_or_else(|| self.project.join(ARGS_FILE_NAME)))
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    Bayesian,
    Random,
}

impl From<StrategyArg> for StrategyKind {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Bayesian => StrategyKind::Bayesian,
            StrategyArg::Random => StrategyKind::Random,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum FailureArg {
    /// Stop the run
    Abort,
    /// Score the candidate as worst possible and continue
    WorstScore,
}

impl From<FailureArg> for CandidateFailurePolicy {
    fn from(arg: FailureArg) -> Self {
        match arg {
            FailureArg::Abort => CandidateFailurePolicy::Abort,
            FailureArg::WorstScore => CandidateFailurePolicy::WorstScore,
        }
    }
}

/// The persisted tuning, or the stock one if nothing was saved yet.
fn load_tuning(store: &ArtifactStore) -> Result<Vec<String>> {
    let loaded = store
        .load_args()
        .with_context(|| format!("reading tuning from {}", store.path().display()))?;
    match loaded {
        Some(args) => {
            info!(path = %store.path().display(), "using persisted tuning");
            Ok(args)
        }
        None => {
            info!("no persisted tuning, using defaults");
            Ok(SearchSpace::default().default_parameters()?.to_args())
        }
    }
}

async fn stats(tool: ToolArgs, trials: usize, args: Option<PathBuf>) -> Result<()> {
    let tuning = load_tuning(&tool.store(args))?;
    let runner = TrialRunner::with_processes(tool.tool_config()?);

    let stats = measure(&runner, tool.pool(), &tuning, trials)
        .await
        .context("routing trials")?;
    print!("{}", render_statistics(&stats));
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn optimize(
    tool: ToolArgs,
    clocks: Option<PathBuf>,
    target: f64,
    iterations: usize,
    batch: Option<usize>,
    out: Option<PathBuf>,
    strategy: StrategyArg,
    on_failure: FailureArg,
    seed: Option<u64>,
) -> Result<()> {
    let clocks_path = clocks.unwrap_or_else(|| tool.project.join(CLOCKS_FILE_NAME));
    let tracked = load_clock_declarations(&clocks_path).context("reading tracked clocks")?;
    let store = tool.store(out);
    let pool = tool.pool();

    let mut config = OptimizationConfig::new(tracked, target)
        .with_iterations(iterations)
        .with_batch_size(batch.unwrap_or(pool.workers))
        .with_strategy(strategy.into())
        .with_failure_policy(on_failure.into());
    if let Some(seed) = seed {
        config = config.with_seed(seed);
    }
    debug!(?config, "optimization configuration");

    let runner = TrialRunner::with_processes(tool.tool_config()?);
    let optimizer = ParameterOptimizer::new(config, Arc::new(TrialEvaluator::new(runner)), pool);
    let outcome = optimizer
        .optimize()
        .await
        .context("optimizing placer parameters")?;

    let report = OptimizationReport {
        run_id: outcome.status.id,
        finished_at: outcome.status.finished_at.unwrap_or_else(Utc::now),
        target_mhz: target,
        score: outcome.best.score,
        evaluations: outcome.status.history.len(),
        parameters: outcome.best.parameter_set,
        clocks: outcome.best.per_clock_report.clone(),
    };
    let lines = report.lines();
    store
        .save_args(&outcome.best.parameter_set.to_args(), &lines)
        .context("saving winning tuning")?;

    for line in &lines {
        println!("{line}");
    }
    println!("saved to {}", store.path().display());
    Ok(())
}

async fn route(tool: ToolArgs, args: Option<PathBuf>, asc: PathBuf) -> Result<()> {
    let tuning = load_tuning(&tool.store(args))?;
    let config = tool.tool_config()?.with_asc_output(Some(asc.clone()));
    let runner = TrialRunner::with_processes(config);

    let freqs = runner
        .run_and_parse(&tuning, None)
        .await
        .context("routing design")?;
    print!("{}", render_frequencies(&clock_report(&freqs, &[])));
    info!(asc = %asc.display(), "wrote routed design");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Stats { tool, trials, args } => stats(tool, trials, args).await,
        Commands::Optimize {
            tool,
            clocks,
            target,
            iterations,
            batch,
            out,
            strategy,
            on_failure,
            seed,
        } => {
            optimize(
                tool, clocks, target, iterations, batch, out, strategy, on_failure, seed,
            )
            .await
        }
        Commands::Route { tool, args, asc } => route(tool, args, asc).await,
    }
}
