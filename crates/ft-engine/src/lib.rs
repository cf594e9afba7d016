//! # ft-engine
//!
//! Runs place-and-route trials in parallel and turns their logs into
//! per-clock frequency statistics.

pub mod executor;
pub mod parser;
pub mod pool;
pub mod runner;
pub mod stats;

pub use executor::{ProcessExecutor, ToolExecutor, ToolInvocation, ToolOutput};
pub use parser::{parse_clock_frequencies, parse_clock_line, CLOCK_LINE_MARKER};
pub use pool::{PoolConfig, TrialPool};
pub use runner::{TrialResult, TrialRunner};
pub use stats::{aggregate, ClockStatistics, StatisticsAggregator};

use ft_types::{ClockFrequencyMap, FtResult};
use std::collections::BTreeMap;
use tracing::info;

/// Run `trials` independent trials with the same tuning and return their raw
/// results in submission order.
pub async fn run_raw_trials(
    runner: &TrialRunner,
    pool: PoolConfig,
    tuning: &[String],
    trials: usize,
) -> FtResult<Vec<TrialResult>> {
    let mut batch = TrialPool::new(pool);
    for _ in 0..trials {
        let runner = runner.clone();
        let tuning = tuning.to_vec();
        batch.submit(async move { runner.run_trial(&tuning).await });
    }
    batch.join_all().await
}

/// Run `trials` independent trials and parse each one's clock frequencies.
///
/// A parse failure fails the task that produced it, and with it the batch.
pub async fn run_trials(
    runner: &TrialRunner,
    pool: PoolConfig,
    tuning: &[String],
    trials: usize,
    filter: Option<&[String]>,
) -> FtResult<Vec<ClockFrequencyMap>> {
    info!(
        trials,
        workers = pool.workers,
        "routing design with {}",
        tuning.join(" ")
    );

    let mut batch = TrialPool::new(pool);
    for _ in 0..trials {
        let runner = runner.clone();
        let tuning = tuning.to_vec();
        let filter = filter.map(<[String]>::to_vec);
        batch.submit(async move { runner.run_and_parse(&tuning, filter.as_deref()).await });
    }
    batch.join_all().await
}

/// Run a batch of trials and summarize it per clock.
pub async fn measure(
    runner: &TrialRunner,
    pool: PoolConfig,
    tuning: &[String],
    trials: usize,
) -> FtResult<BTreeMap<String, ClockStatistics>> {
    let maps = run_trials(runner, pool, tuning, trials, None).await?;
    Ok(aggregate(&maps))
}
