//! Scoring of routed designs against a target frequency.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use ft_engine::TrialRunner;
use ft_types::{ClockFrequencyMap, FtResult, ParameterSet};

/// Multiplier applied to every below-target shortfall.
pub const DEFAULT_PENALTY_FACTOR: f64 = 10.0;

/// Sum of per-clock surpluses over `target_mhz`, with shortfalls multiplied by
/// `penalty`. Clocks not in `tracked` are ignored, as are tracked clocks the
/// design did not report.
pub fn score_frequencies(
    freqs: &ClockFrequencyMap,
    tracked: &[String],
    target_mhz: f64,
    penalty: f64,
) -> f64 {
    tracked
        .iter()
        .filter_map(|clock| freqs.get(clock))
        .map(|freq| {
            let delta = freq - target_mhz;
            if delta < 0.0 {
                delta * penalty
            } else {
                delta
            }
        })
        .sum()
}

/// The quantity being maximized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Objective {
    pub tracked_clocks: Vec<String>,
    pub target_mhz: f64,
    pub penalty_factor: f64,
}

impl Objective {
    pub fn new(tracked_clocks: Vec<String>, target_mhz: f64) -> Self {
        Self {
            tracked_clocks,
            target_mhz,
            penalty_factor: DEFAULT_PENALTY_FACTOR,
        }
    }

    pub fn with_penalty_factor(mut self, penalty: f64) -> Self {
        self.penalty_factor = penalty;
        self
    }

    pub fn score(&self, freqs: &ClockFrequencyMap) -> f64 {
        score_frequencies(freqs, &self.tracked_clocks, self.target_mhz, self.penalty_factor)
    }
}

/// Produces the post-routing clock frequencies of one candidate.
///
/// The optimizer calls this exactly once per candidate and owns the parallel
/// dispatch; implementations only need to be shareable across tasks.
#[async_trait]
pub trait CandidateEvaluator: Send + Sync {
    async fn evaluate(&self, params: &ParameterSet) -> FtResult<ClockFrequencyMap>;
}

/// Evaluates a candidate with a single place-and-route trial.
#[derive(Clone)]
pub struct TrialEvaluator {
    runner: TrialRunner,
}

impl TrialEvaluator {
    pub fn new(runner: TrialRunner) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl CandidateEvaluator for TrialEvaluator {
    async fn evaluate(&self, params: &ParameterSet) -> FtResult<ClockFrequencyMap> {
        // Unfiltered so the winner's report can show every clock.
        self.runner.run_and_parse(&params.to_args(), None).await
    }
}
