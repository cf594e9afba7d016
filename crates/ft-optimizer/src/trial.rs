//! Optimization run configuration and evaluation history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ft_types::{
    clock_report, config_error, ClockFrequencyMap, ClockReportEntry, FtError, FtResult,
    ParameterSet, SearchSpace,
};

use crate::objective::{Objective, DEFAULT_PENALTY_FACTOR};
use crate::search::{BayesianConfig, StrategyKind};

/// Unique optimization run identifier.
pub type OptimizationId = Uuid;

/// What to do when a candidate's trial fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateFailurePolicy {
    /// Fail the whole run.
    #[default]
    Abort,
    /// Score the candidate as `f64::NEG_INFINITY` and keep searching.
    WorstScore,
}

/// Top-level configuration for an optimization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationConfig {
    pub id: OptimizationId,
    pub search_space: SearchSpace,
    pub strategy: StrategyKind,
    /// Number of propose/evaluate rounds.
    pub iterations: usize,
    /// Candidates evaluated in parallel per round.
    pub batch_size: usize,
    pub target_mhz: f64,
    pub tracked_clocks: Vec<String>,
    pub penalty_factor: f64,
    pub failure_policy: CandidateFailurePolicy,
    pub bayesian: BayesianConfig,
    /// Seed for candidate selection; `None` draws one from the OS.
    pub rng_seed: Option<u64>,
    pub created_at: DateTime<Utc>,
}

impl OptimizationConfig {
    pub fn new(tracked_clocks: Vec<String>, target_mhz: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            search_space: SearchSpace::default(),
            strategy: StrategyKind::default(),
            iterations: 10,
            batch_size: 4,
            target_mhz,
            tracked_clocks,
            penalty_factor: DEFAULT_PENALTY_FACTOR,
            failure_policy: CandidateFailurePolicy::default(),
            bayesian: BayesianConfig::default(),
            rng_seed: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_search_space(mut self, space: SearchSpace) -> Self {
        self.search_space = space;
        self
    }

    pub fn with_strategy(mut self, strategy: StrategyKind) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_iterations(mut self, n: usize) -> Self {
        self.iterations = n;
        self
    }

    pub fn with_batch_size(mut self, n: usize) -> Self {
        self.batch_size = n;
        self
    }

    pub fn with_penalty_factor(mut self, penalty: f64) -> Self {
        self.penalty_factor = penalty;
        self
    }

    pub fn with_failure_policy(mut self, policy: CandidateFailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_bayesian(mut self, bayesian: BayesianConfig) -> Self {
        self.bayesian = bayesian;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    pub fn objective(&self) -> Objective {
        Objective::new(self.tracked_clocks.clone(), self.target_mhz)
            .with_penalty_factor(self.penalty_factor)
    }

    /// Reject configurations that cannot produce a meaningful run.
    pub fn validate(&self) -> FtResult<()> {
        if self.tracked_clocks.is_empty() {
            return Err(FtError::Config(
                "optimization needs at least one tracked clock".to_string(),
            ));
        }
        if !(self.target_mhz.is_finite() && self.target_mhz > 0.0) {
            return Err(config_error!(
                "target frequency must be a positive number of MHz, got {}",
                self.target_mhz
            ));
        }
        if self.iterations == 0 {
            return Err(FtError::Config("iteration budget must be at least 1".to_string()));
        }
        if self.batch_size == 0 {
            return Err(FtError::Config("batch size must be at least 1".to_string()));
        }
        if !(self.penalty_factor.is_finite() && self.penalty_factor >= 1.0) {
            return Err(config_error!(
                "penalty factor must be at least 1, got {}",
                self.penalty_factor
            ));
        }
        self.search_space
            .validate()
            .map_err(|e| config_error!("invalid search space: {e}"))?;
        Ok(())
    }
}

/// One evaluated candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationRecord {
    pub iteration: usize,
    pub parameters: ParameterSet,
    pub score: f64,
    /// Every clock the trial reported, tracked or not. Empty if it failed.
    pub frequencies: ClockFrequencyMap,
    pub error: Option<String>,
    pub evaluated_at: DateTime<Utc>,
}

/// Winning candidate of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestResult {
    pub parameter_set: ParameterSet,
    pub score: f64,
    pub iteration: usize,
    pub per_clock_report: Vec<ClockReportEntry>,
}

/// Evaluations in the order they were scored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptimizationHistory {
    records: Vec<OptimizationRecord>,
    best: Option<usize>,
}

impl OptimizationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `record`; it becomes the best only if it scores strictly higher.
    pub fn push(&mut self, record: OptimizationRecord) {
        let improves = match self.best_record() {
            None => true,
            Some(current) => record.score > current.score,
        };
        self.records.push(record);
        if improves {
            self.best = Some(self.records.len() - 1);
        }
    }

    pub fn records(&self) -> &[OptimizationRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn failures(&self) -> usize {
        self.records.iter().filter(|r| r.error.is_some()).count()
    }

    pub fn best_record(&self) -> Option<&OptimizationRecord> {
        self.best.and_then(|i| self.records.get(i))
    }

    pub fn best_score(&self) -> Option<f64> {
        self.best_record().map(|r| r.score)
    }

    pub fn best(&self, tracked: &[String]) -> Option<BestResult> {
        self.best_record().map(|r| BestResult {
            parameter_set: r.parameters,
            score: r.score,
            iteration: r.iteration,
            per_clock_report: clock_report(&r.frequencies, tracked),
        })
    }
}

/// Lifecycle state for an optimization run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptimizationState {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Aggregate status of an optimization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationStatus {
    pub id: OptimizationId,
    pub state: OptimizationState,
    pub iterations_completed: usize,
    pub history: OptimizationHistory,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl OptimizationStatus {
    pub fn new(id: OptimizationId) -> Self {
        Self {
            id,
            state: OptimizationState::Pending,
            iterations_completed: 0,
            history: OptimizationHistory::new(),
            started_at: None,
            finished_at: None,
            error: None,
        }
    }

    pub fn mark_running(&mut self) {
        self.state = OptimizationState::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn mark_completed(&mut self) {
        self.state = OptimizationState::Completed;
        self.finished_at = Some(Utc::now());
    }

    pub fn mark_failed(&mut self, error: String) {
        self.state = OptimizationState::Failed;
        self.finished_at = Some(Utc::now());
        self.error = Some(error);
    }
}
