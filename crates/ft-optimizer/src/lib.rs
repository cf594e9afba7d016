//! # ft-optimizer
//!
//! Searches the placer tuning grid for the parameter set whose routed design
//! best meets a target frequency on the tracked clocks.
//!
//! Candidates are proposed by a [`SearchStrategy`] (Gaussian-process
//! expected improvement by default), evaluated in parallel batches, and fed
//! back before the next batch is proposed.

mod objective;
mod optimizer;
mod search;
mod surrogate;
mod trial;

pub use objective::{
    score_frequencies, CandidateEvaluator, Objective, TrialEvaluator, DEFAULT_PENALTY_FACTOR,
};
pub use optimizer::{OptimizationOutcome, ParameterOptimizer};
pub use search::{BayesianConfig, BayesianSearch, RandomSearch, SearchStrategy, StrategyKind};
pub use surrogate::{expected_improvement, norm_cdf, norm_pdf, GaussianProcess, KernelParams};
pub use trial::{
    BestResult, CandidateFailurePolicy, OptimizationConfig, OptimizationHistory, OptimizationId,
    OptimizationRecord, OptimizationState, OptimizationStatus,
};
