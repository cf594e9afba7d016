//! The propose/evaluate loop.

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use ft_engine::{PoolConfig, TrialPool};
use ft_types::{ClockFrequencyMap, FtError, FtResult, ParameterSet};

use crate::objective::CandidateEvaluator;
use crate::search::{BayesianSearch, RandomSearch, SearchStrategy, StrategyKind};
use crate::trial::{
    BestResult, CandidateFailurePolicy, OptimizationConfig, OptimizationRecord, OptimizationStatus,
};

/// A finished run: the winner plus everything that was evaluated.
#[derive(Debug, Clone)]
pub struct OptimizationOutcome {
    pub best: BestResult,
    pub status: OptimizationStatus,
}

/// Searches the placer grid for the tuning that best meets the target.
pub struct ParameterOptimizer {
    config: OptimizationConfig,
    evaluator: Arc<dyn CandidateEvaluator>,
    pool: PoolConfig,
}

impl ParameterOptimizer {
    pub fn new(
        config: OptimizationConfig,
        evaluator: Arc<dyn CandidateEvaluator>,
        pool: PoolConfig,
    ) -> Self {
        Self {
            config,
            evaluator,
            pool,
        }
    }

    pub fn config(&self) -> &OptimizationConfig {
        &self.config
    }

    fn build_strategy(&self) -> Box<dyn SearchStrategy> {
        let space = self.config.search_space.clone();
        match self.config.strategy {
            StrategyKind::Bayesian => Box::new(BayesianSearch::new(
                space,
                self.config.bayesian,
                self.config.rng_seed,
            )),
            StrategyKind::Random => Box::new(RandomSearch::new(space, self.config.rng_seed)),
        }
    }

    /// Run every iteration and return the best candidate seen.
    ///
    /// Configuration problems are reported before any candidate is evaluated.
    pub async fn optimize(&self) -> FtResult<OptimizationOutcome> {
        self.config.validate()?;

        let mut status = OptimizationStatus::new(self.config.id);
        status.mark_running();
        match self.run(&mut status).await {
            Ok(best) => {
                status.mark_completed();
                info!(
                    run = %self.config.id,
                    score = best.score,
                    evaluations = status.history.len(),
                    failures = status.history.failures(),
                    parameters = %best.parameter_set,
                    "optimization finished"
                );
                Ok(OptimizationOutcome { best, status })
            }
            Err(e) => {
                status.mark_failed(e.to_string());
                Err(e)
            }
        }
    }

    async fn run(&self, status: &mut OptimizationStatus) -> FtResult<BestResult> {
        let mut strategy = self.build_strategy();
        let objective = self.config.objective();

        info!(
            run = %self.config.id,
            strategy = strategy.name(),
            iterations = self.config.iterations,
            batch = self.config.batch_size,
            space = self.config.search_space.len(),
            target_mhz = self.config.target_mhz,
            "starting optimization"
        );

        for iteration in 0..self.config.iterations {
            let batch = strategy.suggest(self.config.batch_size);
            if batch.is_empty() {
                info!(iteration, "search space exhausted");
                break;
            }

            let outcomes = self.evaluate_batch(&batch).await?;
            for (params, outcome) in batch.iter().zip(outcomes) {
                let (score, frequencies, error) = match outcome {
                    Ok(freqs) => (objective.score(&freqs), freqs, None),
                    Err(e) => {
                        warn!(%params, error = %e, "candidate failed, scoring as worst");
                        (f64::NEG_INFINITY, ClockFrequencyMap::new(), Some(e.to_string()))
                    }
                };
                strategy.report(params, score);
                status.history.push(OptimizationRecord {
                    iteration,
                    parameters: *params,
                    score,
                    frequencies,
                    error,
                    evaluated_at: Utc::now(),
                });
            }
            status.iterations_completed = iteration + 1;

            info!(
                iteration,
                evaluated = batch.len(),
                best_score = status.history.best_score().unwrap_or(f64::NEG_INFINITY),
                "iteration complete"
            );
        }

        match status.history.best(&self.config.tracked_clocks) {
            Some(best) if best.score.is_finite() => Ok(best),
            Some(_) => Err(FtError::Internal(
                "every candidate evaluation failed".to_string(),
            )),
            None => Err(FtError::Config("search space offered no candidates".to_string())),
        }
    }

    /// Evaluate one batch in parallel, results in batch order.
    ///
    /// Under [`CandidateFailurePolicy::Abort`] the first failure aborts the
    /// batch; otherwise each failure is handed back alongside the successes.
    async fn evaluate_batch(
        &self,
        batch: &[ParameterSet],
    ) -> FtResult<Vec<FtResult<ClockFrequencyMap>>> {
        let tolerate = self.config.failure_policy == CandidateFailurePolicy::WorstScore;
        let mut pool = TrialPool::new(self.pool).with_label("candidate");
        for params in batch {
            let evaluator = Arc::clone(&self.evaluator);
            let params = *params;
            pool.submit(async move {
                let result = evaluator.evaluate(&params).await;
                if tolerate {
                    Ok(result)
                } else {
                    result.map(Ok)
                }
            });
        }
        pool.join_all().await
    }
}
