//! Bounded worker pool for independent trials.
//!
//! Tasks are submitted up front and run at most `workers` at a time. Results
//! are merged as they finish, in any order, then handed back in submission
//! order. The first failure aborts everything still running and is reported
//! against the index of the task that raised it.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info};

use ft_types::{internal_error, FtError, FtResult};

/// Sizing for a [`TrialPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    pub workers: usize,
}

impl PoolConfig {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self::new(workers)
    }
}

/// Submit/await-all task queue over a fixed number of workers.
pub struct TrialPool<T> {
    permits: Arc<Semaphore>,
    tasks: JoinSet<(usize, FtResult<T>)>,
    submitted: usize,
    label: &'static str,
}

impl<T: Send + 'static> TrialPool<T> {
    pub fn new(config: PoolConfig) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(config.workers.max(1))),
            tasks: JoinSet::new(),
            submitted: 0,
            label: "trial",
        }
    }

    /// Name used for tasks in progress logging.
    pub fn with_label(mut self, label: &'static str) -> Self {
        self.label = label;
        self
    }

    /// Queue a task; returns its index in the eventual result vector.
    pub fn submit<F>(&mut self, task: F) -> usize
    where
        F: Future<Output = FtResult<T>> + Send + 'static,
    {
        let index = self.submitted;
        self.submitted += 1;

        let permits = Arc::clone(&self.permits);
        self.tasks.spawn(async move {
            let _permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return (index, Err(internal_error!("worker pool closed"))),
            };
            (index, task.await)
        });
        index
    }

    pub fn len(&self) -> usize {
        self.submitted
    }

    pub fn is_empty(&self) -> bool {
        self.submitted == 0
    }

    /// Wait for every task and return results in submission order.
    pub async fn join_all(mut self) -> FtResult<Vec<T>> {
        let total = self.submitted;
        let label = self.label;
        let mut results: Vec<Option<T>> = (0..total).map(|_| None).collect();
        let mut completed = 0usize;

        while let Some(joined) = self.tasks.join_next().await {
            let (index, result) = joined.map_err(|e| internal_error!("{label} task panicked: {e}"))?;
            match result {
                Ok(value) => {
                    results[index] = Some(value);
                    completed += 1;
                    info!(completed, total, "{label} {index} finished");
                }
                Err(err) => {
                    debug!(index, "aborting {} remaining {label} tasks", total - completed - 1);
                    self.tasks.abort_all();
                    return Err(FtError::task(index, err));
                }
            }
        }

        results
            .into_iter()
            .enumerate()
            .map(|(i, r)| r.ok_or_else(|| internal_error!("{label} {i} produced no result")))
            .collect()
    }
}
