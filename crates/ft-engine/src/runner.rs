//! One place-and-route trial: invoke, time out, redraw seed, retry.

use rand::Rng;
use std::sync::Arc;
use tracing::{debug, warn};

use ft_types::{ClockFrequencyMap, FtResult, ToolConfig, ToolError};

use crate::executor::{ProcessExecutor, ToolExecutor, ToolInvocation};
use crate::parser::parse_clock_frequencies;

/// Number of trailing output lines quoted in an invocation error.
const ERROR_TAIL_LINES: usize = 5;

/// Raw output of one successful trial.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialResult {
    pub lines: Vec<String>,
    /// Seed of the attempt that completed.
    pub seed: i32,
    /// Attempts abandoned because they hit the timeout.
    pub timeouts: u32,
}

/// Runs single trials of the place-and-route tool.
///
/// Cheap to clone; clones share the executor.
#[derive(Clone)]
pub struct TrialRunner {
    config: Arc<ToolConfig>,
    executor: Arc<dyn ToolExecutor>,
}

impl TrialRunner {
    pub fn new(config: ToolConfig, executor: Arc<dyn ToolExecutor>) -> Self {
        Self {
            config: Arc::new(config),
            executor,
        }
    }

    /// A runner that spawns real processes.
    pub fn with_processes(config: ToolConfig) -> Self {
        Self::new(config, Arc::new(ProcessExecutor))
    }

    pub fn config(&self) -> &ToolConfig {
        &self.config
    }

    /// Run the tool once with `tuning` flags and a fresh random seed.
    ///
    /// A timed-out attempt is discarded and retried with a seed this trial has
    /// not used yet, up to `max_attempts`. A nonzero exit is fatal at once.
    pub async fn run_trial(&self, tuning: &[String]) -> FtResult<TrialResult> {
        let config = &self.config;
        let mut used_seeds: Vec<i32> = Vec::new();

        loop {
            let seed = draw_seed(&used_seeds);
            used_seeds.push(seed);
            let attempt = used_seeds.len() as u32;

            let invocation = ToolInvocation {
                program: config.program.clone(),
                args: config.invocation_args(tuning, seed),
            };
            debug!(attempt, seed, "invoking {}", invocation);

            let outcome = tokio::time::timeout(config.timeout(), self.executor.execute(&invocation)).await;
            let output = match outcome {
                Ok(result) => result?,
                Err(_) => {
                    if config.max_attempts.is_some_and(|max| attempt >= max) {
                        return Err(ToolError::Timeout {
                            program: config.program.clone(),
                            attempts: attempt,
                            timeout_secs: config.timeout_secs,
                        }
                        .into());
                    }
                    warn!(
                        attempt,
                        seed,
                        timeout_secs = config.timeout_secs,
                        "{} timed out; retrying with a new seed",
                        config.program
                    );
                    continue;
                }
            };

            if !output.success {
                let status = match output.exit_code {
                    Some(code) => format!("exit code {code}"),
                    None => "termination by signal".to_string(),
                };
                let start = output.lines.len().saturating_sub(ERROR_TAIL_LINES);
                return Err(ToolError::Invocation {
                    program: config.program.clone(),
                    status,
                    tail: output.lines[start..].join(" | "),
                }
                .into());
            }

            return Ok(TrialResult {
                lines: output.lines,
                seed,
                timeouts: attempt - 1,
            });
        }
    }

    /// Run one trial and extract its post-routing clock frequencies.
    pub async fn run_and_parse(
        &self,
        tuning: &[String],
        filter: Option<&[String]>,
    ) -> FtResult<ClockFrequencyMap> {
        let result = self.run_trial(tuning).await?;
        Ok(parse_clock_frequencies(&result.lines, filter)?)
    }
}

/// A random signed 32-bit seed not contained in `used`.
fn draw_seed(used: &[i32]) -> i32 {
    let mut rng = rand::thread_rng();
    loop {
        let seed: i32 = rng.gen();
        if !used.contains(&seed) {
            return seed;
        }
    }
}
