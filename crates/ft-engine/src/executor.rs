//! The seam between trial logic and the operating system.

use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::debug;

use ft_types::{FtResult, ToolError};

/// A fully resolved command line for one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub program: String,
    pub args: Vec<String>,
}

impl ToolInvocation {
    /// Value passed with `--seed`, if present.
    pub fn seed(&self) -> Option<i32> {
        self.args
            .iter()
            .position(|a| a == "--seed")
            .and_then(|i| self.args.get(i + 1))
            .and_then(|s| s.parse().ok())
    }
}

impl std::fmt::Display for ToolInvocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.program, self.args.join(" "))
    }
}

/// What a finished process left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub success: bool,
    /// Exit code, `None` when terminated by a signal.
    pub exit_code: Option<i32>,
    /// Combined stdout/stderr lines in arrival order.
    pub lines: Vec<String>,
}

/// Runs a tool invocation to completion.
///
/// Implementations must be cancel-safe: the runner drops the future when the
/// attempt times out, and any process it owns has to go with it.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, invocation: &ToolInvocation) -> FtResult<ToolOutput>;
}

/// Executes invocations as real child processes.
#[derive(Debug, Clone, Default)]
pub struct ProcessExecutor;

#[async_trait]
impl ToolExecutor for ProcessExecutor {
    async fn execute(&self, invocation: &ToolInvocation) -> FtResult<ToolOutput> {
        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ToolError::Spawn {
                program: invocation.program.clone(),
                message: e.to_string(),
            })?;

        let stdout = child.stdout.take().ok_or_else(|| ToolError::Spawn {
            program: invocation.program.clone(),
            message: "stdout was not captured".to_string(),
        })?;
        let stderr = child.stderr.take().ok_or_else(|| ToolError::Spawn {
            program: invocation.program.clone(),
            message: "stderr was not captured".to_string(),
        })?;

        let mut out = BufReader::new(stdout).lines();
        let mut err = BufReader::new(stderr).lines();
        let (mut out_done, mut err_done) = (false, false);
        let mut lines = Vec::new();

        while !(out_done && err_done) {
            tokio::select! {
                line = out.next_line(), if !out_done => match line? {
                    Some(l) => lines.push(l),
                    None => out_done = true,
                },
                line = err.next_line(), if !err_done => match line? {
                    Some(l) => lines.push(l),
                    None => err_done = true,
                },
            }
        }

        let status = child.wait().await?;
        debug!(program = %invocation.program, ?status, lines = lines.len(), "tool exited");

        Ok(ToolOutput {
            success: status.success(),
            exit_code: status.code(),
            lines,
        })
    }
}
