//! Fixed description of how the place-and-route tool is invoked.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::{FtError, FtResult};

pub const DEFAULT_PROGRAM: &str = "nextpnr-ice40";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 16;

/// Everything about a tool invocation that does not change between trials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Executable name or path.
    pub program: String,
    /// Device family (e.g. "hx8k"), passed as `--hx8k`.
    pub device: String,
    /// Package (e.g. "bg121:4k").
    pub package: String,
    /// Synthesized netlist JSON.
    pub netlist: PathBuf,
    /// Pin constraint file.
    pub pcf: PathBuf,
    /// Per-attempt timeout in seconds.
    pub timeout_secs: u64,
    /// Attempts allowed per trial before a timeout becomes fatal.
    /// `None` retries forever.
    pub max_attempts: Option<u32>,
    /// Where to write the placed-and-routed design, if anywhere.
    pub asc_output: Option<PathBuf>,
}

impl ToolConfig {
    pub fn new(
        device: impl Into<String>,
        package: impl Into<String>,
        netlist: impl Into<PathBuf>,
        pcf: impl Into<PathBuf>,
    ) -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            device: device.into(),
            package: package.into(),
            netlist: netlist.into(),
            pcf: pcf.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_attempts: Some(DEFAULT_MAX_ATTEMPTS),
            asc_output: None,
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_max_attempts(mut self, attempts: Option<u32>) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_asc_output(mut self, path: Option<PathBuf>) -> Self {
        self.asc_output = path;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> FtResult<()> {
        if self.program.trim().is_empty() {
            return Err(FtError::Config("tool program is empty".to_string()));
        }
        if self.device.trim().is_empty() {
            return Err(FtError::Config("device family is empty".to_string()));
        }
        if self.package.trim().is_empty() {
            return Err(FtError::Config("device package is empty".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(FtError::Config("timeout must be at least one second".to_string()));
        }
        if self.max_attempts == Some(0) {
            return Err(FtError::Config("max attempts must be at least one".to_string()));
        }
        Ok(())
    }

    /// Full argument vector for one attempt (program excluded).
    pub fn invocation_args(&self, tuning: &[String], seed: i32) -> Vec<String> {
        let mut args = vec![
            format!("--{}", self.device),
            "--package".to_string(),
            self.package.clone(),
            "--json".to_string(),
            self.netlist.to_string_lossy().to_string(),
            "--pcf".to_string(),
            self.pcf.to_string_lossy().to_string(),
            "--pcf-allow-unconstrained".to_string(),
        ];
        args.extend(tuning.iter().cloned());
        args.push("--seed".to_string());
        args.push(seed.to_string());
        if let Some(ref asc) = self.asc_output {
            args.push("--asc".to_string());
            args.push(asc.to_string_lossy().to_string());
        }
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> ToolConfig {
        ToolConfig::new("hx8k", "bg121:4k", "Blinky/Synth/Top.json", "Pins.pcf")
    }

    #[test]
    fn invocation_places_tuning_before_seed() {
        let args = sample_config().invocation_args(&["--placer-heap-alpha".into(), "0.1".into()], -42);
        assert_eq!(
            args,
            vec![
                "--hx8k",
                "--package",
                "bg121:4k",
                "--json",
                "Blinky/Synth/Top.json",
                "--pcf",
                "Pins.pcf",
                "--pcf-allow-unconstrained",
                "--placer-heap-alpha",
                "0.1",
                "--seed",
                "-42",
            ]
        );
    }

    #[test]
    fn asc_output_is_appended_last() {
        let config = sample_config().with_asc_output(Some("Top.asc".into()));
        let args = config.invocation_args(&[], 1);
        assert_eq!(&args[args.len() - 2..], ["--asc", "Top.asc"]);
    }

    #[test]
    fn validation_rejects_zero_bounds() {
        assert!(sample_config().validate().is_ok());
        assert!(sample_config().with_timeout_secs(0).validate().is_err());
        assert!(sample_config().with_max_attempts(Some(0)).validate().is_err());
        assert!(sample_config().with_max_attempts(None).validate().is_ok());
        assert!(sample_config().with_program(" ").validate().is_err());
    }
}
