use thiserror::Error;

/// Main error type for fmaxtune
#[derive(Error, Debug)]
pub enum FtError {
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(String),

    /// A failure attributed to one task of a parallel batch.
    #[error("Task {index} failed: {source}")]
    Task {
        index: usize,
        #[source]
        source: Box<FtError>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl FtError {
    /// Attribute `error` to batch task `index`.
    pub fn task(index: usize, error: FtError) -> Self {
        FtError::Task {
            index,
            source: Box::new(error),
        }
    }

    /// Strip any task attribution and return the underlying error.
    pub fn root(&self) -> &FtError {
        match self {
            FtError::Task { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Errors raised while invoking the external place-and-route tool
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("failed to launch {program}: {message}")]
    Spawn { program: String, message: String },

    #[error("{program} exited with {status}; last output: {tail}")]
    Invocation {
        program: String,
        status: String,
        tail: String,
    },

    #[error("{program} timed out {attempts} time(s) (timeout {timeout_secs}s per attempt)")]
    Timeout {
        program: String,
        attempts: u32,
        timeout_secs: u64,
    },
}

/// Errors raised while reading timing diagnostics out of tool output
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("expected an even number of clock frequency lines, found {count}")]
    OddMatchCount { count: usize },

    #[error("clock name is not single-quoted in line: {line}")]
    MissingQuotedName { line: String },

    #[error("expected 3 colon-separated fields in line: {line}")]
    BadFieldCount { line: String },

    #[error("frequency '{value}' is not a number in line: {line}")]
    BadFrequency { value: String, line: String },

    #[error("expected unit 'MHz', found '{unit}' in line: {line}")]
    BadUnit { unit: String, line: String },
}

/// Errors raised by the artifact store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("artifact {path} is malformed: {message}")]
    Schema { path: String, message: String },

    #[error("artifact {path} could not be accessed: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for fmaxtune operations
pub type FtResult<T> = Result<T, FtError>;

/// Macro for creating validation errors
#[macro_export]
macro_rules! validation_error {
    ($($arg:tt)*) => {
        $crate::FtError::Validation(format!($($arg)*))
    };
}

/// Macro for creating internal errors
#[macro_export]
macro_rules! internal_error {
    ($($arg:tt)*) => {
        $crate::FtError::Internal(format!($($arg)*))
    };
}

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::FtError::Config(format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = ToolError::Timeout {
            program: "nextpnr-ice40".to_string(),
            attempts: 3,
            timeout_secs: 60,
        };

        let text = error.to_string();
        assert!(text.contains("nextpnr-ice40"));
        assert!(text.contains("3 time(s)"));
        assert!(text.contains("60s"));
    }

    #[test]
    fn test_error_conversion() {
        let parse_error = ParseError::OddMatchCount { count: 3 };
        let ft_error: FtError = parse_error.into();

        match ft_error {
            FtError::Parse(ParseError::OddMatchCount { count }) => assert_eq!(count, 3),
            _ => panic!("Expected Parse error"),
        }
    }

    #[test]
    fn test_task_attribution() {
        let inner: FtError = ParseError::OddMatchCount { count: 1 }.into();
        let err = FtError::task(7, FtError::task(2, inner));

        assert!(err.to_string().starts_with("Task 7 failed"));
        assert!(matches!(err.root(), FtError::Parse(_)));
    }

    #[test]
    fn test_macros() {
        let err = config_error!("no tracked clocks in {}", "Clocks.json");
        assert!(matches!(err, FtError::Config(ref m) if m.contains("Clocks.json")));
        let _validation_err = validation_error!("Invalid value: {}", 42);
        let _internal_err = internal_error!("Something went wrong");
    }
}
