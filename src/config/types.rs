/// Core types shared across the tribox pipeline
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Custom error types for tribox
#[derive(Error, Debug)]
pub enum PlaygroundError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Input rejected: {0}")]
    InputRejected(String),

    #[error("Failed to spawn {program}: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Process timed out after {timeout_ms}ms")]
    TimedOut { timeout_ms: u64 },

    #[error("Process error: {0}")]
    Process(String),

    #[error("Analysis error: {0}")]
    Analysis(String),
}

impl From<nix::errno::Errno> for PlaygroundError {
    fn from(err: nix::errno::Errno) -> Self {
        PlaygroundError::Process(err.to_string())
    }
}

impl From<regex::Error> for PlaygroundError {
    fn from(err: regex::Error) -> Self {
        PlaygroundError::Analysis(format!("invalid pattern: {}", err))
    }
}

/// Result type alias for tribox operations
pub type Result<T> = std::result::Result<T, PlaygroundError>;

/// Closed set of compile-and-run results. Exactly one is produced per request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CompileOutcome {
    /// Program compiled, ran and exited zero
    Success { output: String, elapsed_ms: u64 },
    /// Input rejected, compiler failed, or compiler could not be run/timed out
    CompilationError { message: String },
    /// Program exited non-zero, could not be started, or was never produced
    RuntimeError { message: String, elapsed_ms: u64 },
    /// Program exceeded the execution timeout
    Timeout { message: String },
}

impl CompileOutcome {
    pub fn result_type(&self) -> ResultType {
        match self {
            Self::Success { .. } => ResultType::Success,
            Self::CompilationError { .. } => ResultType::CompilationError,
            Self::RuntimeError { .. } => ResultType::RuntimeError,
            Self::Timeout { .. } => ResultType::Timeout,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Human-readable text carried by every outcome
    pub fn text(&self) -> &str {
        match self {
            Self::Success { output, .. } => output,
            Self::CompilationError { message }
            | Self::RuntimeError { message, .. }
            | Self::Timeout { message } => message,
        }
    }

    pub fn elapsed_ms(&self) -> Option<u64> {
        match self {
            Self::Success { elapsed_ms, .. } | Self::RuntimeError { elapsed_ms, .. } => {
                Some(*elapsed_ms)
            }
            Self::CompilationError { .. } | Self::Timeout { .. } => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultType {
    Success,
    CompilationError,
    RuntimeError,
    Timeout,
}

impl fmt::Display for ResultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Success => "success",
            Self::CompilationError => "compilation_error",
            Self::RuntimeError => "runtime_error",
            Self::Timeout => "timeout",
        };
        f.write_str(name)
    }
}

/// Wire shape handed to the HTTP layer for a compile call
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time_ms: Option<u64>,
    pub result_type: ResultType,
}

impl From<CompileOutcome> for CompileResponse {
    fn from(outcome: CompileOutcome) -> Self {
        let result_type = outcome.result_type();
        match outcome {
            CompileOutcome::Success { output, elapsed_ms } => Self {
                success: true,
                output: Some(output),
                error: None,
                execution_time_ms: Some(elapsed_ms),
                result_type,
            },
            CompileOutcome::CompilationError { message } | CompileOutcome::Timeout { message } => {
                Self {
                    success: false,
                    output: None,
                    error: Some(message),
                    execution_time_ms: None,
                    result_type,
                }
            }
            CompileOutcome::RuntimeError { message, elapsed_ms } => Self {
                success: false,
                output: None,
                error: Some(message),
                execution_time_ms: Some(elapsed_ms),
                result_type,
            },
        }
    }
}
