//! Error types for the artifact generation pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Retry classification of a generation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Timeout-like or malformed/truncated response; retried.
    Transient,
    /// Everything else; never retried.
    Fatal,
}

/// Errors raised by a `GenerationClient` call.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    #[error("Generation timed out: {0}")]
    Timeout(String),

    #[error("Malformed generation response: {0}")]
    Malformed(String),

    #[error("Generation service rejected credentials: {0}")]
    Unauthorized(String),

    #[error("Generation service misconfigured: {0}")]
    Configuration(String),

    #[error("Generation request failed: {0}")]
    Request(String),

    #[error("{0}")]
    Other(String),
}

/// Message fragments that mark an opaque failure as transient.
const TRANSIENT_MARKERS: &[&str] = &[
    "timeout",
    "timed out",
    "parse",
    "json",
    "format",
    "truncated",
    "unexpected end",
];

impl GenerationError {
    /// Classify this error for the retry policy.
    ///
    /// Typed variants classify by kind; `Request` and `Other` carry an opaque message from
    /// the service and are classified by what the message says.
    pub fn class(&self) -> ErrorClass {
        match self {
            GenerationError::Timeout(_) | GenerationError::Malformed(_) => ErrorClass::Transient,
            GenerationError::Unauthorized(_) | GenerationError::Configuration(_) => {
                ErrorClass::Fatal
            }
            GenerationError::Request(message) | GenerationError::Other(message) => {
                classify_message(message)
            }
        }
    }

    pub fn is_transient(&self) -> bool {
        self.class() == ErrorClass::Transient
    }
}

/// Classify a free-form error message.
pub fn classify_message(message: &str) -> ErrorClass {
    let lowered = message.to_lowercase();
    if TRANSIENT_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
    {
        ErrorClass::Transient
    } else {
        ErrorClass::Fatal
    }
}

/// Artifact store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Artifact not found: {0}")]
    NotFound(PathBuf),

    #[error("Artifact I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Pipeline-level errors. Generation failures never surface here; they end up as
/// per-item `failed` outcomes.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid work items: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Work item source error: {0}")]
    SourceError(String),

    #[error("Storage error: {0}")]
    StorageError(#[from] StoreError),

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Output error: {0}")]
    OutputError(String),
}

impl From<config::ConfigError> for PipelineError {
    fn from(err: config::ConfigError) -> Self {
        PipelineError::ConfigError(err.to_string())
    }
}
