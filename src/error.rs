//! Error types for the address classification pipeline.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that abort a whole run: configuration and startup I/O.
#[derive(Error, Debug)]
pub enum AppError {
    /// Bad CLI arguments or environment configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Input path does not exist
    #[error("Input file not found: {}", .0.display())]
    ResourceNotFound(PathBuf),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Output sink failed: {0}")]
    Sink(#[from] SinkError),
}

/// Failure kinds of one remote classification call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClassifyError {
    /// The provider asked us to slow down (HTTP 429).
    #[error("rate limited")]
    RateLimited {
        /// Server-suggested wait, if the response carried one.
        retry_after: Option<Duration>,
    },

    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("{0}")]
    Other(String),
}

impl ClassifyError {
    /// Only rate limiting is expected to resolve by waiting.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClassifyError::RateLimited { .. } => true,
            ClassifyError::ServiceUnavailable(_)
            | ClassifyError::MalformedResponse(_)
            | ClassifyError::Transport(_)
            | ClassifyError::Other(_) => false,
        }
    }
}

impl From<reqwest::Error> for ClassifyError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClassifyError::MalformedResponse(err.to_string())
        } else {
            ClassifyError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ClassifyError {
    fn from(err: serde_json::Error) -> Self {
        ClassifyError::MalformedResponse(err.to_string())
    }
}

/// Unrecoverable failure of a single batch.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BatchError {
    #[error("rate limited after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    #[error("concurrency gate closed")]
    GateClosed,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    #[error("output writer is closed")]
    Closed,
}
