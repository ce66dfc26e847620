use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::AppError;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "classify_addresses",
    author,
    version,
    about = "Classify postal addresses by country using an LLM",
    long_about = None
)]
pub struct Config {
    /// CSV file with a header row and the address in the first column
    pub input_path: PathBuf,

    /// CSV file to write results to (overwritten if it exists)
    pub output_path: PathBuf,

    /// Maximum number of batches in flight at once
    #[arg(long, env = "CONCURRENCY", default_value = "50")]
    pub concurrency: usize,

    /// Maximum number of addresses per remote call
    #[arg(long, env = "BATCH_SIZE", default_value = "50")]
    pub batch_size: usize,

    /// Model name sent to the chat completions endpoint
    #[arg(long, env = "LLM_MODEL", default_value = "gpt-4o-mini")]
    pub model: String,

    /// Base URL of an OpenAI-compatible API
    #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com/v1")]
    pub api_base: String,

    /// API key sent as a bearer token
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value = "60")]
    pub request_timeout_secs: u64,

    /// Rate-limited attempts per batch before the batch is given up
    #[arg(long, env = "MAX_ATTEMPTS", default_value = "10")]
    pub max_attempts: u32,

    /// Starting backoff delay in milliseconds
    #[arg(long, env = "BACKOFF_BASE_MS", default_value = "1000")]
    pub backoff_base_ms: u64,

    /// Upper bound on a single backoff delay in milliseconds
    #[arg(long, env = "MAX_BACKOFF_MS", default_value = "60000")]
    pub max_backoff_ms: u64,

    /// Minimum confidence for a classification to be accepted
    #[arg(long, env = "MIN_CONFIDENCE", default_value = "0.7")]
    pub min_confidence: f64,
}

impl Config {
    /// Rejects settings that would make the run meaningless, before any I/O.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.batch_size == 0 {
            return Err(invalid("--batch-size must be a positive integer"));
        }
        if self.concurrency == 0 {
            return Err(invalid("--concurrency must be a positive integer"));
        }
        if self.max_attempts == 0 {
            return Err(invalid("--max-attempts must be a positive integer"));
        }
        if self.backoff_base_ms == 0 {
            return Err(invalid("--backoff-base-ms must be a positive integer"));
        }
        if self.max_backoff_ms < self.backoff_base_ms {
            return Err(invalid("--max-backoff-ms must not be below --backoff-base-ms"));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(invalid("--min-confidence must be between 0 and 1"));
        }
        if self.api_key.as_deref().is_none_or(|key| key.trim().is_empty()) {
            return Err(invalid("an API key is required (--api-key or OPENAI_API_KEY)"));
        }
        Ok(())
    }
}

fn invalid(message: &str) -> AppError {
    AppError::InvalidConfiguration(message.to_string())
}

#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub batch_size: usize,
    pub concurrency: usize,
    pub min_confidence: f64,
    pub retry: RetryConfig,
}

impl From<&Config> for DispatchConfig {
    fn from(config: &Config) -> Self {
        Self {
            batch_size: config.batch_size,
            concurrency: config.concurrency,
            min_confidence: config.min_confidence,
            retry: RetryConfig::from(config),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Attempts allowed per batch; reaching this many rate limits fails the batch.
    pub max_attempts: u32,
    /// Initial value of the growing delay.
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl From<&Config> for RetryConfig {
    fn from(config: &Config) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: Duration::from_millis(config.backoff_base_ms),
            max_delay: Duration::from_millis(config.max_backoff_ms),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_base: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
}

impl From<&Config> for LlmConfig {
    fn from(config: &Config) -> Self {
        Self {
            api_base: config.api_base.clone(),
            api_key: config.api_key.clone().unwrap_or_default(),
            model: config.model.clone(),
            timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }
}
