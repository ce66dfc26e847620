//! Batch country classification of postal addresses through an LLM.
//!
//! Addresses are read from a CSV file, split into fixed-size batches and sent
//! to a [`Classifier`] with at most `concurrency` batches in flight. Rate
//! limits are retried with growing jittered backoff; every other failure is
//! recorded as error rows so a single bad batch never stops the run.

pub mod batch;
pub mod classifier;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod generator;
pub mod llm_classifier;
pub mod loader;
pub mod retry;
pub mod types;
pub mod writer;

pub use classifier::Classifier;
pub use dispatcher::{Dispatcher, RunSummary};
pub use error::{AppError, BatchError, ClassifyError, SinkError};
pub use types::{AddressRecord, Batch, ClassificationResult, OutputRecord};
pub use writer::{CsvWriter, RecordSink};

/// Installs the `fmt` subscriber used by both binaries.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,address_classifier=debug".into()),
        )
        .init();
}
