//! Batch classification with rate-limit backoff.
//!
//! A batch holds one gate permit for its whole attempt loop. Only
//! [`ClassifyError::RateLimited`] is retried; every other failure turns the
//! batch into per-address error records straight away.

use std::time::Duration;

use metrics::counter;
use rand::Rng;
use tokio::sync::Semaphore;

use crate::classifier::Classifier;
use crate::config::RetryConfig;
use crate::error::{BatchError, ClassifyError};
use crate::types::{Batch, ClassificationResult, LOW_CONFIDENCE_ERROR, OutputRecord};

/// Growing full-jitter delay local to one batch.
///
/// Each step multiplies the previous delay by `2 * (1 + U[0,1))`; it is never
/// reset between attempts.
#[derive(Debug, Clone)]
pub struct Backoff {
    delay: Duration,
    max_delay: Duration,
}

impl Backoff {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            delay: config.base_delay,
            max_delay: config.max_delay,
        }
    }

    /// Advances the delay using `jitter` drawn from `[0, 1)`.
    ///
    /// A server-suggested wait raises the delay if it is longer.
    pub fn advance(&mut self, jitter: f64, suggested: Option<Duration>) -> Duration {
        let jitter = jitter.clamp(0.0, 1.0);
        let factor = 2.0 * (1.0 + jitter);
        let grown = Duration::from_nanos((self.delay.as_nanos() as f64 * factor).round() as u64);
        let next = suggested.map_or(grown, |s| grown.max(s)).min(self.max_delay);
        self.delay = next;
        next
    }
}

/// Classifies one batch, emitting one record per non-blank address.
///
/// Non-retryable failures yield a `"Batch failed: ..."` record for every
/// address of the batch, blank ones included. Running out of attempts is
/// returned as [`BatchError::RetriesExhausted`] for the caller to handle.
#[tracing::instrument(skip_all, fields(batch = batch.index, size = batch.len()))]
pub async fn classify_batch(
    batch: &Batch,
    classifier: &dyn Classifier,
    gate: &Semaphore,
    retry: &RetryConfig,
    min_confidence: f64,
) -> Result<Vec<OutputRecord>, BatchError> {
    let valid: Vec<String> = batch
        .records
        .iter()
        .filter(|record| !record.is_blank())
        .map(|record| record.text.clone())
        .collect();

    if valid.is_empty() {
        tracing::debug!("Batch has no non-blank addresses, skipping");
        return Ok(Vec::new());
    }

    let outcome = {
        let _permit = gate.acquire().await.map_err(|_| BatchError::GateClosed)?;
        call_with_backoff(&valid, classifier, retry).await
    };

    match outcome {
        Ok(results) => {
            let records: Vec<OutputRecord> = valid
                .into_iter()
                .enumerate()
                .map(|(i, address)| {
                    match results.get(i).and_then(|r| r.accepted(min_confidence)) {
                        Some((short_form, long_form)) => OutputRecord::classified(
                            address.as_str(),
                            short_form,
                            long_form,
                            results[i].confidence,
                        ),
                        None => OutputRecord::failed(address, LOW_CONFIDENCE_ERROR),
                    }
                })
                .collect();
            if results.len() != records.len() {
                tracing::warn!(
                    expected = records.len(),
                    received = results.len(),
                    "Classifier returned a different number of results"
                );
            }
            Ok(records)
        }
        Err(CallFailure::Fatal(err)) => {
            tracing::error!(error = %err, "Batch failed");
            Ok(failed_records(batch, &err.to_string()))
        }
        Err(CallFailure::Exhausted { attempts }) => {
            tracing::error!(attempts, "Batch gave up after repeated rate limiting");
            Err(BatchError::RetriesExhausted { attempts })
        }
    }
}

/// One `"Batch failed: <reason>"` record for every address in `batch`.
pub fn failed_records(batch: &Batch, reason: &str) -> Vec<OutputRecord> {
    batch
        .records
        .iter()
        .map(|record| OutputRecord::failed(record.text.as_str(), format!("Batch failed: {reason}")))
        .collect()
}

enum CallFailure {
    Fatal(ClassifyError),
    Exhausted { attempts: u32 },
}

async fn call_with_backoff(
    addresses: &[String],
    classifier: &dyn Classifier,
    retry: &RetryConfig,
) -> Result<Vec<ClassificationResult>, CallFailure> {
    let mut backoff = Backoff::new(retry);
    let mut retries = 0u32;

    loop {
        match classifier.classify(addresses).await {
            Ok(results) => {
                if retries > 0 {
                    tracing::debug!(retries, "Batch succeeded after retry");
                }
                return Ok(results);
            }
            Err(ClassifyError::RateLimited { retry_after }) => {
                retries += 1;
                if retries >= retry.max_attempts {
                    return Err(CallFailure::Exhausted { attempts: retries });
                }
                let jitter: f64 = rand::thread_rng().r#gen();
                let delay = backoff.advance(jitter, retry_after);
                counter!("address_rate_limit_retries_total").increment(1);
                tracing::warn!(
                    attempt = retries,
                    delay_ms = delay.as_millis() as u64,
                    capped = delay >= retry.max_delay,
                    max_delay_ms = retry.max_delay.as_millis() as u64,
                    "Rate limited, backing off"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => {
                debug_assert!(!err.is_retryable());
                return Err(CallFailure::Fatal(err));
            }
        }
    }
}
