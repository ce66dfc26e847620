use metrics::counter;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::batch::partition;
use crate::classifier::Classifier;
use crate::config::DispatchConfig;
use crate::error::{AppError, BatchError, SinkError};
use crate::retry::{classify_batch, failed_records};
use crate::types::{AddressRecord, Batch};
use crate::writer::RecordSink;

/// Totals for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub batches: usize,
    pub classified: usize,
    pub errored: usize,
    /// Batches degraded to error rows after running out of attempts.
    pub exhausted_batches: usize,
    /// Batches whose task panicked; their addresses are written as error rows.
    pub panicked_batches: usize,
}

impl RunSummary {
    pub fn processed(&self) -> usize {
        self.classified + self.errored
    }
}

#[derive(Debug, Default)]
struct BatchReport {
    classified: usize,
    errored: usize,
    exhausted: bool,
    panicked: bool,
    sink_error: Option<SinkError>,
}

/// Runs one task per batch, at most `concurrency` of them inside the remote call.
pub struct Dispatcher {
    classifier: Arc<dyn Classifier>,
    config: DispatchConfig,
    gate: Arc<Semaphore>,
}

impl Dispatcher {
    pub fn new(classifier: Arc<dyn Classifier>, config: DispatchConfig) -> Self {
        let gate = Arc::new(Semaphore::new(config.concurrency));
        Self {
            classifier,
            config,
            gate,
        }
    }

    /// Classifies every address and hands each record to `sink`.
    ///
    /// Waits for all batches to settle. Batches that exhaust their attempts
    /// are written as error rows and counted, never aborting the run; only a
    /// closed sink is reported as an error, after every batch has finished.
    #[tracing::instrument(skip_all, fields(addresses = addresses.len()))]
    pub async fn run(
        &self,
        addresses: Vec<AddressRecord>,
        sink: Arc<dyn RecordSink>,
    ) -> Result<RunSummary, AppError> {
        let run_start = Instant::now();
        let batches = partition(addresses, self.config.batch_size)?;
        let mut summary = RunSummary {
            batches: batches.len(),
            ..RunSummary::default()
        };

        tracing::info!(
            batches = batches.len(),
            batch_size = self.config.batch_size,
            concurrency = self.config.concurrency,
            "Dispatching batches"
        );

        let mut tasks = JoinSet::new();
        for batch in batches {
            let classifier = Arc::clone(&self.classifier);
            let gate = Arc::clone(&self.gate);
            let sink = Arc::clone(&sink);
            let config = self.config.clone();
            tasks.spawn(supervise_batch(batch, classifier, gate, sink, config));
        }

        let mut first_sink_error = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(report) => {
                    summary.classified += report.classified;
                    summary.errored += report.errored;
                    if report.exhausted {
                        summary.exhausted_batches += 1;
                    }
                    if report.panicked {
                        summary.panicked_batches += 1;
                    }
                    if first_sink_error.is_none() {
                        first_sink_error = report.sink_error;
                    }
                }
                Err(err) => {
                    tracing::error!(error = %err, "Batch supervisor failed");
                    summary.panicked_batches += 1;
                }
            }
        }

        tracing::info!(
            classified = summary.classified,
            errored = summary.errored,
            exhausted_batches = summary.exhausted_batches,
            panicked_batches = summary.panicked_batches,
            elapsed_ms = run_start.elapsed().as_millis() as u64,
            "All batches settled"
        );

        match first_sink_error {
            Some(err) => Err(err.into()),
            None => Ok(summary),
        }
    }
}

/// Runs `process_batch` in its own task so a panic still yields error rows
/// for every address of the batch.
async fn supervise_batch(
    batch: Batch,
    classifier: Arc<dyn Classifier>,
    gate: Arc<Semaphore>,
    sink: Arc<dyn RecordSink>,
    config: DispatchConfig,
) -> BatchReport {
    let fallback = batch.clone();
    let worker = tokio::spawn(process_batch(batch, classifier, gate, Arc::clone(&sink), config));
    match worker.await {
        Ok(report) => report,
        Err(err) => {
            tracing::error!(batch = fallback.index, error = %err, "Batch task panicked");
            counter!("address_batches_total", "outcome" => "panicked").increment(1);
            let mut report = BatchReport {
                panicked: true,
                ..BatchReport::default()
            };
            for record in failed_records(&fallback, "task panicked") {
                if let Err(err) = sink.write(record) {
                    report.sink_error = Some(err);
                    break;
                }
                report.errored += 1;
            }
            report
        }
    }
}

async fn process_batch(
    batch: Batch,
    classifier: Arc<dyn Classifier>,
    gate: Arc<Semaphore>,
    sink: Arc<dyn RecordSink>,
    config: DispatchConfig,
) -> BatchReport {
    let batch_start = Instant::now();
    let mut report = BatchReport::default();

    let records = match classify_batch(
        &batch,
        classifier.as_ref(),
        &gate,
        &config.retry,
        config.min_confidence,
    )
    .await
    {
        Ok(records) => records,
        Err(err @ BatchError::RetriesExhausted { .. }) => {
            report.exhausted = true;
            failed_records(&batch, &err.to_string())
        }
        Err(err @ BatchError::GateClosed) => failed_records(&batch, &err.to_string()),
    };

    for record in records {
        if record.is_error() {
            report.errored += 1;
        } else {
            report.classified += 1;
        }
        if let Err(err) = sink.write(record) {
            tracing::error!(batch = batch.index, error = %err, "Dropping batch output");
            report.sink_error = Some(err);
            break;
        }
    }

    let outcome = if report.exhausted {
        "exhausted"
    } else if report.classified == 0 && report.errored > 0 {
        "failed"
    } else {
        "ok"
    };
    counter!("address_batches_total", "outcome" => outcome).increment(1);
    counter!("address_records_total", "outcome" => "classified").increment(report.classified as u64);
    counter!("address_records_total", "outcome" => "error").increment(report.errored as u64);

    tracing::debug!(
        batch = batch.index,
        classified = report.classified,
        errored = report.errored,
        processing_time_ms = batch_start.elapsed().as_millis() as u64,
        "Batch processed"
    );
    report
}
