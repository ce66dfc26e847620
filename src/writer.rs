use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::error::{AppError, SinkError};
use crate::types::OutputRecord;

/// Column order of the results table.
pub const OUTPUT_HEADER: [&str; 5] = ["address", "shortForm", "longForm", "confidence", "error"];

/// Append-only destination for output records.
///
/// Each `write` delivers a whole record and may be called from many tasks.
pub trait RecordSink: Send + Sync {
    fn write(&self, record: OutputRecord) -> Result<(), SinkError>;
}

/// Cloneable handle that hands records to a [`WriterTask`].
#[derive(Debug, Clone)]
pub struct RecordSender {
    tx: flume::Sender<OutputRecord>,
}

impl RecordSink for RecordSender {
    fn write(&self, record: OutputRecord) -> Result<(), SinkError> {
        self.tx.send(record).map_err(|_| SinkError::Closed)
    }
}

/// Owns the CSV writer and drains records until every sender is dropped.
pub struct WriterTask<W: Write> {
    rx: flume::Receiver<OutputRecord>,
    writer: csv::Writer<W>,
}

pub struct CsvWriter;

impl CsvWriter {
    /// Truncates or creates `path` and writes the header row.
    pub fn create(path: &Path) -> Result<(RecordSender, WriterTask<File>), AppError> {
        let file = File::create(path)?;
        Self::from_writer(file)
    }

    pub fn from_writer<W: Write>(inner: W) -> Result<(RecordSender, WriterTask<W>), AppError> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(inner);
        writer.write_record(OUTPUT_HEADER)?;
        writer.flush()?;

        let (tx, rx) = flume::unbounded();
        Ok((RecordSender { tx }, WriterTask { rx, writer }))
    }
}

impl<W: Write> WriterTask<W> {
    /// Blocks until the channel closes, returning the number of rows written.
    ///
    /// Flushes whenever the queue drains, so an interrupted run keeps every
    /// row that was handed over before the pause.
    pub fn run(mut self) -> Result<usize, AppError> {
        let mut rows = 0usize;
        while let Ok(record) = self.rx.recv() {
            self.writer.serialize(&record)?;
            rows += 1;
            if self.rx.is_empty() {
                self.writer.flush()?;
            }
        }
        self.writer.flush()?;
        tracing::debug!(rows, "Output writer finished");
        Ok(rows)
    }
}
