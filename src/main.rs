use clap::Parser;
use std::sync::Arc;

use address_classifier::config::{Config, DispatchConfig, LlmConfig};
use address_classifier::llm_classifier::LlmClassifier;
use address_classifier::loader::load_addresses;
use address_classifier::{CsvWriter, Dispatcher};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    address_classifier::init_tracing();

    let config = Config::parse();
    config.validate()?;
    tracing::info!(
        input = %config.input_path.display(),
        output = %config.output_path.display(),
        model = %config.model,
        concurrency = config.concurrency,
        batch_size = config.batch_size,
        "Starting address classification"
    );

    let addresses = load_addresses(&config.input_path)?;
    if addresses.is_empty() {
        println!("No addresses found in {}", config.input_path.display());
        return Ok(());
    }
    println!(
        "Classifying {} addresses from {}",
        addresses.len(),
        config.input_path.display()
    );

    let classifier = LlmClassifier::new(LlmConfig::from(&config))?;
    let dispatcher = Dispatcher::new(Arc::new(classifier), DispatchConfig::from(&config));

    let (sender, writer) = CsvWriter::create(&config.output_path)?;
    let writer_handle = tokio::task::spawn_blocking(move || writer.run());

    let outcome = dispatcher.run(addresses, Arc::new(sender)).await;
    // The dispatcher has dropped every sender by now, so the writer drains and exits.
    let rows = writer_handle.await??;
    let summary = outcome?;

    if summary.exhausted_batches > 0 {
        tracing::warn!(
            batches = summary.exhausted_batches,
            "Some batches were written as errors after repeated rate limiting"
        );
    }
    if summary.panicked_batches > 0 {
        tracing::warn!(
            batches = summary.panicked_batches,
            "Some batches were written as errors after their task panicked"
        );
    }
    println!(
        "Processed {} addresses in {} batches: {} classified, {} errors ({} exhausted and {} panicked batches). Wrote {} rows to {}",
        summary.processed(),
        summary.batches,
        summary.classified,
        summary.errored,
        summary.exhausted_batches,
        summary.panicked_batches,
        rows,
        config.output_path.display()
    );
    Ok(())
}
