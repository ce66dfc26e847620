use clap::Parser;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::PathBuf;

use address_classifier::generator::{generate, write_csv};

#[derive(Debug, Parser)]
#[command(author, version, about = "Generate synthetic addresses as classifier input", long_about = None)]
struct Args {
    /// Number of distinct addresses to generate
    #[arg(long, default_value = "10000")]
    count: usize,

    /// CSV file to write
    #[arg(long, default_value = "test_addresses.csv")]
    output: PathBuf,

    /// Seed for reproducible output
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    address_classifier::init_tracing();
    let args = Args::parse();

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    tracing::info!(count = args.count, seed = ?args.seed, "Generating addresses");
    let addresses = generate(&mut rng, args.count)?;
    write_csv(&args.output, &addresses)?;

    println!(
        "Saved {} addresses to {}. Classify them with: classify_addresses {} results.csv",
        addresses.len(),
        args.output.display(),
        args.output.display()
    );
    Ok(())
}
