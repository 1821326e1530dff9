use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info};

use batch_geocoder::{
    geocode_table, init_tracing, AddressTable, GeocoderConfig, GeocodingService,
};

/// Batch-geocode a CSV of street addresses against a file-backed cache.
#[derive(Debug, Parser)]
#[command(name = "batch-geocoder", version, about)]
struct Args {
    /// Input CSV file containing an address column
    #[arg(long)]
    input: PathBuf,
    /// Where to write the geocoded CSV
    #[arg(long)]
    output: PathBuf,
    /// Header name of the address column
    #[arg(long, default_value = "address")]
    address_column: String,
    /// Cache directory, overriding GEOCODE_CACHE_DIR
    #[arg(long)]
    cache_dir: Option<PathBuf>,
    /// Derive slug cache keys instead of SHA-1 digests
    #[arg(long)]
    slug_keys: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();

    let mut config = GeocoderConfig::from_env();
    if let Some(dir) = args.cache_dir {
        config.cache_dir = dir;
    }
    if args.slug_keys {
        config.use_slug_keys = true;
    }
    debug!(profile = ?config.public_profile(), "loaded configuration");

    let service = GeocodingService::new(&config)?;
    let table = AddressTable::from_csv_path(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;

    let output = geocode_table(&table, &args.address_column, &config, service).await?;
    output
        .to_csv_path(&args.output)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    info!(rows = output.len(), "wrote {}", args.output.display());
    Ok(())
}
