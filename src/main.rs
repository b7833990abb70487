//! flurry: replay a batch of diagnostic log events into per-tenant storage.
//!
//! Reads an NDJSON batch file (one event per line, or `-` for stdin),
//! normalizes and groups its records, and writes one gzip NDJSON artifact
//! per tenant, hour and partition.

use clap::Parser;
use snafu::prelude::*;
use std::io::Read;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use flurry::error::{BatchReadSnafu, IngestError};
use flurry::source::{parse_batch, read_batch_file};
use flurry::{Config, IngestContext, RawEvent};

/// Diagnostic log batch ingester.
#[derive(Parser, Debug)]
#[command(name = "flurry")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file.
    #[arg(short, long, required_unless_present = "storage_url")]
    config: Option<PathBuf>,

    /// Storage URL, overriding the configuration file.
    #[arg(long)]
    storage_url: Option<String>,

    /// Batch file to ingest, or `-` for stdin.
    #[arg(short, long)]
    batch: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Dry run - print the artifacts the batch would produce without writing.
    #[arg(long)]
    dry_run: bool,
}

#[snafu::report]
#[tokio::main]
async fn main() -> Result<(), IngestError> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = build_config(&args)?;
    let events = read_events(&args)?;
    info!(events = events.len(), "Batch loaded");

    if args.dry_run {
        config.validate()?;
        // planning never touches storage
        let ctx = IngestContext::with_store(
            config,
            std::sync::Arc::new(flurry::StorageProvider::in_memory()),
        );
        for planned in ctx.plan(&events) {
            info!(
                records = planned.record_count,
                min_offset = planned.min_offset,
                max_offset = planned.max_offset,
                "Would write {}",
                planned.path
            );
        }
        return Ok(());
    }

    let ctx = IngestContext::from_config(config).await?;
    let summary = ctx.process_batch(&events).await?;

    info!("Batch completed successfully");
    info!("  Events: {}", summary.events);
    info!("  Records: {}", summary.records);
    info!("  Artifacts written: {}", summary.artifacts.len());
    for artifact in &summary.artifacts {
        info!(
            "  - {} ({} records, {} bytes)",
            artifact.path, artifact.record_count, artifact.compressed_bytes
        );
    }

    Ok(())
}

/// Build configuration from arguments.
fn build_config(args: &Args) -> Result<Config, IngestError> {
    let mut config = match (&args.config, &args.storage_url) {
        (Some(path), _) => Config::from_file(path)?,
        (None, Some(url)) => Config::with_storage_url(url.clone()),
        (None, None) => Config::with_storage_url(String::new()),
    };
    if let Some(url) = &args.storage_url {
        config.storage.url = url.clone();
    }
    Ok(config)
}

fn read_events(args: &Args) -> Result<Vec<RawEvent>, IngestError> {
    if args.batch.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context(BatchReadSnafu)?;
        Ok(parse_batch(&text)?)
    } else {
        Ok(read_batch_file(&args.batch)?)
    }
}
