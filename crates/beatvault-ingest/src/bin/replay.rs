//! Replay JSONL log events into the log store.
//!
//! Each line of the input is one shipper event (the JSON a Beat would send).
//! Lines are grouped into batches and stored exactly as the live daemon
//! stores them, one transaction per batch.
//!
//! # Usage
//!
//! ```bash
//! replay-jsonl -i events.jsonl --database ./data/logs.db
//!
//! # Resume after a failure at the reported line
//! replay-jsonl -i events.jsonl --database ./data/logs.db --skip-lines 12000
//! ```

use anyhow::{Context, Result};
use beatvault_ingest::{
    BatchPersister, JsonlConfig, JsonlSource, LogStore, PersisterConfig, Pipeline,
};
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Replay JSONL log events into the beatvault store.
#[derive(Parser, Debug)]
#[command(name = "replay-jsonl")]
#[command(about = "Store JSONL log events in SQLite, batch by batch")]
struct Args {
    /// Input JSONL file
    #[arg(short, long)]
    input: PathBuf,

    /// SQLite database path
    #[arg(long, env = "BEATVAULT_DATABASE", default_value = "./data/logs.db")]
    database: PathBuf,

    /// Events per batch (one transaction each)
    #[arg(long, default_value = "500")]
    batch_size: usize,

    /// Skip this many leading lines (resume point of an earlier run)
    #[arg(long, default_value = "0")]
    skip_lines: usize,

    /// Rows buffered before an intermediate flush within a batch (0 = whole batch)
    #[arg(long, default_value = "1000")]
    flush_rows: usize,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let args = Args::parse();

    let mut source = JsonlSource::open(JsonlConfig {
        input: args.input.clone(),
        batch_size: args.batch_size,
        skip_lines: args.skip_lines,
    })?;

    let store = LogStore::open(&args.database)
        .with_context(|| format!("Failed to open log store at {:?}", args.database))?;
    let mut pipeline = Pipeline::new(BatchPersister::new(
        store,
        PersisterConfig {
            flush_rows: args.flush_rows,
        },
    ));

    let start = Instant::now();
    let result = pipeline.run(&mut source);
    let stats = pipeline.stats();

    info!("═══════════════════════════════════════════════════════");
    info!("Batches committed:   {}", stats.batches_committed);
    info!("Events committed:    {}", stats.events_committed);
    info!("Files interned:      {}", stats.dictionaries.files.inserts);
    info!("Hosts interned:      {}", stats.dictionaries.hosts.inserts);
    info!("Elapsed:             {:.1}s", start.elapsed().as_secs_f64());
    info!("═══════════════════════════════════════════════════════");

    if let Err(e) = result {
        error!(
            "Replay stopped; resume with --skip-lines {}",
            source.committed_line()
        );
        return Err(e).context("Replay failed");
    }

    Ok(())
}
