//! Beatvault live ingestion daemon.
//!
//! Listens for Beats shippers speaking Lumberjack v2 and stores every batch
//! in SQLite, acknowledging it to the shipper once committed.
//!
//! # Usage
//!
//! ```bash
//! # Defaults: listen on 0.0.0.0:27044, store in ./data/logs.db
//! beatvault-ingest
//!
//! # Custom paths, with Prometheus metrics on :9090
//! beatvault-ingest --bind 127.0.0.1:5044 --database /var/lib/beatvault/logs.db \
//!     --metrics-port 9090
//! ```
//!
//! # Failure Handling
//!
//! Any batch that can't be stored (malformed event, dictionary or SQLite
//! failure) is rolled back and never acknowledged, and the daemon exits with
//! a non-zero status. Shippers resend unacknowledged batches once it is
//! restarted.

use anyhow::{Context, Result, bail};
use beatvault_core::metrics::{init_metrics, start_metrics_server};
use beatvault_ingest::{
    Batch, BatchPersister, LogStore, LumberjackConfig, LumberjackServer, PersisterConfig,
    Pipeline,
};
use clap::Parser;
use metrics::gauge;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Beatvault live ingestion daemon.
#[derive(Parser, Debug)]
#[command(name = "beatvault-ingest")]
#[command(about = "Store Lumberjack log batches in SQLite")]
#[command(version)]
struct Args {
    /// [host]:port to listen on
    #[arg(long, env = "BEATVAULT_BIND", default_value = "0.0.0.0:27044")]
    bind: String,

    /// SQLite database path
    #[arg(long, env = "BEATVAULT_DATABASE", default_value = "./data/logs.db")]
    database: PathBuf,

    /// Rows buffered before an intermediate flush within a batch (0 = whole batch)
    #[arg(long, env = "BEATVAULT_FLUSH_ROWS", default_value = "1000")]
    flush_rows: usize,

    /// Seconds between keepalive ACKs while a batch is being stored (0 to disable)
    #[arg(long, env = "BEATVAULT_KEEPALIVE_SECS", default_value = "10")]
    keepalive_secs: u64,

    /// Largest accepted frame payload in bytes
    #[arg(long, env = "BEATVAULT_MAX_PAYLOAD_BYTES", default_value = "33554432")] // 32 MiB
    max_payload_bytes: usize,

    /// Metrics HTTP server port (0 to disable)
    #[arg(long, env = "BEATVAULT_METRICS_PORT", default_value = "0")]
    metrics_port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("info".parse()?)
                .add_directive("beatvault_ingest=debug".parse()?),
        )
        .init();

    let args = Args::parse();

    tracing::info!("Beatvault ingestion daemon starting...");
    tracing::info!("Configuration:");
    tracing::info!("  Listen: {}", args.bind);
    tracing::info!("  Database: {}", args.database.display());
    tracing::info!("  Flush rows: {}", args.flush_rows);

    if args.metrics_port > 0 {
        let metrics_handle = init_metrics();
        start_metrics_server(args.metrics_port, metrics_handle).await?;
        gauge!("ingest_running").set(1.0);
    }

    let store = LogStore::open(&args.database)
        .with_context(|| format!("Failed to open log store at {:?}", args.database))?;
    let mut pipeline = Pipeline::new(BatchPersister::new(
        store,
        PersisterConfig {
            flush_rows: args.flush_rows,
        },
    ));

    let server = LumberjackServer::bind(LumberjackConfig {
        bind: args.bind.clone(),
        keepalive: (args.keepalive_secs > 0).then(|| Duration::from_secs(args.keepalive_secs)),
        max_payload_bytes: args.max_payload_bytes,
    })
    .await
    .context("Failed to start Lumberjack listener")?;

    // The driver owns the SQLite connection and runs on its own thread;
    // connection tasks hand it batches over the channel.
    let (batch_tx, mut batch_rx) = crossbeam_channel::unbounded::<Batch>();
    let (done_tx, done_rx) = tokio::sync::oneshot::channel();
    std::thread::Builder::new()
        .name("pipeline".to_string())
        .spawn(move || {
            let result = pipeline.run(&mut batch_rx);
            let _ = done_tx.send((result, pipeline.stats()));
        })
        .context("Failed to spawn pipeline thread")?;

    let listener = tokio::spawn(server.serve(batch_tx));

    tokio::select! {
        done = done_rx => {
            let (result, stats) = done.context("Pipeline thread exited unexpectedly")?;
            tracing::info!(
                "Committed {} batches ({} events) before stopping",
                stats.batches_committed,
                stats.events_committed
            );
            result.context("Ingestion halted")?;
            bail!("Batch channel closed");
        }
        served = listener => {
            served.context("Listener task panicked")??;
            bail!("Listener stopped");
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for shutdown signal")?;
            // An in-flight batch is left uncommitted; SQLite rolls it back and
            // the shipper resends it.
            tracing::info!("Shutdown signal received, exiting");
        }
    }

    gauge!("ingest_running").set(0.0);
    Ok(())
}
