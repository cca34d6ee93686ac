//! Prometheus metrics helpers.
//!
//! # Usage
//!
//! ```rust,ignore
//! use beatvault_core::metrics::{init_metrics, start_metrics_server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let handle = init_metrics();
//!     start_metrics_server(9090, handle).await.unwrap();
//!
//!     metrics::counter!("ingest_batches_total").increment(1);
//! }
//! ```
//!
//! # Metric Naming Conventions
//!
//! - Prefix: component (`ingest_`, `dictionary_`, `lumberjack_`)
//! - Suffix: unit or type (`_total`, `_seconds`)
//! - Labels: only `table` on dictionary metrics, which has two values

use axum::{Router, routing::get};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;

/// Initialize the Prometheus metrics recorder.
///
/// # Panics
///
/// Panics if a recorder is already installed.
pub fn init_metrics() -> PrometheusHandle {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder");

    register_metrics();

    handle
}

/// Start the Prometheus metrics HTTP server.
///
/// Binds before returning so that a port conflict surfaces as an error,
/// then serves `/metrics` from a background task.
pub async fn start_metrics_server(
    port: u16,
    handle: PrometheusHandle,
) -> Result<SocketAddr, std::io::Error> {
    let app = Router::new().route(
        "/metrics",
        get(move || {
            let handle = handle.clone();
            async move { handle.render() }
        }),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!("Metrics server listening on http://{}/metrics", local_addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Metrics server stopped: {}", e);
        }
    });

    Ok(local_addr)
}

fn register_metrics() {
    // =========================================================================
    // Pipeline
    // =========================================================================

    describe_counter!(
        "ingest_batches_total",
        "Batches committed and acknowledged"
    );
    describe_counter!(
        "ingest_batches_failed_total",
        "Batches rolled back after a fatal error (label: kind)"
    );
    describe_counter!("ingest_events_total", "Log rows committed");
    describe_gauge!(
        "ingest_running",
        "Whether the ingestion daemon is running (1=yes, 0=no)"
    );
    describe_histogram!(
        "ingest_batch_seconds",
        "Time from transaction begin to commit for one batch"
    );

    // =========================================================================
    // Dictionaries
    // =========================================================================

    describe_counter!(
        "dictionary_cache_hits_total",
        "Dictionary lookups served from memory (label: table)"
    );
    describe_counter!(
        "dictionary_lookups_total",
        "Dictionary lookups that went to the store (label: table)"
    );
    describe_counter!(
        "dictionary_inserts_total",
        "Dictionary rows created (label: table)"
    );

    // =========================================================================
    // Lumberjack transport
    // =========================================================================

    describe_gauge!("lumberjack_connections", "Open shipper connections");
    describe_counter!(
        "lumberjack_batches_received_total",
        "Batches decoded from shipper connections"
    );
    describe_counter!(
        "lumberjack_protocol_errors_total",
        "Connections closed because of malformed frames"
    );
}
