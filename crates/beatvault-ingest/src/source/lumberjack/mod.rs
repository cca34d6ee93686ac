//! Lumberjack v2 transport for Beats shippers.
//!
//! Shippers open a TCP connection and send windows of JSON events; each
//! window must be ACKed with its last sequence number before the shipper
//! considers it delivered. The listener decodes each window into a
//! [`Batch`](crate::source::Batch) whose acknowledger sends that ACK, so a
//! window is confirmed only after the pipeline committed it.
//!
//! ```text
//! shipper ──W,J..J / W,C──▶ connection task ──Batch──▶ crossbeam channel ──▶ driver
//!         ◀──A(seq)──────── (waits on oneshot) ◀───────── ack() after commit
//! ```

pub mod codec;
mod server;

pub use server::{LumberjackConfig, LumberjackServer};
