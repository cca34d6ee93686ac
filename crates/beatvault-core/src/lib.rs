//! Core types and shared utilities for the beatvault log ingester.
//!
//! This crate provides:
//! - The raw and typed event representations ([`RawEvent`], [`LogEvent`])
//! - Shape validation errors
//! - Prometheus metrics helpers

mod error;
mod event;
pub mod metrics;

pub use error::{Error, Result};
pub use event::{
    HOST_FIELD, HOST_HOSTNAME_FIELD, HOST_NAME_FIELD, HostInfo, LogEvent, MESSAGE_FIELD,
    RawEvent, SOURCE_FIELD, TIMESTAMP_FIELD,
};
