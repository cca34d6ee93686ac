//! Batch source adapters.
//!
//! This module provides the sources that feed the pipeline driver. Every
//! source yields [`Batch`]es: an ordered list of raw events plus a one-shot
//! [`Acknowledger`] the driver fires once the batch is committed.
//!
//! # Available Sources
//!
//! - [`lumberjack`] - Lumberjack v2 listener for Beats shippers; its batches
//!   arrive through a `crossbeam_channel::Receiver<Batch>`
//! - [`JsonlSource`] - Replays JSONL files (one event per line)

pub mod jsonl;
pub mod lumberjack;

pub use jsonl::{JsonlConfig, JsonlSource};

use crate::Result;
use beatvault_core::RawEvent;
use crossbeam_channel::Receiver;
use std::fmt;

/// One-shot delivery confirmation for a batch.
///
/// [`Acknowledger::ack`] consumes the value, so a batch can't be acknowledged
/// twice. Dropping it without acking leaves the batch unacknowledged, which
/// is how failed batches are reported back to the sender.
pub struct Acknowledger {
    callback: Box<dyn FnOnce() + Send>,
}

impl Acknowledger {
    /// Wrap a callback to run on acknowledgment.
    pub fn new<F>(callback: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            callback: Box::new(callback),
        }
    }

    /// An acknowledger that does nothing.
    pub fn noop() -> Self {
        Self::new(|| {})
    }

    /// Confirm that the batch is durably stored.
    pub fn ack(self) {
        (self.callback)()
    }
}

impl fmt::Debug for Acknowledger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Acknowledger").finish_non_exhaustive()
    }
}

/// A delivery unit from a shipper.
#[derive(Debug)]
pub struct Batch {
    /// Events in delivery order.
    pub events: Vec<RawEvent>,

    /// Fired after the batch commits.
    pub ack: Acknowledger,
}

impl Batch {
    pub fn new(events: Vec<RawEvent>, ack: Acknowledger) -> Self {
        Self { events, ack }
    }
}

/// A lazy, possibly unbounded, sequence of batches.
pub trait BatchSource {
    /// Human-readable name for this source (used in logs).
    fn name(&self) -> &'static str;

    /// Wait for the next batch.
    ///
    /// Returns `Ok(None)` once the source is exhausted or shut down, and
    /// `Err` if the source itself failed.
    fn next_batch(&mut self) -> Result<Option<Batch>>;
}

/// Batches handed over by a transport running on other threads.
///
/// The source ends when every sender has been dropped.
impl BatchSource for Receiver<Batch> {
    fn name(&self) -> &'static str {
        "channel"
    }

    fn next_batch(&mut self) -> Result<Option<Batch>> {
        Ok(self.recv().ok())
    }
}
