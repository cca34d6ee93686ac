//! Ingestion pipeline.
//!
//! - [`Dictionary`] - cached name-to-id interning for files and hosts
//! - [`EventTransformer`] - raw event to [`LogRecord`](crate::store::LogRecord)
//! - [`BatchPersister`] - one transaction per batch, ack after commit
//! - [`Pipeline`] - sequential driver over a [`BatchSource`](crate::source::BatchSource)
//!
//! # Architecture
//!
//! ```text
//! [BatchSource] → [Pipeline] → [BatchPersister] → COMMIT → ack
//!                                    │
//!                             [EventTransformer]
//!                               │          │
//!                         files dict   hosts dict
//! ```

mod dictionary;
mod driver;
mod persister;
mod transform;

pub use dictionary::{Dictionary, DictionaryStats};
pub use driver::{Pipeline, PipelineStats};
pub use persister::{BatchPersister, PersisterConfig};
pub use transform::{EventTransformer, TransformerStats};
