//! Beatvault ingestion pipeline.
//!
//! Receives log event batches from Beats shippers, interns file paths and
//! host names into dictionary tables, and writes each batch to SQLite in a
//! single transaction, acknowledging it only once committed.
//!
//! # Modules
//!
//! - [`pipeline`] - dictionaries, event transformer, batch persister, driver
//! - [`source`] - batch sources (Lumberjack listener, JSONL replay)
//! - [`store`] - SQLite schema and buffered bulk inserter
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   BatchSource   │  (Lumberjack connections, JSONL files)
//! └────────┬────────┘
//!          │ Batch { events, ack }
//!          ▼
//! ┌─────────────────┐
//! │    Pipeline     │  one batch at a time
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ BatchPersister  │  BEGIN → transform + insert → COMMIT → ack
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │    LogStore     │  SQLite: logs, files, hosts
//! └─────────────────┘
//! ```

pub mod error;
pub mod pipeline;
pub mod source;
pub mod store;

pub use error::{Error, ErrorKind, Result};

pub use pipeline::{
    BatchPersister, Dictionary, DictionaryStats, EventTransformer, PersisterConfig, Pipeline,
    PipelineStats, TransformerStats,
};

pub use source::{
    Acknowledger, Batch, BatchSource, JsonlConfig, JsonlSource,
    lumberjack::{LumberjackConfig, LumberjackServer},
};

pub use store::{DictionaryTable, LogInserter, LogRecord, LogStore};
