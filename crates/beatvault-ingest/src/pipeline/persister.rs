//! Transactional batch writer.
//!
//! One batch is one transaction:
//!
//! 1. `BEGIN IMMEDIATE`
//! 2. open a [`LogInserter`] on `logs`
//! 3. transform each event in order and append it
//! 4. `end()` the inserter
//! 5. `COMMIT`
//! 6. promote staged dictionary ids, then acknowledge
//!
//! Any error drops the transaction (rolled back), discards staged dictionary
//! ids and drops the acknowledger unfired.

use super::transform::{EventTransformer, TransformerStats};
use crate::Result;
use crate::source::Batch;
use crate::store::{LogInserter, LogStore};
use beatvault_core::RawEvent;
use metrics::histogram;
use rusqlite::TransactionBehavior;
use std::time::Instant;

/// Configuration for the batch persister.
#[derive(Debug, Clone)]
pub struct PersisterConfig {
    /// Rows buffered before an intermediate flush inside the transaction.
    /// 0 buffers the whole batch until the end.
    pub flush_rows: usize,
}

impl Default for PersisterConfig {
    fn default() -> Self {
        Self { flush_rows: 1000 }
    }
}

/// Writes whole batches atomically and acknowledges them.
pub struct BatchPersister {
    store: LogStore,
    transformer: EventTransformer,
    config: PersisterConfig,
}

impl BatchPersister {
    /// Create a persister with cold dictionaries.
    pub fn new(store: LogStore, config: PersisterConfig) -> Self {
        Self {
            store,
            transformer: EventTransformer::new(),
            config,
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &LogStore {
        &self.store
    }

    /// Dictionary statistics.
    pub fn stats(&self) -> TransformerStats {
        self.transformer.stats()
    }

    /// Store every event of `batch`, then acknowledge it.
    ///
    /// Returns the number of rows written. On error nothing from the batch
    /// is visible and the batch is not acknowledged.
    pub fn persist(&mut self, batch: Batch) -> Result<usize> {
        let Batch { events, ack } = batch;
        let start = Instant::now();

        match self.write(events) {
            Ok(rows) => {
                self.transformer.commit();
                histogram!("ingest_batch_seconds").record(start.elapsed().as_secs_f64());
                ack.ack();
                Ok(rows)
            }
            Err(e) => {
                self.transformer.rollback();
                Err(e)
            }
        }
    }

    fn write(&mut self, events: Vec<RawEvent>) -> Result<usize> {
        let tx = self
            .store
            .connection_mut()
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut inserter = LogInserter::new(&tx, self.config.flush_rows)?;
        for (index, raw) in events.into_iter().enumerate() {
            let record = self.transformer.transform(&tx, index, raw)?;
            inserter.write(record)?;
        }
        let rows = inserter.end()?;

        tx.commit()?;
        Ok(rows)
    }
}
