//! Raw event to [`LogRecord`] conversion.

use super::dictionary::{Dictionary, DictionaryStats};
use crate::store::{DictionaryTable, LogRecord};
use crate::{Error, Result};
use beatvault_core::{LogEvent, RawEvent};
use rusqlite::Connection;

/// Turns raw events into log rows, interning file paths and host names.
pub struct EventTransformer {
    files: Dictionary,
    hosts: Dictionary,
}

impl Default for EventTransformer {
    fn default() -> Self {
        Self::new()
    }
}

impl EventTransformer {
    /// Create a transformer with cold dictionaries.
    pub fn new() -> Self {
        Self {
            files: Dictionary::new(DictionaryTable::Files),
            hosts: Dictionary::new(DictionaryTable::Hosts),
        }
    }

    /// Convert the event at `index` of its batch.
    ///
    /// The event is validated before any dictionary I/O; the file path is
    /// resolved before the host name.
    pub fn transform(
        &mut self,
        conn: &Connection,
        index: usize,
        raw: RawEvent,
    ) -> Result<LogRecord> {
        let event = LogEvent::from_raw(raw).map_err(|source| Error::Shape { index, source })?;

        let file_id = self.files.resolve(conn, &event.source)?;
        let host_id = self.hosts.resolve(conn, &event.host.name)?;
        let extra = event
            .extra_json()
            .map_err(|source| Error::Shape { index, source })?;

        Ok(LogRecord {
            timestamp: event.timestamp,
            file_id,
            host_id,
            message: event.message,
            extra,
        })
    }

    /// Call after the batch transaction commits.
    pub fn commit(&mut self) {
        self.files.promote_staged();
        self.hosts.promote_staged();
    }

    /// Call after the batch transaction rolls back.
    pub fn rollback(&mut self) {
        self.files.discard_staged();
        self.hosts.discard_staged();
    }

    /// Statistics for the file and host dictionaries.
    pub fn stats(&self) -> TransformerStats {
        TransformerStats {
            files: self.files.stats(),
            hosts: self.hosts.stats(),
        }
    }
}

/// Dictionary statistics for both tables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformerStats {
    pub files: DictionaryStats,
    pub hosts: DictionaryStats,
}
