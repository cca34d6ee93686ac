//! Buffered bulk insert into the `logs` table.
//!
//! A [`LogInserter`] is opened against an open transaction. Rows are buffered
//! in memory and only reach SQLite on a flush: automatically every
//! `flush_rows` rows, and finally on [`LogInserter::end`]. Nothing written
//! through the inserter is visible to readers until the enclosing transaction
//! commits.

use super::schema::LOGS_TABLE;
use crate::Result;
use rusqlite::{Connection, params};

/// One persisted log row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Event time as sent by the shipper.
    pub timestamp: Option<String>,

    /// Id in the `files` dictionary.
    pub file_id: i64,

    /// Id in the `hosts` dictionary.
    pub host_id: i64,

    /// Log line.
    pub message: Option<String>,

    /// JSON object with the remaining event fields.
    pub extra: String,
}

/// Buffered multi-row writer for [`LogRecord`]s.
pub struct LogInserter<'conn> {
    conn: &'conn Connection,
    sql: String,
    buffer: Vec<LogRecord>,
    flush_rows: usize,
    written: usize,
}

impl<'conn> LogInserter<'conn> {
    /// Open an inserter on `conn`, which should be inside a transaction.
    ///
    /// The insert statement is prepared up front so a broken table surfaces
    /// before any event is transformed. `flush_rows` of 0 disables
    /// intermediate flushes.
    pub fn new(conn: &'conn Connection, flush_rows: usize) -> Result<Self> {
        let sql = format!(
            "INSERT INTO {} (event_timestamp, file_id, host_id, message, extra)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            LOGS_TABLE
        );
        conn.prepare_cached(&sql)?;

        Ok(Self {
            conn,
            sql,
            buffer: Vec::with_capacity(flush_rows.min(4096)),
            flush_rows,
            written: 0,
        })
    }

    /// Append a row, flushing the buffer once it reaches `flush_rows`.
    pub fn write(&mut self, record: LogRecord) -> Result<()> {
        self.buffer.push(record);
        if self.flush_rows > 0 && self.buffer.len() >= self.flush_rows {
            self.flush()?;
        }
        Ok(())
    }

    /// Rows buffered but not yet sent to SQLite.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Flush remaining rows and return the total written by this inserter.
    pub fn end(mut self) -> Result<usize> {
        self.flush()?;
        Ok(self.written)
    }

    fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let conn = self.conn;
        let mut stmt = conn.prepare_cached(&self.sql)?;
        for record in self.buffer.drain(..) {
            stmt.execute(params![
                record.timestamp,
                record.file_id,
                record.host_id,
                record.message,
                record.extra,
            ])?;
            self.written += 1;
        }

        tracing::trace!("Flushed log rows, {} written so far", self.written);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LogStore;

    fn record(file_id: i64, message: &str) -> LogRecord {
        LogRecord {
            timestamp: Some("2017-03-04T10:11:12.345Z".to_string()),
            file_id,
            host_id: 1,
            message: Some(message.to_string()),
            extra: "{}".to_string(),
        }
    }

    fn store_with_dictionaries() -> LogStore {
        let store = LogStore::open_in_memory().unwrap();
        store
            .connection()
            .execute_batch(
                "INSERT INTO files (name) VALUES ('/a'), ('/b');
                 INSERT INTO hosts (name) VALUES ('h1');",
            )
            .unwrap();
        store
    }

    #[test]
    fn test_rows_buffer_until_end() {
        let mut store = store_with_dictionaries();
        let tx = store.connection_mut().transaction().unwrap();

        let mut inserter = LogInserter::new(&tx, 0).unwrap();
        inserter.write(record(1, "one")).unwrap();
        inserter.write(record(2, "two")).unwrap();
        assert_eq!(inserter.pending(), 2);

        let count: i64 = tx
            .query_row("SELECT count(*) FROM logs", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);

        assert_eq!(inserter.end().unwrap(), 2);
        tx.commit().unwrap();
        assert_eq!(store.log_count().unwrap(), 2);
    }

    #[test]
    fn test_intermediate_flush() {
        let mut store = store_with_dictionaries();
        let tx = store.connection_mut().transaction().unwrap();

        let mut inserter = LogInserter::new(&tx, 2).unwrap();
        for i in 0..5 {
            inserter.write(record(1, &format!("line {i}"))).unwrap();
        }
        assert_eq!(inserter.pending(), 1);
        assert_eq!(inserter.end().unwrap(), 5);
        tx.commit().unwrap();

        let messages: Vec<String> = store
            .connection()
            .prepare("SELECT message FROM logs ORDER BY id")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();
        assert_eq!(
            messages,
            vec!["line 0", "line 1", "line 2", "line 3", "line 4"]
        );
    }

    #[test]
    fn test_rollback_discards_flushed_rows() {
        let mut store = store_with_dictionaries();
        {
            let tx = store.connection_mut().transaction().unwrap();
            let mut inserter = LogInserter::new(&tx, 1).unwrap();
            inserter.write(record(1, "gone")).unwrap();
            inserter.end().unwrap();
            // dropped without commit
        }
        assert_eq!(store.log_count().unwrap(), 0);
    }

    #[test]
    fn test_unknown_dictionary_id_fails_on_flush() {
        let mut store = store_with_dictionaries();
        let tx = store.connection_mut().transaction().unwrap();
        let mut inserter = LogInserter::new(&tx, 0).unwrap();
        inserter.write(record(99, "orphan")).unwrap();
        assert!(inserter.end().is_err());
    }
}
