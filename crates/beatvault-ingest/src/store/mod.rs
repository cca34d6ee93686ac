//! SQLite-backed log store.
//!
//! - [`LogStore`] - owns the connection and the schema
//! - [`LogInserter`] - buffered bulk insert used inside a batch transaction
//! - [`schema`] - table definitions and [`DictionaryTable`]

mod inserter;
pub mod schema;

pub use inserter::{LogInserter, LogRecord};
pub use schema::{DictionaryTable, LOGS_TABLE};

use crate::{Error, Result};
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

/// Owner of the SQLite connection holding logs and dictionaries.
pub struct LogStore {
    conn: Connection,
}

impl LogStore {
    /// Open or create a store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        tracing::info!("Opening log store at {}", path.display());
        let conn = Connection::open(path)
            .map_err(|e| Error::Config(format!("Failed to open SQLite: {}", e)))?;

        // Acknowledged batches must survive a crash, hence synchronous=FULL
        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA synchronous=FULL; PRAGMA foreign_keys=ON;",
        )?;

        conn.busy_timeout(Duration::from_secs(5))?;

        schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Shared access to the connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Exclusive access, needed to open a transaction.
    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    /// Number of committed log rows.
    pub fn log_count(&self) -> Result<u64> {
        let sql = format!("SELECT count(*) FROM {}", LOGS_TABLE);
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Number of entries in a dictionary table.
    pub fn dictionary_size(&self, table: DictionaryTable) -> Result<u64> {
        let sql = format!("SELECT count(*) FROM {}", table.as_str());
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
