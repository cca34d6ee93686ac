//! Name-to-id interning backed by a dictionary table.
//!
//! Each [`Dictionary`] maps strings (file paths, host names) to the small
//! integer ids stored in the `logs` table. Lookups go through an in-memory
//! cache first; misses fall back to the table and create the row when it
//! doesn't exist yet.
//!
//! # Consistency
//!
//! Creation is a single `INSERT .. ON CONFLICT(name) DO NOTHING RETURNING id`
//! against a UNIQUE column, so two writers racing on the same new name end up
//! with one row; the loser re-reads the winner's id.
//!
//! Rows created while a batch transaction is open only become durable if that
//! transaction commits. Their ids are therefore *staged* and moved into the
//! cache by [`Dictionary::promote_staged`] after commit, or dropped by
//! [`Dictionary::discard_staged`] on rollback. The cache never holds an id the
//! table doesn't.

use crate::store::DictionaryTable;
use crate::{Error, Result};
use metrics::counter;
use rusqlite::{Connection, OptionalExtension};
use std::collections::HashMap;

/// Cached interning dictionary for one table.
pub struct Dictionary {
    table: DictionaryTable,
    select_sql: String,
    insert_sql: String,
    cache: HashMap<String, i64>,
    staged: HashMap<String, i64>,
    cache_hits: u64,
    lookups: u64,
    inserts: u64,
}

impl Dictionary {
    /// Create an empty (cold) dictionary for `table`.
    pub fn new(table: DictionaryTable) -> Self {
        let name = table.as_str();
        Self {
            table,
            select_sql: format!("SELECT id FROM {} WHERE name = ?1", name),
            insert_sql: format!(
                "INSERT INTO {} (name) VALUES (?1) ON CONFLICT(name) DO NOTHING RETURNING id",
                name
            ),
            cache: HashMap::new(),
            staged: HashMap::new(),
            cache_hits: 0,
            lookups: 0,
            inserts: 0,
        }
    }

    /// Resolve `value` to its id, creating the entry if needed.
    ///
    /// `conn` is normally the open batch transaction.
    pub fn resolve(&mut self, conn: &Connection, value: &str) -> Result<i64> {
        if let Some(&id) = self.cache.get(value).or_else(|| self.staged.get(value)) {
            self.cache_hits += 1;
            counter!("dictionary_cache_hits_total", "table" => self.table.as_str()).increment(1);
            return Ok(id);
        }

        self.lookups += 1;
        counter!("dictionary_lookups_total", "table" => self.table.as_str()).increment(1);

        if let Some(id) = self.select(conn, value)? {
            self.cache.insert(value.to_owned(), id);
            return Ok(id);
        }

        match self.insert(conn, value)? {
            Some(id) => {
                self.inserts += 1;
                counter!("dictionary_inserts_total", "table" => self.table.as_str())
                    .increment(1);
                tracing::debug!("New {} entry {:?} -> {}", self.table.as_str(), value, id);
                self.staged.insert(value.to_owned(), id);
                Ok(id)
            }
            None => {
                // Another writer committed the same name between our select and insert
                let id = self
                    .select(conn, value)?
                    .ok_or_else(|| self.error(value, rusqlite::Error::QueryReturnedNoRows))?;
                self.cache.insert(value.to_owned(), id);
                Ok(id)
            }
        }
    }

    /// Make ids created in the committed transaction visible to later lookups.
    pub fn promote_staged(&mut self) {
        self.cache.extend(self.staged.drain());
    }

    /// Forget ids created in a rolled-back transaction.
    pub fn discard_staged(&mut self) {
        if !self.staged.is_empty() {
            tracing::debug!(
                "Discarding {} uncommitted {} entries",
                self.staged.len(),
                self.table.as_str()
            );
            self.staged.clear();
        }
    }

    /// Get statistics about the dictionary.
    pub fn stats(&self) -> DictionaryStats {
        DictionaryStats {
            cached: self.cache.len(),
            cache_hits: self.cache_hits,
            lookups: self.lookups,
            inserts: self.inserts,
        }
    }

    fn select(&self, conn: &Connection, value: &str) -> Result<Option<i64>> {
        conn.prepare_cached(&self.select_sql)
            .and_then(|mut stmt| stmt.query_row([value], |row| row.get(0)).optional())
            .map_err(|e| self.error(value, e))
    }

    /// Returns `None` when the name already exists.
    fn insert(&self, conn: &Connection, value: &str) -> Result<Option<i64>> {
        conn.prepare_cached(&self.insert_sql)
            .and_then(|mut stmt| stmt.query_row([value], |row| row.get(0)).optional())
            .map_err(|e| self.error(value, e))
    }

    fn error(&self, value: &str, source: rusqlite::Error) -> Error {
        Error::Dictionary {
            table: self.table.as_str(),
            value: value.to_owned(),
            source,
        }
    }
}

/// Statistics about a dictionary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DictionaryStats {
    /// Committed entries held in memory.
    pub cached: usize,

    /// Lookups answered from memory.
    pub cache_hits: u64,

    /// Lookups that queried the table.
    pub lookups: u64,

    /// Rows created.
    pub inserts: u64,
}
