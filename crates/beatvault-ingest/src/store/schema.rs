//! SQLite schema for the log store.
//!
//! Two dictionary tables (`files`, `hosts`) map long, repetitive strings to
//! small integer ids; `logs` holds one row per event and references both.

use crate::{Error, Result};
use rusqlite::Connection;

/// Current schema version.
///
/// There are no migrations: a database stamped with any other version is
/// rejected at startup.
pub const SCHEMA_VERSION: i32 = 1;

/// Name of the log row table.
pub const LOGS_TABLE: &str = "logs";

/// Initialize the database schema.
///
/// Creates all tables on a fresh database. Opening a database created with
/// the current version is a no-op.
pub fn init_schema(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        create_tables(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version != SCHEMA_VERSION {
        return Err(Error::Config(format!(
            "database schema version {} is not supported (expected {})",
            current_version, SCHEMA_VERSION
        )));
    }

    Ok(())
}

/// Get the current schema version (0 if not initialized).
fn get_schema_version(conn: &Connection) -> Result<i32> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER NOT NULL
        )",
        [],
    )?;

    let version: Option<i32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .ok();

    Ok(version.unwrap_or(0))
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?)", [version])?;
    Ok(())
}

fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Origin file paths
        CREATE TABLE IF NOT EXISTS files (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE
        );

        -- Shipping host names
        CREATE TABLE IF NOT EXISTS hosts (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE
        );

        -- One row per event; id preserves arrival order
        CREATE TABLE IF NOT EXISTS logs (
            id INTEGER PRIMARY KEY,
            event_timestamp TEXT,
            file_id INTEGER NOT NULL REFERENCES files(id),
            host_id INTEGER NOT NULL REFERENCES hosts(id),
            message TEXT,
            extra TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_logs_timestamp ON logs(event_timestamp);
        CREATE INDEX IF NOT EXISTS idx_logs_file ON logs(file_id);
        CREATE INDEX IF NOT EXISTS idx_logs_host ON logs(host_id);
        "#,
    )?;

    Ok(())
}

/// Dictionary table selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DictionaryTable {
    /// Origin file paths (`source`).
    Files,
    /// Host names (`beat.name`).
    Hosts,
}

impl DictionaryTable {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Files => "files",
            Self::Hosts => "hosts",
        }
    }
}
