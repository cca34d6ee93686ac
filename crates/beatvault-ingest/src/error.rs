//! Error types for the ingestion pipeline.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during ingestion.
#[derive(Error, Debug)]
pub enum Error {
    /// SQLite error outside dictionary resolution (begin, insert, flush, commit).
    #[error("SQLite error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Looking up or creating a dictionary entry failed.
    #[error("dictionary '{table}' failed to resolve {value:?}: {source}")]
    Dictionary {
        /// Dictionary table name.
        table: &'static str,
        /// Value being resolved.
        value: String,
        /// Underlying store error.
        #[source]
        source: rusqlite::Error,
    },

    /// An event in the batch does not have the expected shape.
    #[error("malformed event at index {index}: {source}")]
    Shape {
        /// Position of the event within its batch.
        index: usize,
        /// What was wrong with it.
        #[source]
        source: beatvault_core::Error,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed or unsupported wire frame.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Undecodable event payload.
    #[error("JSON error: {0}")]
    Json(String),

    /// Configuration or schema error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The pipeline already stopped on a failed batch and won't run again.
    #[error("pipeline halted after a failed batch")]
    Halted,

    /// A batch failed; wraps the error that stopped it.
    #[error("batch {sequence} ({events} events) failed: {source}")]
    Batch {
        /// 1-based position of the batch in the run.
        sequence: u64,
        /// Number of events in the batch.
        events: usize,
        /// The error that aborted the batch.
        #[source]
        source: Box<Error>,
    },
}

/// Classification of errors by the stage that raised them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Accepting or decoding a batch failed.
    Transport,
    /// Dictionary lookup or insert failed.
    Dictionary,
    /// An event had the wrong shape.
    Shape,
    /// Writing or committing the batch failed.
    Persistence,
    /// Bad configuration or unusable database schema.
    Config,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::Dictionary => "dictionary",
            Self::Shape => "shape",
            Self::Persistence => "persistence",
            Self::Config => "config",
        }
    }
}

impl Error {
    /// The stage this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Database(_) => ErrorKind::Persistence,
            Self::Dictionary { .. } => ErrorKind::Dictionary,
            Self::Shape { .. } => ErrorKind::Shape,
            Self::Io(_) | Self::Protocol(_) | Self::Json(_) => ErrorKind::Transport,
            Self::Config(_) => ErrorKind::Config,
            Self::Halted => ErrorKind::Persistence,
            Self::Batch { source, .. } => source.kind(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        let shape = Error::Shape {
            index: 1,
            source: beatvault_core::Error::MissingField("beat"),
        };
        assert_eq!(shape.kind(), ErrorKind::Shape);
        assert_eq!(
            Error::Database(rusqlite::Error::QueryReturnedNoRows).kind(),
            ErrorKind::Persistence
        );
        assert_eq!(
            Error::Protocol("bad frame".to_string()).kind(),
            ErrorKind::Transport
        );
        assert_eq!(Error::Config("x".to_string()).kind(), ErrorKind::Config);
        assert_eq!(Error::Halted.kind(), ErrorKind::Persistence);
    }

    #[test]
    fn test_batch_kind_delegates_to_source() {
        let err = Error::Batch {
            sequence: 3,
            events: 2,
            source: Box::new(Error::Dictionary {
                table: "files",
                value: "/var/log/a.log".to_string(),
                source: rusqlite::Error::QueryReturnedNoRows,
            }),
        };
        assert_eq!(err.kind(), ErrorKind::Dictionary);
        let msg = err.to_string();
        assert!(msg.contains("batch 3"));
        assert!(msg.contains("files"));
    }

    #[test]
    fn test_shape_display_includes_index() {
        let err = Error::Shape {
            index: 7,
            source: beatvault_core::Error::MissingField("source"),
        };
        assert_eq!(
            err.to_string(),
            "malformed event at index 7: missing field 'source'"
        );
    }
}
