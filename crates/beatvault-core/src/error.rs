//! Error types for event shape validation.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while reading a raw shipper event.
#[derive(Error, Debug)]
pub enum Error {
    /// A required field is absent from the event.
    #[error("missing field '{0}'")]
    MissingField(&'static str),

    /// A field is present but does not have the expected shape.
    #[error("invalid field '{field}': {reason}")]
    InvalidField {
        /// Dotted path of the offending field.
        field: &'static str,
        /// Description of what's wrong.
        reason: String,
    },

    /// JSON encoding/decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
