//! Typed view over raw shipper events.
//!
//! Shippers send loosely structured JSON objects. A handful of fields are
//! promoted to columns of the `logs` table; everything else travels in the
//! `extra` payload. [`LogEvent::from_raw`] pulls the promoted fields out and
//! rejects events that don't carry them in the expected shape.
//!
//! ```text
//! {"@timestamp": .., "message": .., "source": .., "beat": {"name": .., "hostname": .., ..}, ..}
//!       │               │              │                     │          │
//!   timestamp        message      files dict            hosts dict   dropped
//! ```

use crate::error::{Error, Result};
use serde_json::{Map, Value};

/// An event as decoded off the wire: an arbitrary JSON object.
pub type RawEvent = Map<String, Value>;

/// Event time, as sent by the shipper.
pub const TIMESTAMP_FIELD: &str = "@timestamp";
/// Log line text.
pub const MESSAGE_FIELD: &str = "message";
/// Path of the file the line was read from.
pub const SOURCE_FIELD: &str = "source";
/// Nested object describing the shipping host.
pub const HOST_FIELD: &str = "beat";
/// Host identity inside [`HOST_FIELD`].
pub const HOST_NAME_FIELD: &str = "name";
/// Redundant host name inside [`HOST_FIELD`]; dropped on ingest.
pub const HOST_HOSTNAME_FIELD: &str = "hostname";

/// Information about the host that shipped an event.
#[derive(Debug, Clone, PartialEq)]
pub struct HostInfo {
    /// Host name used as the dictionary key.
    pub name: String,

    /// Remaining keys of the host object (e.g. `version`).
    pub extra: Map<String, Value>,
}

/// A shipper event with its well-known fields extracted.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEvent {
    /// Raw `@timestamp` text, stored as sent.
    pub timestamp: Option<String>,

    /// Log line.
    pub message: Option<String>,

    /// Origin file path.
    pub source: String,

    /// Shipping host.
    pub host: HostInfo,

    /// Every other top-level key.
    pub extra: Map<String, Value>,
}

impl LogEvent {
    /// Extract the well-known fields from a raw event.
    ///
    /// `@timestamp` may be absent or null, but must be a string when present;
    /// it is kept verbatim. A non-string `message` is stored as its JSON
    /// text. `source` must be a non-empty string and `beat` an object
    /// carrying a non-empty string `name`.
    pub fn from_raw(mut raw: RawEvent) -> Result<Self> {
        let timestamp = take_optional_string(&mut raw, TIMESTAMP_FIELD, "@timestamp")?;
        let message = take_message(&mut raw);
        let source = take_required_string(&mut raw, SOURCE_FIELD, "source")?;
        let host = HostInfo::from_value(raw.remove(HOST_FIELD))?;

        Ok(Self {
            timestamp,
            message,
            source,
            host,
            extra: raw,
        })
    }

    /// Serialize the fields that are not promoted to columns.
    ///
    /// The trimmed host object is kept under `beat` unless nothing is left
    /// in it.
    pub fn extra_json(&self) -> Result<String> {
        let mut residual = self.extra.clone();
        if !self.host.extra.is_empty() {
            residual.insert(
                HOST_FIELD.to_string(),
                Value::Object(self.host.extra.clone()),
            );
        }
        Ok(serde_json::to_string(&residual)?)
    }
}

impl HostInfo {
    fn from_value(value: Option<Value>) -> Result<Self> {
        let mut host = match value {
            Some(Value::Object(map)) => map,
            Some(other) => {
                return Err(Error::InvalidField {
                    field: "beat",
                    reason: format!("expected an object, found {}", type_name(&other)),
                });
            }
            None => return Err(Error::MissingField("beat")),
        };

        let name = take_required_string(&mut host, HOST_NAME_FIELD, "beat.name")?;
        host.remove(HOST_HOSTNAME_FIELD);

        Ok(Self { name, extra: host })
    }
}

fn take_message(map: &mut Map<String, Value>) -> Option<String> {
    match map.remove(MESSAGE_FIELD)? {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

fn take_optional_string(
    map: &mut Map<String, Value>,
    key: &str,
    field: &'static str,
) -> Result<Option<String>> {
    match map.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(Error::InvalidField {
            field,
            reason: format!("expected a string, found {}", type_name(&other)),
        }),
    }
}

fn take_required_string(
    map: &mut Map<String, Value>,
    key: &str,
    field: &'static str,
) -> Result<String> {
    match take_optional_string(map, key, field)? {
        None => Err(Error::MissingField(field)),
        Some(s) if s.is_empty() => Err(Error::InvalidField {
            field,
            reason: "must not be empty".to_string(),
        }),
        Some(s) => Ok(s),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
