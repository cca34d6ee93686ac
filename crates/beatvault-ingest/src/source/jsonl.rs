//! JSONL replay source.
//!
//! Reads events from a JSONL file (one JSON object per line) and groups them
//! into fixed-size batches. Acknowledging a batch advances
//! [`JsonlSource::committed_line`], the last line known to be stored; an
//! interrupted replay resumes from there with `skip_lines`.

use super::{Acknowledger, Batch, BatchSource};
use crate::{Error, Result};
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Configuration for the JSONL source.
#[derive(Debug, Clone)]
pub struct JsonlConfig {
    /// Input file path.
    pub input: PathBuf,

    /// Events per batch.
    pub batch_size: usize,

    /// Number of leading lines to skip (resume point).
    pub skip_lines: usize,
}

impl Default for JsonlConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::new(),
            batch_size: 500,
            skip_lines: 0,
        }
    }
}

/// JSONL file batch source.
pub struct JsonlSource {
    config: JsonlConfig,
    reader: Box<dyn BufRead + Send>,
    line_number: usize,
    events_read: usize,
    committed_line: Arc<AtomicUsize>,
}

impl JsonlSource {
    /// Open the configured input file.
    pub fn open(config: JsonlConfig) -> Result<Self> {
        let file = File::open(&config.input).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to open {}: {}", config.input.display(), e),
            ))
        })?;
        Ok(Self::from_reader(config, BufReader::new(file)))
    }

    /// Read from an arbitrary buffered reader; `config.input` is ignored.
    pub fn from_reader<R: BufRead + Send + 'static>(config: JsonlConfig, reader: R) -> Self {
        let skip_lines = config.skip_lines;
        Self {
            config,
            reader: Box::new(reader),
            line_number: 0,
            events_read: 0,
            committed_line: Arc::new(AtomicUsize::new(skip_lines)),
        }
    }

    /// Last line number covered by an acknowledged batch.
    pub fn committed_line(&self) -> usize {
        self.committed_line.load(Ordering::SeqCst)
    }

    /// Events read so far, across all batches.
    pub fn events_read(&self) -> usize {
        self.events_read
    }

    fn read_line(&mut self, buf: &mut String) -> Result<bool> {
        buf.clear();
        let n = self.reader.read_line(buf)?;
        if n == 0 {
            return Ok(false);
        }
        self.line_number += 1;
        Ok(true)
    }
}

impl BatchSource for JsonlSource {
    fn name(&self) -> &'static str {
        "jsonl"
    }

    fn next_batch(&mut self) -> Result<Option<Batch>> {
        let batch_size = self.config.batch_size.max(1);
        let mut events = Vec::with_capacity(batch_size);
        let mut line = String::new();

        while events.len() < batch_size && self.read_line(&mut line)? {
            if self.line_number <= self.config.skip_lines || line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<Value>(&line) {
                Ok(Value::Object(event)) => events.push(event),
                Ok(_) => {
                    return Err(Error::Json(format!(
                        "line {}: expected a JSON object",
                        self.line_number
                    )));
                }
                Err(e) => {
                    return Err(Error::Json(format!("line {}: {}", self.line_number, e)));
                }
            }
        }

        if events.is_empty() {
            return Ok(None);
        }
        self.events_read += events.len();

        let last_line = self.line_number;
        let committed = Arc::clone(&self.committed_line);
        let ack = Acknowledger::new(move || {
            committed.store(last_line, Ordering::SeqCst);
        });

        Ok(Some(Batch::new(events, ack)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use tempfile::TempDir;

    fn source(input: &str, batch_size: usize, skip_lines: usize) -> JsonlSource {
        let config = JsonlConfig {
            batch_size,
            skip_lines,
            ..Default::default()
        };
        JsonlSource::from_reader(config, Cursor::new(input.to_string()))
    }

    const THREE_EVENTS: &str = r#"{"source":"/a","beat":{"name":"h"},"n":1}
{"source":"/a","beat":{"name":"h"},"n":2}

{"source":"/a","beat":{"name":"h"},"n":3}
"#;

    #[test]
    fn test_batches_by_size() {
        let mut src = source(THREE_EVENTS, 2, 0);

        let first = src.next_batch().unwrap().unwrap();
        assert_eq!(first.events.len(), 2);
        let second = src.next_batch().unwrap().unwrap();
        assert_eq!(second.events.len(), 1);
        assert_eq!(second.events[0]["n"], 3);
        assert!(src.next_batch().unwrap().is_none());
        assert_eq!(src.events_read(), 3);
    }

    #[test]
    fn test_ack_advances_committed_line() {
        let mut src = source(THREE_EVENTS, 2, 0);
        assert_eq!(src.committed_line(), 0);

        let first = src.next_batch().unwrap().unwrap();
        let second = src.next_batch().unwrap().unwrap();
        assert_eq!(src.committed_line(), 0);

        first.ack.ack();
        assert_eq!(src.committed_line(), 2);
        second.ack.ack();
        assert_eq!(src.committed_line(), 4);
    }

    #[test]
    fn test_skip_lines_resumes() {
        let mut src = source(THREE_EVENTS, 10, 2);
        assert_eq!(src.committed_line(), 2);

        let batch = src.next_batch().unwrap().unwrap();
        assert_eq!(batch.events.len(), 1);
        assert_eq!(batch.events[0]["n"], 3);
    }

    #[test]
    fn test_non_object_line_is_error() {
        let mut src = source("[1,2,3]\n", 10, 0);
        let err = src.next_batch().unwrap_err();
        assert!(err.to_string().contains("line 1"));
        assert_eq!(err.kind(), crate::ErrorKind::Transport);
    }

    #[test]
    fn test_invalid_json_is_error() {
        let mut src = source("{\"source\":\n", 10, 0);
        assert!(matches!(src.next_batch(), Err(Error::Json(_))));
    }

    #[test]
    fn test_open_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("events.jsonl");
        let mut file = File::create(&path).unwrap();
        file.write_all(THREE_EVENTS.as_bytes()).unwrap();

        let mut src = JsonlSource::open(JsonlConfig {
            input: path,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(src.next_batch().unwrap().unwrap().events.len(), 3);
    }

    #[test]
    fn test_open_missing_file() {
        let result = JsonlSource::open(JsonlConfig {
            input: PathBuf::from("/definitely/not/here.jsonl"),
            ..Default::default()
        });
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
