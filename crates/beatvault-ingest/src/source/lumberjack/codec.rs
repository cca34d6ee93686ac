//! Lumberjack v2 frame decoding.
//!
//! All integers are big-endian. Every frame starts with the version byte
//! `'2'` and a frame type:
//!
//! ```text
//! '2' 'W' [u32 window]                       window: events in the next batch
//! '2' 'J' [u32 seq] [u32 len] [len bytes]    one JSON-encoded event
//! '2' 'C' [u32 len] [len bytes]              zlib-compressed run of 'J' frames
//! '2' 'A' [u32 seq]                          ack, server to client
//! ```

use crate::{Error, Result};
use beatvault_core::RawEvent;
use flate2::read::ZlibDecoder;
use serde_json::Value;
use std::io::Read;
use tokio::io::{AsyncRead, AsyncReadExt};

pub const VERSION_V2: u8 = b'2';
pub const FRAME_WINDOW: u8 = b'W';
pub const FRAME_JSON: u8 = b'J';
pub const FRAME_COMPRESSED: u8 = b'C';
pub const FRAME_ACK: u8 = b'A';

/// One decoded window of events.
#[derive(Debug)]
pub struct WireBatch {
    /// Events in sequence order.
    pub events: Vec<RawEvent>,

    /// Sequence number of the last event; this is what gets acked.
    pub last_sequence: u32,
}

/// Encode an ACK frame for `sequence`. Sequence 0 is a keepalive.
pub fn encode_ack(sequence: u32) -> [u8; 6] {
    let seq = sequence.to_be_bytes();
    [VERSION_V2, FRAME_ACK, seq[0], seq[1], seq[2], seq[3]]
}

/// Reads whole windows from a shipper connection.
pub struct FrameReader<R> {
    reader: R,
    max_payload_bytes: usize,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R, max_payload_bytes: usize) -> Self {
        Self {
            reader,
            max_payload_bytes,
        }
    }

    /// Read the next complete window.
    ///
    /// Returns `Ok(None)` if the peer closed the connection between windows.
    pub async fn read_batch(&mut self) -> Result<Option<WireBatch>> {
        let version = match self.reader.read_u8().await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        check_version(version)?;

        let frame_type = self.reader.read_u8().await?;
        if frame_type != FRAME_WINDOW {
            return Err(Error::Protocol(format!(
                "expected window frame, got {:?}",
                frame_type as char
            )));
        }

        let window = self.reader.read_u32().await? as usize;
        if window == 0 {
            return Err(Error::Protocol("empty window".to_string()));
        }

        let mut batch = WireBatch {
            events: Vec::with_capacity(window.min(4096)),
            last_sequence: 0,
        };

        while batch.events.len() < window {
            check_version(self.reader.read_u8().await?)?;
            match self.reader.read_u8().await? {
                FRAME_JSON => {
                    let sequence = self.reader.read_u32().await?;
                    let payload = self.read_payload().await?;
                    batch.events.push(parse_event(&payload)?);
                    batch.last_sequence = sequence;
                }
                FRAME_COMPRESSED => {
                    let payload = self.read_payload().await?;
                    let inflated = inflate(&payload, self.max_payload_bytes)?;
                    decode_json_frames(&inflated, &mut batch)?;
                }
                other => {
                    return Err(Error::Protocol(format!(
                        "unexpected frame type {:?} inside window",
                        other as char
                    )));
                }
            }
        }

        if batch.events.len() > window {
            return Err(Error::Protocol(format!(
                "window of {} received {} events",
                window,
                batch.events.len()
            )));
        }

        Ok(Some(batch))
    }

    async fn read_payload(&mut self) -> Result<Vec<u8>> {
        let len = self.reader.read_u32().await? as usize;
        if len > self.max_payload_bytes {
            return Err(Error::Protocol(format!(
                "payload of {} bytes exceeds limit of {}",
                len, self.max_payload_bytes
            )));
        }
        let mut buf = vec![0u8; len];
        self.reader.read_exact(&mut buf).await?;
        Ok(buf)
    }
}

fn check_version(version: u8) -> Result<()> {
    if version != VERSION_V2 {
        return Err(Error::Protocol(format!(
            "unsupported protocol version {:?}",
            version as char
        )));
    }
    Ok(())
}

fn parse_event(payload: &[u8]) -> Result<RawEvent> {
    match serde_json::from_slice::<Value>(payload) {
        Ok(Value::Object(event)) => Ok(event),
        Ok(_) => Err(Error::Json("event is not a JSON object".to_string())),
        Err(e) => Err(Error::Json(e.to_string())),
    }
}

fn inflate(payload: &[u8], limit: usize) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    ZlibDecoder::new(payload)
        .take(limit as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|e| Error::Protocol(format!("bad compressed frame: {}", e)))?;
    if out.len() > limit {
        return Err(Error::Protocol(format!(
            "compressed frame inflates past {} bytes",
            limit
        )));
    }
    Ok(out)
}

/// Decode the `'J'` frames of an inflated compressed block.
fn decode_json_frames(mut buf: &[u8], batch: &mut WireBatch) -> Result<()> {
    while !buf.is_empty() {
        check_version(take_u8(&mut buf)?)?;
        let frame_type = take_u8(&mut buf)?;
        if frame_type != FRAME_JSON {
            return Err(Error::Protocol(format!(
                "unexpected frame type {:?} inside compressed frame",
                frame_type as char
            )));
        }
        let sequence = take_u32(&mut buf)?;
        let len = take_u32(&mut buf)? as usize;
        if buf.len() < len {
            return Err(truncated());
        }
        let (payload, rest) = buf.split_at(len);
        batch.events.push(parse_event(payload)?);
        batch.last_sequence = sequence;
        buf = rest;
    }
    Ok(())
}

fn take_u8(buf: &mut &[u8]) -> Result<u8> {
    let (&b, rest) = buf.split_first().ok_or_else(truncated)?;
    *buf = rest;
    Ok(b)
}

fn take_u32(buf: &mut &[u8]) -> Result<u32> {
    if buf.len() < 4 {
        return Err(truncated());
    }
    let (head, rest) = buf.split_at(4);
    *buf = rest;
    Ok(u32::from_be_bytes([head[0], head[1], head[2], head[3]]))
}

fn truncated() -> Error {
    Error::Protocol("truncated compressed frame".to_string())
}
