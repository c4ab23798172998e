use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::warn;

use crate::buffer::{Buffer, Reader};
use crate::codec::{deserialize, serialize, space_required};
use crate::error::{CodecError, Result};
use crate::time::TimeValue;

/// Frame header: magic (2) + body length (4) = 6 bytes.
pub const HEADER_SIZE: usize = 6;

/// Magic bytes: "SH" (0x53 0x48).
pub const MAGIC: [u8; 2] = [0x53, 0x48];

/// Default maximum frame body size: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// A message as it travels between connections, addressed by names rather
/// than connection-local ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireMessage {
    pub sender: String,
    pub message_type: String,
    pub timestamp: TimeValue,
    pub payload: Bytes,
}

impl WireMessage {
    pub fn new(
        sender: impl Into<String>,
        message_type: impl Into<String>,
        timestamp: TimeValue,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            sender: sender.into(),
            message_type: message_type.into(),
            timestamp,
            payload: payload.into(),
        }
    }

    /// Encoded body size, not counting the frame header.
    pub fn body_size(&self) -> usize {
        let mut len = space_required(0, &self.sender);
        len += space_required(len, &self.message_type);
        len += space_required(len, &self.timestamp);
        len + space_required(len, &self.payload)
    }

    /// The total wire size of this message (header + body).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.body_size()
    }

    fn encode_body(&self) -> Result<Buffer> {
        let mut body = Buffer::with_capacity(self.body_size());
        serialize(&mut body, &self.sender)?;
        serialize(&mut body, &self.message_type)?;
        serialize(&mut body, &self.timestamp)?;
        serialize(&mut body, &self.payload)?;
        Ok(body)
    }

    fn decode_body(body: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(body);
        let message = Self {
            sender: deserialize(&mut reader)?,
            message_type: deserialize(&mut reader)?,
            timestamp: deserialize(&mut reader)?,
            payload: deserialize(&mut reader)?,
        };
        if !reader.is_exhausted() {
            return Err(CodecError::TrailingBytes(reader.remaining()));
        }
        Ok(message)
    }
}

/// Encode a message into the wire format.
///
/// Wire format:
/// ```text
/// ┌────────────┬────────────┬──────────────────────────────────────────┐
/// │ Magic (2B) │ Length     │ Body (Length bytes, codec-encoded)        │
/// │ 0x53 0x48  │ (4B BE)    │ sender | type | timestamp | payload       │
/// └────────────┴────────────┴──────────────────────────────────────────┘
/// ```
///
/// Body alignment is relative to the start of the body.
pub fn encode_message(message: &WireMessage, dst: &mut BytesMut) -> Result<()> {
    let body = message.encode_body()?;
    if body.len() > u32::MAX as usize {
        return Err(CodecError::PayloadTooLarge {
            size: body.len(),
            max: u32::MAX as usize,
        });
    }
    dst.reserve(HEADER_SIZE + body.len());
    dst.put_slice(&MAGIC);
    dst.put_u32(body.len() as u32);
    dst.put_slice(body.as_slice());
    Ok(())
}

/// Decode a message from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer.
pub fn decode_message(src: &mut BytesMut, max_payload: usize) -> Result<Option<WireMessage>> {
    if src.len() < HEADER_SIZE {
        return Ok(None);
    }

    if src[0..2] != MAGIC {
        warn!(got = ?&src[0..2], "frame with bad magic");
        return Err(CodecError::InvalidMagic);
    }

    let body_len = u32::from_be_bytes([src[2], src[3], src[4], src[5]]) as usize;
    if body_len > max_payload {
        warn!(size = body_len, max = max_payload, "frame body too large");
        return Err(CodecError::PayloadTooLarge {
            size: body_len,
            max: max_payload,
        });
    }

    if src.len() < HEADER_SIZE + body_len {
        return Ok(None);
    }

    src.advance(HEADER_SIZE);
    let body = src.split_to(body_len);
    WireMessage::decode_body(&body).map(Some)
}

/// Configuration for wire framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireConfig {
    /// Maximum frame body size in bytes. Default: 16 MiB.
    pub max_payload_size: usize,
}

impl Default for WireConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}
