//! Query protocol frame codec
//!
//! Handles the length-prefixed framing of query protocol messages and the
//! request/response payload encoding.
//!
//! Frame format:
//! ```text
//! +------------------+------------------+
//! | Length (4 bytes) | Payload          |
//! +------------------+------------------+
//! ```
//!
//! Request payload: store name (u16-length string) followed by the raw key
//! bytes. Response payload: a one-byte tag — FOUND (value bytes follow),
//! EMPTY, or ERROR (error code byte + u16-length message).

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{QueryError, Result, WireErrorCode};

/// Maximum frame size (16MB). State store values are point-read payloads,
/// not batches.
const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

const TAG_FOUND: u8 = 0;
const TAG_EMPTY: u8 = 1;
const TAG_ERROR: u8 = 2;

/// Length-prefixed frame codec for the query protocol.
pub struct QueryCodec {
    max_frame_size: usize,
}

impl Default for QueryCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryCodec {
    pub fn new() -> Self {
        Self {
            max_frame_size: MAX_FRAME_SIZE,
        }
    }

    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }
}

impl Decoder for QueryCodec {
    type Item = BytesMut;
    type Error = QueryError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if src.len() < 4 {
            return Ok(None);
        }

        // Read length without consuming
        let length = (&src[..4]).get_u32() as usize;
        if length > self.max_frame_size {
            return Err(QueryError::Protocol(format!(
                "frame size {} exceeds maximum {}",
                length, self.max_frame_size
            )));
        }

        let total_length = 4 + length;
        if src.len() < total_length {
            src.reserve(total_length - src.len());
            return Ok(None);
        }

        src.advance(4);
        Ok(Some(src.split_to(length)))
    }
}

impl Encoder<BytesMut> for QueryCodec {
    type Error = QueryError;

    fn encode(&mut self, item: BytesMut, dst: &mut BytesMut) -> Result<()> {
        let length = item.len();
        if length > self.max_frame_size {
            return Err(QueryError::Protocol(format!(
                "frame size {} exceeds maximum {}",
                length, self.max_frame_size
            )));
        }

        dst.reserve(4 + length);
        dst.put_u32(length as u32);
        dst.extend_from_slice(&item);
        Ok(())
    }
}

/// A point-read request: which store, which (serialized) key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequestFrame {
    pub store_name: String,
    pub key: Bytes,
}

impl QueryRequestFrame {
    pub fn new(store_name: impl Into<String>, key: impl Into<Bytes>) -> Self {
        Self {
            store_name: store_name.into(),
            key: key.into(),
        }
    }

    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(2 + self.store_name.len() + self.key.len());
        put_string(&mut buf, &self.store_name);
        buf.extend_from_slice(&self.key);
        buf
    }

    pub fn parse(buf: &mut BytesMut) -> Result<Self> {
        let store_name = parse_string(buf)?;
        let key = buf.split().freeze();
        Ok(Self { store_name, key })
    }
}

/// A point-read reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryResponseFrame {
    Found(Bytes),
    Empty,
    Error { code: WireErrorCode, message: String },
}

impl QueryResponseFrame {
    pub fn encode(&self) -> BytesMut {
        match self {
            QueryResponseFrame::Found(value) => {
                let mut buf = BytesMut::with_capacity(1 + value.len());
                buf.put_u8(TAG_FOUND);
                buf.extend_from_slice(value);
                buf
            }
            QueryResponseFrame::Empty => {
                let mut buf = BytesMut::with_capacity(1);
                buf.put_u8(TAG_EMPTY);
                buf
            }
            QueryResponseFrame::Error { code, message } => {
                let mut buf = BytesMut::with_capacity(2 + 2 + message.len());
                buf.put_u8(TAG_ERROR);
                buf.put_u8(code.as_u8());
                put_string(&mut buf, message);
                buf
            }
        }
    }

    pub fn parse(buf: &mut BytesMut) -> Result<Self> {
        if buf.is_empty() {
            return Err(QueryError::Protocol("empty response frame".to_string()));
        }
        match buf.get_u8() {
            TAG_FOUND => Ok(QueryResponseFrame::Found(buf.split().freeze())),
            TAG_EMPTY => Ok(QueryResponseFrame::Empty),
            TAG_ERROR => {
                if buf.is_empty() {
                    return Err(QueryError::Protocol(
                        "error frame missing error code".to_string(),
                    ));
                }
                let code = WireErrorCode::from_u8(buf.get_u8());
                let message = parse_string(buf)?;
                Ok(QueryResponseFrame::Error { code, message })
            }
            tag => Err(QueryError::Protocol(format!(
                "unknown response tag: {}",
                tag
            ))),
        }
    }
}

/// Write a string (u16 length + bytes).
fn put_string(buf: &mut BytesMut, s: &str) {
    buf.put_u16(s.len() as u16);
    buf.extend_from_slice(s.as_bytes());
}

/// Parse a string (u16 length + bytes).
fn parse_string(buf: &mut BytesMut) -> Result<String> {
    if buf.len() < 2 {
        return Err(QueryError::Protocol(
            "buffer too short for string length".to_string(),
        ));
    }
    let length = buf.get_u16() as usize;
    if buf.len() < length {
        return Err(QueryError::Protocol(format!(
            "buffer too short for string of length {}",
            length
        )));
    }
    let bytes = buf.split_to(length);
    String::from_utf8(bytes.to_vec())
        .map_err(|e| QueryError::Protocol(format!("invalid UTF-8 in string: {}", e)))
}
