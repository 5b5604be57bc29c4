use std::fmt;
use std::sync::Arc;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{CodecError, Result};
use crate::header::{CodecType, Header};

/// Message prefix: magic (2) + header length (4) + body length (4) = 10 bytes.
pub const PREFIX_SIZE: usize = 10;

/// Magic bytes: "RL" (0x52 0x4c).
pub const MAGIC: [u8; 2] = [0x52, 0x4c];

/// Default maximum size of a header or a body: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// Encoding negotiated for one connection.
///
/// A codec lays out the [`Header`] and, for typed calls, the body. Framing is
/// shared by every codec. Bodies pass through [`serde_json::Value`] so the
/// trait stays object safe. Encoding must not depend on connection state, so
/// one instance can serve both directions of a stream.
pub trait Codec: Send + Sync + fmt::Debug {
    /// The registry token this codec answers to.
    fn codec_type(&self) -> CodecType;

    /// Append the encoded header to `dst`.
    fn encode_header(&self, header: &Header, dst: &mut BytesMut) -> Result<()>;

    /// Decode a header from exactly the bytes produced by `encode_header`.
    fn decode_header(&self, src: &[u8]) -> Result<Header>;

    /// Append the encoded body `value` to `dst`.
    fn encode_body(&self, value: &serde_json::Value, dst: &mut BytesMut) -> Result<()>;

    /// Decode a body from exactly the bytes produced by `encode_body`.
    fn decode_body(&self, src: &[u8]) -> Result<serde_json::Value>;
}

/// A decoded (header, body) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: Header,
    pub body: Bytes,
}

/// Borrowed (header, body) pair for encoding.
#[derive(Debug, Clone, Copy)]
pub struct MessageRef<'a> {
    pub header: &'a Header,
    pub body: &'a [u8],
}

/// Encode a header and body into `dst` as a single message.
///
/// Wire format:
/// ```text
/// ┌────────────┬─────────────┬─────────────┬──────────────┬────────────┐
/// │ Magic (2B) │ Header len  │ Body len    │ Header       │ Body       │
/// │ 0x52 0x4c  │ (4B LE)     │ (4B LE)     │ (codec)      │ (opaque)   │
/// └────────────┴─────────────┴─────────────┴──────────────┴────────────┘
/// ```
///
/// Nothing is appended to `dst` when an error is returned.
pub fn encode_message(
    codec: &dyn Codec,
    header: &Header,
    body: &[u8],
    dst: &mut BytesMut,
    max_payload: usize,
) -> Result<()> {
    check_size(body.len(), max_payload)?;

    let mut header_buf = BytesMut::new();
    codec.encode_header(header, &mut header_buf)?;
    check_size(header_buf.len(), max_payload)?;

    dst.reserve(PREFIX_SIZE + header_buf.len() + body.len());
    dst.put_slice(&MAGIC);
    dst.put_u32_le(header_buf.len() as u32);
    dst.put_u32_le(body.len() as u32);
    dst.put_slice(&header_buf);
    dst.put_slice(body);
    Ok(())
}

/// Decode one message from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete message yet.
/// On success, consumes the message bytes from the buffer.
pub fn decode_message(
    codec: &dyn Codec,
    src: &mut BytesMut,
    max_payload: usize,
) -> Result<Option<Message>> {
    if src.len() < PREFIX_SIZE {
        return Ok(None);
    }

    if src[0..2] != MAGIC {
        return Err(CodecError::InvalidMagic);
    }

    let header_len = read_u32_le(&src[2..6]) as usize;
    let body_len = read_u32_le(&src[6..10]) as usize;
    check_size(header_len, max_payload)?;
    check_size(body_len, max_payload)?;

    let total = PREFIX_SIZE + header_len + body_len;
    if src.len() < total {
        src.reserve(total - src.len());
        return Ok(None);
    }

    src.advance(PREFIX_SIZE);
    let header_bytes = src.split_to(header_len);
    let body = src.split_to(body_len).freeze();
    let header = codec.decode_header(&header_bytes)?;

    Ok(Some(Message { header, body }))
}

fn read_u32_le(bytes: &[u8]) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(bytes);
    u32::from_le_bytes(raw)
}

fn check_size(size: usize, max: usize) -> Result<()> {
    let max = max.min(u32::MAX as usize);
    if size > max {
        return Err(CodecError::PayloadTooLarge { size, max });
    }
    Ok(())
}

/// `tokio_util` codec adapter around a negotiated [`Codec`].
#[derive(Debug, Clone)]
pub struct MessageCodec {
    codec: Arc<dyn Codec>,
    max_payload: usize,
}

impl MessageCodec {
    /// Wrap `codec` with the default payload limit.
    pub fn new(codec: Arc<dyn Codec>) -> Self {
        Self {
            codec,
            max_payload: DEFAULT_MAX_PAYLOAD,
        }
    }

    /// Override the per-section payload limit.
    pub fn with_max_payload(mut self, max_payload: usize) -> Self {
        self.max_payload = max_payload;
        self
    }

    /// The wrapped header codec.
    pub fn codec(&self) -> &Arc<dyn Codec> {
        &self.codec
    }

    /// Current payload limit.
    pub fn max_payload(&self) -> usize {
        self.max_payload
    }
}

impl Decoder for MessageCodec {
    type Item = Message;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>> {
        decode_message(self.codec.as_ref(), src, self.max_payload)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Message>> {
        match self.decode(src)? {
            Some(message) => Ok(Some(message)),
            None if src.is_empty() => Ok(None),
            None => Err(CodecError::ConnectionClosed),
        }
    }
}

impl Encoder<MessageRef<'_>> for MessageCodec {
    type Error = CodecError;

    fn encode(&mut self, item: MessageRef<'_>, dst: &mut BytesMut) -> Result<()> {
        encode_message(
            self.codec.as_ref(),
            item.header,
            item.body,
            dst,
            self.max_payload,
        )
    }
}
