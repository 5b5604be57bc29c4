use bytes::{Buf, BufMut, BytesMut};

use crate::codec::Codec;
use crate::error::{CodecError, Result};
use crate::header::{CodecType, Header};

/// Compact binary header layout with CBOR bodies.
///
/// ```text
/// seq (8B LE) | method len (2B LE) | method (UTF-8) | error len (4B LE) | error (UTF-8)
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryCodec;

impl Codec for BinaryCodec {
    fn codec_type(&self) -> CodecType {
        CodecType::BINARY
    }

    fn encode_header(&self, header: &Header, dst: &mut BytesMut) -> Result<()> {
        let method_len = u16::try_from(header.service_method.len()).map_err(|_| {
            CodecError::InvalidHeader(format!(
                "service method too long ({} bytes, max {})",
                header.service_method.len(),
                u16::MAX
            ))
        })?;
        let error_len = u32::try_from(header.error.len()).map_err(|_| {
            CodecError::InvalidHeader(format!("error too long ({} bytes)", header.error.len()))
        })?;

        dst.reserve(8 + 2 + header.service_method.len() + 4 + header.error.len());
        dst.put_u64_le(header.seq);
        dst.put_u16_le(method_len);
        dst.put_slice(header.service_method.as_bytes());
        dst.put_u32_le(error_len);
        dst.put_slice(header.error.as_bytes());
        Ok(())
    }

    fn decode_header(&self, mut src: &[u8]) -> Result<Header> {
        if src.remaining() < 8 + 2 {
            return Err(truncated("seq/method length"));
        }
        let seq = src.get_u64_le();
        let method_len = src.get_u16_le() as usize;
        let service_method = take_string(&mut src, method_len, "service method")?;

        if src.remaining() < 4 {
            return Err(truncated("error length"));
        }
        let error_len = src.get_u32_le() as usize;
        let error = take_string(&mut src, error_len, "error")?;

        if src.has_remaining() {
            return Err(CodecError::InvalidHeader(format!(
                "{} trailing bytes after header",
                src.remaining()
            )));
        }

        Ok(Header {
            service_method,
            seq,
            error,
        })
    }

    fn encode_body(&self, value: &serde_json::Value, dst: &mut BytesMut) -> Result<()> {
        ciborium::into_writer(value, dst.writer())
            .map_err(|err| CodecError::InvalidBody(err.to_string()))
    }

    fn decode_body(&self, src: &[u8]) -> Result<serde_json::Value> {
        let mut rest = src;
        let value = ciborium::from_reader(&mut rest)
            .map_err(|err| CodecError::InvalidBody(err.to_string()))?;
        if !rest.is_empty() {
            return Err(CodecError::InvalidBody(format!(
                "{} trailing bytes after body",
                rest.len()
            )));
        }
        Ok(value)
    }
}

fn take_string(src: &mut &[u8], len: usize, field: &str) -> Result<String> {
    if src.remaining() < len {
        return Err(truncated(field));
    }
    let value = src[..len].to_vec();
    src.advance(len);
    String::from_utf8(value)
        .map_err(|_| CodecError::InvalidHeader(format!("{field} is not valid UTF-8")))
}

fn truncated(field: &str) -> CodecError {
    CodecError::InvalidHeader(format!("truncated header ({field})"))
}
