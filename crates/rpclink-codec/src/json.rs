use bytes::{BufMut, BytesMut};

use crate::codec::Codec;
use crate::error::{CodecError, Result};
use crate::header::{CodecType, Header};

/// JSON header layout `{"service_method":..,"seq":..,"error":..}`; bodies
/// are plain JSON documents.
///
/// Not part of [`crate::CodecRegistry::default`]; register it explicitly with
/// `registry.register(CodecType::JSON, || Box::new(JsonCodec))`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn codec_type(&self) -> CodecType {
        CodecType::JSON
    }

    fn encode_header(&self, header: &Header, dst: &mut BytesMut) -> Result<()> {
        serde_json::to_writer(dst.writer(), header)?;
        Ok(())
    }

    fn decode_header(&self, src: &[u8]) -> Result<Header> {
        Ok(serde_json::from_slice(src)?)
    }

    fn encode_body(&self, value: &serde_json::Value, dst: &mut BytesMut) -> Result<()> {
        serde_json::to_writer(dst.writer(), value)?;
        Ok(())
    }

    fn decode_body(&self, src: &[u8]) -> Result<serde_json::Value> {
        serde_json::from_slice(src).map_err(|err| CodecError::InvalidBody(err.to_string()))
    }
}
