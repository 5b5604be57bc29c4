use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use rpclink_transport::BoxedStream;
use tracing::debug;

use crate::binary::BinaryCodec;
use crate::codec::{Codec, MessageCodec};
use crate::error::{CodecError, Result};
use crate::header::CodecType;
use crate::reader::CodecReader;
use crate::writer::CodecWriter;

/// Constructor stored in a [`CodecRegistry`].
pub type NewCodecFn = Arc<dyn Fn() -> Box<dyn Codec> + Send + Sync>;

/// Maps codec type tokens to codec constructors.
///
/// The registry is a plain value: build one, register what the deployment
/// needs, and hand it to the client constructor or dialer. The default
/// registry knows only [`CodecType::BINARY`].
#[derive(Clone)]
pub struct CodecRegistry {
    constructors: HashMap<CodecType, NewCodecFn>,
}

impl CodecRegistry {
    /// A registry with no codecs at all.
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Register (or replace) the constructor for `codec_type`.
    pub fn register<F>(&mut self, codec_type: CodecType, constructor: F) -> &mut Self
    where
        F: Fn() -> Box<dyn Codec> + Send + Sync + 'static,
    {
        debug!(%codec_type, "registering codec");
        self.constructors.insert(codec_type, Arc::new(constructor));
        self
    }

    /// Builder-style [`register`](Self::register).
    pub fn with<F>(mut self, codec_type: CodecType, constructor: F) -> Self
    where
        F: Fn() -> Box<dyn Codec> + Send + Sync + 'static,
    {
        self.register(codec_type, constructor);
        self
    }

    /// Whether a constructor is registered for `codec_type`.
    pub fn contains(&self, codec_type: &CodecType) -> bool {
        self.constructors.contains_key(codec_type)
    }

    /// Registered codec types, sorted.
    pub fn types(&self) -> Vec<CodecType> {
        let mut types: Vec<_> = self.constructors.keys().cloned().collect();
        types.sort();
        types
    }

    /// Construct the codec registered for `codec_type`.
    pub fn new_codec(&self, codec_type: &CodecType) -> Result<Box<dyn Codec>> {
        let constructor = self
            .constructors
            .get(codec_type)
            .ok_or_else(|| CodecError::UnknownCodecType(codec_type.clone()))?;
        Ok(constructor())
    }

    /// Construct the codec for `codec_type` and wrap `stream` in it.
    pub fn open(
        &self,
        codec_type: &CodecType,
        stream: BoxedStream,
    ) -> Result<(CodecReader, CodecWriter)> {
        let codec: Arc<dyn Codec> = Arc::from(self.new_codec(codec_type)?);
        let message_codec = MessageCodec::new(codec);
        let (read_half, write_half) = tokio::io::split(stream);
        Ok((
            CodecReader::new(read_half, message_codec.clone()),
            CodecWriter::new(write_half, message_codec),
        ))
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::empty().with(CodecType::BINARY, || Box::new(BinaryCodec))
    }
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodecRegistry")
            .field("types", &self.types())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::header::Header;
    use crate::json::JsonCodec;

    #[test]
    fn default_registers_only_binary() {
        let registry = CodecRegistry::default();
        assert!(registry.contains(&CodecType::BINARY));
        assert!(!registry.contains(&CodecType::JSON));
        assert_eq!(registry.types(), vec![CodecType::BINARY]);
    }

    #[test]
    fn unknown_type_is_an_error_not_a_panic() {
        let registry = CodecRegistry::default();
        match registry.new_codec(&CodecType::JSON) {
            Err(CodecError::UnknownCodecType(codec_type)) => {
                assert_eq!(codec_type, CodecType::JSON)
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn registered_json_codec_resolves() {
        let mut registry = CodecRegistry::default();
        registry.register(CodecType::JSON, || Box::new(JsonCodec));
        let codec = registry.new_codec(&CodecType::JSON).unwrap();
        assert_eq!(codec.codec_type(), CodecType::JSON);
        assert_eq!(registry.types().len(), 2);
    }

    #[tokio::test]
    async fn open_wraps_both_directions() {
        let registry = CodecRegistry::default().with(CodecType::JSON, || Box::new(JsonCodec));
        let (left, right) = tokio::io::duplex(4096);

        let (_left_reader, mut left_writer) =
            registry.open(&CodecType::JSON, Box::new(left)).unwrap();
        let (mut right_reader, _right_writer) =
            registry.open(&CodecType::JSON, Box::new(right)).unwrap();

        let header = Header::new("Arith.Add", 3);
        left_writer.write(&header, b"[1,2]").await.unwrap();

        assert_eq!(right_reader.read_header().await.unwrap(), header);
        let mut body = Bytes::new();
        right_reader.read_body(Some(&mut body)).await.unwrap();
        assert_eq!(body.as_ref(), b"[1,2]");
    }

    #[test]
    fn open_unknown_type_fails() {
        let registry = CodecRegistry::empty();
        let (left, _right) = tokio::io::duplex(64);
        assert!(matches!(
            registry.open(&CodecType::BINARY, Box::new(left)),
            Err(CodecError::UnknownCodecType(_))
        ));
    }
}
