//! Header/body wire codecs for rpclink.
//!
//! Every message on an rpclink connection is a (header, body) pair framed as:
//! - A 2-byte magic number ("RL") for stream synchronization
//! - A 4-byte little-endian header length
//! - A 4-byte little-endian body length
//! - The header, encoded by the negotiated [`Codec`]
//! - The body: opaque caller bytes, or a value encoded by the same [`Codec`]
//!
//! Codecs are selected by [`CodecType`] through an explicit [`CodecRegistry`].

pub mod binary;
pub mod codec;
pub mod error;
pub mod header;
pub mod json;
pub mod reader;
pub mod registry;
pub mod writer;

pub use binary::BinaryCodec;
pub use codec::{
    decode_message, encode_message, Codec, Message, MessageCodec, MessageRef,
    DEFAULT_MAX_PAYLOAD, MAGIC, PREFIX_SIZE,
};
pub use error::{CodecError, Result};
pub use header::{CodecType, Header};
pub use json::JsonCodec;
pub use reader::CodecReader;
pub use registry::{CodecRegistry, NewCodecFn};
pub use writer::CodecWriter;
