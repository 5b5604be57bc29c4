use crate::header::CodecType;

/// Errors that can occur during message encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The message prefix contains an invalid magic number.
    #[error("invalid message magic (expected 0x524c \"RL\")")]
    InvalidMagic,

    /// A header or body exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The header bytes could not be encoded or decoded.
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// A call body could not be encoded or decoded by the negotiated codec.
    #[error("invalid body: {0}")]
    InvalidBody(String),

    /// JSON header serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// An I/O error occurred while reading or writing messages.
    #[error("codec I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete message was received.
    #[error("connection closed")]
    ConnectionClosed,

    /// `read_body` was called without a preceding `read_header`.
    #[error("body read without a preceding header")]
    BodyWithoutHeader,

    /// No constructor is registered for the requested codec type.
    #[error("invalid codec type {0}")]
    UnknownCodecType(CodecType),
}

pub type Result<T> = std::result::Result<T, CodecError>;
