use std::sync::Arc;
use std::time::Duration;

use rpclink_codec::{CodecError, CodecType};
use rpclink_transport::TransportError;

/// Errors surfaced by the client runtime.
///
/// `Clone` so that one terminating connection error can be delivered to every
/// pending call.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClientError {
    /// Dialing the transport failed.
    #[error("transport error: {0}")]
    Transport(Arc<TransportError>),

    /// Encoding or decoding a message failed.
    #[error("codec error: {0}")]
    Codec(Arc<CodecError>),

    /// The options named a codec type with no registered constructor.
    #[error("invalid codec type {0}")]
    InvalidCodecType(CodecType),

    /// Malformed option set.
    #[error("invalid options: {0}")]
    Config(String),

    /// Dial target not in `protocol@address` form.
    #[error("wrong format '{0}', expect protocol@addr")]
    InvalidAddress(String),

    /// The HTTP CONNECT handshake did not yield the expected status.
    #[error("http tunnel failed: {0}")]
    Tunnel(String),

    /// Writing the connection options failed.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// Client construction did not finish within the connect timeout.
    #[error("connect timeout: expect within {0:?}")]
    ConnectTimeout(Duration),

    /// The client is closing or has shut down.
    #[error("connection is shut down")]
    Shutdown,

    /// The connection failed while the call was pending.
    #[error("connection lost: {0}")]
    ConnectionLost(Arc<CodecError>),

    /// The peer answered with an error for this call.
    #[error("{0}")]
    Remote(String),

    /// The caller stopped waiting.
    #[error("call cancelled")]
    Cancelled,

    /// The caller's deadline elapsed before the reply arrived.
    #[error("call timed out after {0:?}")]
    CallTimeout(Duration),

    /// A completion channel needs room for at least one call.
    #[error("done channel is unbuffered (capacity must be at least 1)")]
    UnbufferedDone,
}

impl ClientError {
    /// True for errors that mean the connection can no longer carry calls.
    pub fn is_shutdown(&self) -> bool {
        matches!(self, ClientError::Shutdown | ClientError::ConnectionLost(_))
    }

    /// True when the caller gave up waiting (cancellation or deadline).
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ClientError::Cancelled | ClientError::CallTimeout(_))
    }
}

impl From<TransportError> for ClientError {
    fn from(err: TransportError) -> Self {
        ClientError::Transport(Arc::new(err))
    }
}

impl From<CodecError> for ClientError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::UnknownCodecType(codec_type) => ClientError::InvalidCodecType(codec_type),
            other => ClientError::Codec(Arc::new(other)),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
