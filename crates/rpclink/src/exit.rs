use std::fmt;
use std::io;

use rpclink_client::ClientError;
use rpclink_codec::CodecError;
use rpclink_transport::TransportError;

// Exit code constants aligned with rsfulmen/DDR-0002 semantics.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: &io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: &TransportError) -> CliError {
    match err {
        TransportError::Connect { source, .. } => CliError::new(
            io_error(context, source).code,
            format!("{context}: {err}"),
        ),
        TransportError::Io(source) => io_error(context, source),
        TransportError::Timeout { .. } => CliError::new(TIMEOUT, format!("{context}: {err}")),
        TransportError::UnsupportedNetwork(_) => CliError::new(USAGE, format!("{context}: {err}")),
    }
}

pub fn codec_error(context: &str, err: &CodecError) -> CliError {
    match err {
        CodecError::Io(source) => io_error(context, source),
        CodecError::PayloadTooLarge { .. }
        | CodecError::InvalidMagic
        | CodecError::InvalidHeader(_)
        | CodecError::InvalidBody(_)
        | CodecError::Json(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        CodecError::ConnectionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
        CodecError::UnknownCodecType(_) => CliError::new(USAGE, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

pub fn client_error(context: &str, err: ClientError) -> CliError {
    match &err {
        ClientError::Transport(inner) => transport_error(context, inner),
        ClientError::Codec(inner) => codec_error(context, inner),
        ClientError::InvalidCodecType(_)
        | ClientError::Config(_)
        | ClientError::InvalidAddress(_) => CliError::new(USAGE, format!("{context}: {err}")),
        ClientError::Tunnel(_) | ClientError::Handshake(_) => {
            CliError::new(TRANSPORT_ERROR, format!("{context}: {err}"))
        }
        ClientError::ConnectTimeout(_) | ClientError::CallTimeout(_) => {
            CliError::new(TIMEOUT, format!("{context}: {err}"))
        }
        ClientError::Shutdown
        | ClientError::ConnectionLost(_)
        | ClientError::Remote(_)
        | ClientError::Cancelled => {
            CliError::new(FAILURE, format!("{context}: {err}"))
        }
        ClientError::UnbufferedDone => CliError::new(INTERNAL, format!("{context}: {err}")),
    }
}
