use std::time::Duration;

/// Errors that can occur while establishing a transport connection.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to connect to the specified address.
    #[error("failed to connect to {address}: {source}")]
    Connect {
        address: String,
        source: std::io::Error,
    },

    /// The connect attempt did not finish within the configured timeout.
    #[error("connect to {address} timed out after {timeout:?}")]
    Timeout { address: String, timeout: Duration },

    /// The network name is not one this crate can dial.
    #[error("unsupported network '{0}' (expected tcp, tcp4, tcp6 or unix)")]
    UnsupportedNetwork(String),

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
