use std::path::Path;

use tokio::net::UnixStream;
use tracing::debug;

use crate::error::{Result, TransportError};

/// Maximum socket path length.
/// Unix `sockaddr_un.sun_path` is typically 108 bytes on Linux, 104 on macOS.
#[cfg(target_os = "linux")]
const MAX_PATH_LEN: usize = 108;
#[cfg(not(target_os = "linux"))]
const MAX_PATH_LEN: usize = 104;

/// Connect to a listening Unix domain socket.
pub async fn connect(path: impl AsRef<Path>) -> Result<UnixStream> {
    let path = path.as_ref();
    let address = path.display().to_string();

    let path_bytes = path.as_os_str().len();
    if path_bytes >= MAX_PATH_LEN {
        return Err(TransportError::Connect {
            address,
            source: std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("socket path too long ({path_bytes} bytes, max {MAX_PATH_LEN})"),
            ),
        });
    }

    let stream = UnixStream::connect(path)
        .await
        .map_err(|source| TransportError::Connect { address, source })?;
    debug!(?path, "connected to unix domain socket");
    Ok(stream)
}
