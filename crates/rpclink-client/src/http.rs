use rpclink_codec::CodecRegistry;
use rpclink_transport::BoxedStream;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::client::Client;
use crate::error::{ClientError, Result};
use crate::options::Options;

/// Path requested by the CONNECT bootstrap.
pub const DEFAULT_RPC_PATH: &str = "/_rpclink_";

/// Status (code and reason) a server answers a successful CONNECT with.
pub const CONNECTED: &str = "200 Connected to rpclink";

/// Upper bound on the response head accepted from the server.
const MAX_RESPONSE_HEAD: usize = 8 * 1024;

/// Tunnel through an HTTP server, then run the normal client handshake on the
/// same stream.
pub async fn new_http_client(
    mut stream: BoxedStream,
    options: Options,
    registry: &CodecRegistry,
) -> Result<Client> {
    connect_tunnel(&mut stream, DEFAULT_RPC_PATH).await?;
    Client::new(stream, options, registry).await
}

/// Send `CONNECT <path> HTTP/1.0` and require a [`CONNECTED`] status.
///
/// The response head is read one byte at a time so that nothing past the
/// blank line is consumed from `stream`.
pub async fn connect_tunnel<S>(stream: &mut S, path: &str) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let request = format!("CONNECT {path} HTTP/1.0\r\n\r\n");
    stream
        .write_all(request.as_bytes())
        .await
        .map_err(|err| ClientError::Tunnel(format!("write request: {err}")))?;
    stream
        .flush()
        .await
        .map_err(|err| ClientError::Tunnel(format!("write request: {err}")))?;

    let head = read_response_head(stream).await?;
    let status = parse_status(&head)?;
    if status != CONNECTED {
        warn!(%status, "rpc client: unexpected HTTP response");
        return Err(ClientError::Tunnel(format!(
            "unexpected HTTP response: {status}"
        )));
    }

    debug!(path, "http tunnel established");
    Ok(())
}

async fn read_response_head<R: AsyncRead + Unpin>(reader: &mut R) -> Result<String> {
    let mut head = Vec::with_capacity(128);
    loop {
        let byte = reader
            .read_u8()
            .await
            .map_err(|err| ClientError::Tunnel(format!("read response: {err}")))?;
        head.push(byte);

        if head.ends_with(b"\r\n\r\n") || head.ends_with(b"\n\n") {
            break;
        }
        if head.len() >= MAX_RESPONSE_HEAD {
            return Err(ClientError::Tunnel(format!(
                "response head exceeds {MAX_RESPONSE_HEAD} bytes"
            )));
        }
    }

    String::from_utf8(head)
        .map_err(|_| ClientError::Tunnel("response head is not valid UTF-8".to_string()))
}

/// Extract `"<code> <reason>"` from the status line of `head`.
fn parse_status(head: &str) -> Result<&str> {
    let line = head.lines().next().unwrap_or_default().trim_end_matches('\r');
    match line.split_once(' ') {
        Some((version, status)) if version.starts_with("HTTP/") => Ok(status.trim()),
        _ => Err(ClientError::Tunnel(format!("malformed status line {line:?}"))),
    }
}
