use std::net::SocketAddr;

use tokio::net::{lookup_host, TcpStream};
use tracing::trace;

use crate::error::{Result, TransportError};
use crate::network::Network;

/// Resolve `address` and connect to the first candidate matching `network`.
///
/// Candidates are tried in resolution order; the last connect error is
/// reported if none succeeds.
pub async fn connect(network: Network, address: &str) -> Result<TcpStream> {
    let candidates = lookup_host(address)
        .await
        .map_err(|source| connect_error(address, source))?
        .filter(|addr| matches_family(network, addr));

    let mut last_err = None;
    for candidate in candidates {
        match TcpStream::connect(candidate).await {
            Ok(stream) => {
                stream.set_nodelay(true)?;
                trace!(%candidate, "tcp connected");
                return Ok(stream);
            }
            Err(err) => last_err = Some(err),
        }
    }

    Err(connect_error(
        address,
        last_err.unwrap_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::AddrNotAvailable,
                format!("no {network} address found"),
            )
        }),
    ))
}

fn matches_family(network: Network, addr: &SocketAddr) -> bool {
    match network {
        Network::Tcp4 => addr.is_ipv4(),
        Network::Tcp6 => addr.is_ipv6(),
        _ => true,
    }
}

fn connect_error(address: &str, source: std::io::Error) -> TransportError {
    TransportError::Connect {
        address: address.to_string(),
        source,
    }
}
