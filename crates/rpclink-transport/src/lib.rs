//! Byte-stream transports for rpclink.
//!
//! Provides a unified interface over the connection types a client can dial:
//! - TCP (`tcp`, `tcp4`, `tcp6`)
//! - Unix domain sockets (`unix`, Linux/macOS)
//!
//! This is the lowest layer of rpclink. Everything else builds on top of
//! the [`BoxedStream`] type returned by [`dial`].

pub mod error;
pub mod network;
pub mod tcp;
pub mod traits;

#[cfg(unix)]
pub mod uds;

use std::time::Duration;

use tracing::debug;

pub use error::{Result, TransportError};
pub use network::Network;
pub use traits::{BoxedStream, RpcStream};

/// Dial `address` over `network`, bounded by `connect_timeout`.
///
/// A zero `connect_timeout` waits for the operating system to finish or fail
/// the connect attempt.
pub async fn dial(network: &str, address: &str, connect_timeout: Duration) -> Result<BoxedStream> {
    let network: Network = network.parse()?;
    let connect = async {
        match network {
            Network::Tcp | Network::Tcp4 | Network::Tcp6 => {
                tcp::connect(network, address).await.map(traits::boxed)
            }
            #[cfg(unix)]
            Network::Unix => uds::connect(address).await.map(traits::boxed),
            #[cfg(not(unix))]
            Network::Unix => Err(TransportError::UnsupportedNetwork(
                network.name().to_string(),
            )),
        }
    };

    let stream = if connect_timeout.is_zero() {
        connect.await?
    } else {
        tokio::time::timeout(connect_timeout, connect)
            .await
            .map_err(|_| TransportError::Timeout {
                address: address.to_string(),
                timeout: connect_timeout,
            })??
    };

    debug!(network = network.name(), address, "transport connected");
    Ok(stream)
}
