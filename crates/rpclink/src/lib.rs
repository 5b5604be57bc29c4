//! Multiplexing RPC client with pluggable codecs.
//!
//! rpclink opens a stream connection (TCP or Unix socket, optionally through
//! an HTTP CONNECT tunnel), negotiates a codec with a one-line options
//! handshake, and multiplexes many concurrent calls over it.
//!
//! # Crate Structure
//!
//! - [`transport`]: Stream dialing (TCP, Unix domain sockets)
//! - [`codec`]: Message framing, header codecs and the codec registry
//! - [`client`]: Calls, the dispatch loop, dialing and HTTP tunneling
//!
//! ```no_run
//! # async fn run() -> rpclink::client::Result<()> {
//! let client = rpclink::xdial("tcp@127.0.0.1:9999", &[]).await?;
//! let reply = client.call("Arith.Add", "[1,2]").await?;
//! println!("{}", String::from_utf8_lossy(&reply));
//! client.close().await?;
//! # Ok(())
//! # }
//! ```

/// Re-export transport types.
pub mod transport {
    pub use rpclink_transport::*;
}

/// Re-export codec types.
pub mod codec {
    pub use rpclink_codec::*;
}

/// Re-export client types.
pub mod client {
    pub use rpclink_client::*;
}

pub use rpclink_client::{dial, dial_http, xdial, Client, ClientError, Dialer, Done, Options};
