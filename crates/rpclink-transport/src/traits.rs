use std::fmt::Debug;

use tokio::io::{AsyncRead, AsyncWrite};

/// A connected, bidirectional byte stream.
///
/// Every transport returned by [`crate::dial`] implements this, as do
/// in-memory pipes such as `tokio::io::DuplexStream`, which keeps the
/// layers above testable without sockets.
pub trait RpcStream: AsyncRead + AsyncWrite + Send + Unpin + Debug {}

impl<T> RpcStream for T where T: AsyncRead + AsyncWrite + Send + Unpin + Debug {}

/// Type-erased stream handed to codecs and clients.
pub type BoxedStream = Box<dyn RpcStream>;

/// Box any stream into a [`BoxedStream`].
pub fn boxed<S: RpcStream + 'static>(stream: S) -> BoxedStream {
    Box::new(stream)
}
