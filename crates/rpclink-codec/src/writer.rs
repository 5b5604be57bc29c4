use bytes::BytesMut;
use rpclink_transport::BoxedStream;
use tokio::io::{AsyncWriteExt, WriteHalf};
use tokio_util::codec::Encoder;

use crate::codec::{MessageCodec, MessageRef};
use crate::error::Result;
use crate::header::Header;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes complete (header, body) messages to the write half of a connection.
///
/// Not synchronized: concurrent writers must serialize access externally.
/// After a failed write the stream position is unknown and the connection
/// should be considered corrupted.
pub struct CodecWriter {
    inner: WriteHalf<BoxedStream>,
    codec: MessageCodec,
    buf: BytesMut,
}

impl CodecWriter {
    /// Create a writer over `inner` encoding with `codec`.
    pub fn new(inner: WriteHalf<BoxedStream>, codec: MessageCodec) -> Self {
        Self {
            inner,
            codec,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Encode and write `header` followed by `body` as one message, then flush.
    pub async fn write(&mut self, header: &Header, body: &[u8]) -> Result<()> {
        self.buf.clear();
        self.codec
            .encode(MessageRef { header, body }, &mut self.buf)?;
        self.inner.write_all(&self.buf).await?;
        self.inner.flush().await?;
        Ok(())
    }

    /// Shut down the write direction of the connection.
    pub async fn close(&mut self) -> Result<()> {
        self.inner.shutdown().await?;
        Ok(())
    }

    /// The codec used for encoding.
    pub fn codec(&self) -> &MessageCodec {
        &self.codec
    }
}

impl std::fmt::Debug for CodecWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecWriter")
            .field("codec", &self.codec.codec().codec_type())
            .finish()
    }
}
