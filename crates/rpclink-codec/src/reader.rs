use bytes::Bytes;
use futures_util::StreamExt;
use rpclink_transport::BoxedStream;
use tokio::io::ReadHalf;
use tokio_util::codec::FramedRead;

use crate::codec::MessageCodec;
use crate::error::{CodecError, Result};
use crate::header::Header;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Reads (header, body) pairs from the read half of a connection.
///
/// [`read_header`](Self::read_header) must be called before each
/// [`read_body`](Self::read_body). A body that is never read is discarded
/// by the next `read_header`.
pub struct CodecReader {
    framed: FramedRead<ReadHalf<BoxedStream>, MessageCodec>,
    body: Option<Bytes>,
}

impl CodecReader {
    /// Create a reader over `inner` decoding with `codec`.
    pub fn new(inner: ReadHalf<BoxedStream>, codec: MessageCodec) -> Self {
        Self {
            framed: FramedRead::with_capacity(inner, codec, INITIAL_BUFFER_CAPACITY),
            body: None,
        }
    }

    /// Read the next header.
    ///
    /// Returns `Err(CodecError::ConnectionClosed)` when EOF is reached.
    pub async fn read_header(&mut self) -> Result<Header> {
        self.body = None;
        match self.framed.next().await {
            Some(Ok(message)) => {
                self.body = Some(message.body);
                Ok(message.header)
            }
            Some(Err(err)) => Err(err),
            None => Err(CodecError::ConnectionClosed),
        }
    }

    /// Read the body that followed the last header.
    ///
    /// Passing `None` discards the body while still advancing the stream.
    pub async fn read_body(&mut self, slot: Option<&mut Bytes>) -> Result<()> {
        let body = self.body.take().ok_or(CodecError::BodyWithoutHeader)?;
        if let Some(slot) = slot {
            *slot = body;
        }
        Ok(())
    }

    /// The codec used for decoding.
    pub fn codec(&self) -> &MessageCodec {
        self.framed.decoder()
    }
}

impl std::fmt::Debug for CodecReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecReader")
            .field("codec", &self.codec().codec().codec_type())
            .field("body_pending", &self.body.is_some())
            .finish()
    }
}
