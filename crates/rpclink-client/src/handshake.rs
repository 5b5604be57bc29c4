use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::error::{ClientError, Result};
use crate::options::Options;

/// Upper bound on the size of an options line accepted by [`read_options`].
pub const MAX_OPTIONS_LEN: usize = 16 * 1024;

/// Write `options` as the first frame of a connection.
///
/// The frame is one JSON object terminated by `\n`, independent of the codec
/// it negotiates.
pub async fn write_options<W: AsyncWrite + Unpin>(writer: &mut W, options: &Options) -> Result<()> {
    let mut line = serde_json::to_vec(options).map_err(|err| handshake_error("encode", err))?;
    line.push(b'\n');
    writer
        .write_all(&line)
        .await
        .map_err(|err| handshake_error("write", err))?;
    writer
        .flush()
        .await
        .map_err(|err| handshake_error("flush", err))?;
    debug!(codec_type = %options.codec_type, "options sent");
    Ok(())
}

/// Read the options frame written by [`write_options`].
///
/// This is the accepting side of the handshake; servers and test peers use it
/// before wrapping the stream in the negotiated codec.
pub async fn read_options<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<Options> {
    let mut line = Vec::new();
    let read = (&mut *reader)
        .take(MAX_OPTIONS_LEN as u64 + 1)
        .read_until(b'\n', &mut line)
        .await
        .map_err(|err| handshake_error("read", err))?;
    if read == 0 {
        return Err(ClientError::Handshake(
            "connection closed before options".to_string(),
        ));
    }
    if line.last() != Some(&b'\n') {
        return Err(ClientError::Handshake(format!(
            "options line exceeds {MAX_OPTIONS_LEN} bytes or is unterminated"
        )));
    }
    serde_json::from_slice(&line).map_err(|err| handshake_error("decode", err))
}

fn handshake_error(stage: &str, err: impl std::fmt::Display) -> ClientError {
    ClientError::Handshake(format!("options {stage} failed: {err}"))
}
