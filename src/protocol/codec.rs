//! Newline-delimited JSON framing.
//!
//! Every message on every connection (heartbeats, client requests, relayed
//! requests and responses) is one JSON value followed by `\n`. A trailing
//! value without the newline is still accepted when the peer closes right
//! after writing it.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest accepted frame, excluding the newline.
pub const MAX_FRAME_LEN: usize = 64 * 1024;

/// Error type for framing and (de)serialization.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Frame exceeds {} bytes", MAX_FRAME_LEN)]
    FrameTooLarge,
    #[error("Connection closed")]
    Closed,
}

impl CodecError {
    /// True when the peer simply went away.
    pub fn is_closed(&self) -> bool {
        matches!(self, CodecError::Closed)
    }
}

/// Read and decode the next message, skipping blank lines.
pub async fn read_message<T, R>(reader: &mut R) -> Result<T, CodecError>
where
    T: DeserializeOwned,
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let read = (&mut *reader)
            .take(MAX_FRAME_LEN as u64 + 1)
            .read_until(b'\n', &mut buf)
            .await?;
        if read == 0 {
            return Err(CodecError::Closed);
        }

        let terminated = buf.last() == Some(&b'\n');
        let frame_len = buf.len() - usize::from(terminated);
        if frame_len > MAX_FRAME_LEN {
            return Err(CodecError::FrameTooLarge);
        }

        if buf.iter().all(u8::is_ascii_whitespace) {
            if terminated {
                continue;
            }
            return Err(CodecError::Closed);
        }

        return Ok(serde_json::from_slice(&buf)?);
    }
}

/// Encode `message` as one line and flush it.
pub async fn write_message<T, W>(writer: &mut W, message: &T) -> Result<(), CodecError>
where
    T: Serialize + ?Sized,
    W: AsyncWrite + Unpin,
{
    let mut bytes = serde_json::to_vec(message)?;
    bytes.push(b'\n');
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}
