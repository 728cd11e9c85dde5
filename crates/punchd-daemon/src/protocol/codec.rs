//! Async JSONL codec: one serde-tagged message per line.

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use punchd_core::errors::PunchdError;

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed message: {message}")]
    Decode { message: String },

    #[error("Failed to encode message: {message}")]
    Encode { message: String },
}

impl PunchdError for ProtocolError {
    fn error_code(&self) -> &'static str {
        match self {
            ProtocolError::Io(_) => "PROTOCOL_IO_ERROR",
            ProtocolError::Decode { .. } => "PROTOCOL_DECODE_ERROR",
            ProtocolError::Encode { .. } => "PROTOCOL_ENCODE_ERROR",
        }
    }
}

/// Read one message from a buffered line stream.
///
/// `Ok(None)` means the peer closed the connection. Blank lines are
/// skipped.
pub async fn read_message<R, T>(reader: &mut R) -> Result<Option<T>, ProtocolError>
where
    R: AsyncBufReadExt + Unpin,
    T: DeserializeOwned,
{
    let mut line = String::new();
    loop {
        line.clear();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            return Ok(None);
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        return serde_json::from_str(trimmed)
            .map(Some)
            .map_err(|e| ProtocolError::Decode {
                message: e.to_string(),
            });
    }
}

/// Write one message as a single JSON line.
pub async fn write_message<W, T>(writer: &mut W, message: &T) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut encoded = serde_json::to_string(message).map_err(|e| ProtocolError::Encode {
        message: e.to_string(),
    })?;
    encoded.push('\n');
    writer.write_all(encoded.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}
