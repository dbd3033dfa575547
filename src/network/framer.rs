//! Wire codec for the peer byte stream
//!
//! There is no length prefix. A clipboard update is the ASCII tag
//! `CLIPBOARD:` followed by the raw content; anything else is chat text.
//! Every physical read of up to [`READ_UNIT`] bytes decodes to exactly one
//! [`Message`]: a long message split across reads arrives as several
//! messages, and coalesced writes arrive as one.

use tokio::io::{AsyncRead, AsyncReadExt};

/// Tag that marks a clipboard update on the wire
pub const CLIPBOARD_PREFIX: &str = "CLIPBOARD:";

/// Size of one physical read
pub const READ_UNIT: usize = 1024;

/// One logical message exchanged with the peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Chat text
    Text(String),
    /// New clipboard content
    ClipboardUpdate(String),
}

impl Message {
    /// Returns true for clipboard updates
    pub fn is_clipboard(&self) -> bool {
        matches!(self, Message::ClipboardUpdate(_))
    }

    /// Encodes the message into wire bytes
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Message::Text(text) => text.as_bytes().to_vec(),
            Message::ClipboardUpdate(content) => {
                let mut bytes = Vec::with_capacity(CLIPBOARD_PREFIX.len() + content.len());
                bytes.extend_from_slice(CLIPBOARD_PREFIX.as_bytes());
                bytes.extend_from_slice(content.as_bytes());
                bytes
            }
        }
    }

    /// Classifies one received chunk
    ///
    /// Invalid UTF-8 (including a multi-byte character cut by the read
    /// boundary) is replaced rather than rejected.
    pub fn decode(chunk: &[u8]) -> Self {
        match chunk.strip_prefix(CLIPBOARD_PREFIX.as_bytes()) {
            Some(payload) => Message::ClipboardUpdate(String::from_utf8_lossy(payload).into_owned()),
            None => Message::Text(String::from_utf8_lossy(chunk).into_owned()),
        }
    }
}

/// Reads one chunk from `reader` and decodes it
///
/// Returns the message with the number of bytes read, or `Ok(None)` when
/// the peer shut the stream down (zero-byte read).
pub async fn read_message<R>(
    reader: &mut R,
    buf: &mut [u8; READ_UNIT],
) -> std::io::Result<Option<(Message, usize)>>
where
    R: AsyncRead + Unpin,
{
    let n = reader.read(buf).await?;
    if n == 0 {
        return Ok(None);
    }
    Ok(Some((Message::decode(&buf[..n]), n)))
}
