//! JSON-lines encoding for the plugin channel
//!
//! Every message is a single line of compact JSON terminated by `\n`:
//! ```text
//! {"id":1,"cmd":"plugin:printer|list_printers","args":{}}
//! ```
//!
//! Lines longer than [`MAX_LINE_SIZE`] are refused to bound memory use.

use crate::{Invoke, error::ProtocolError, error::Result};
use serde::Serialize;

#[cfg(feature = "async")]
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum allowed line size (16 MiB)
pub const MAX_LINE_SIZE: usize = 16 * 1024 * 1024;

/// Encode a message as one line of JSON, without the trailing newline
///
/// # Example
/// ```
/// use protocol::{InvokeResponse, encode_line};
///
/// let line = encode_line(&InvokeResponse::rejected(Some(1), "Device not found")).unwrap();
/// assert!(!line.contains('\n'));
/// ```
pub fn encode_line<T: Serialize>(message: &T) -> Result<String> {
    let line = serde_json::to_string(message)?;
    check_size(line.len())?;
    Ok(line)
}

/// Decode one invocation line
///
/// Surrounding whitespace, including the line terminator, is ignored. Bytes
/// that are not valid UTF-8 fail as a JSON error.
///
/// # Example
/// ```
/// use protocol::decode_invoke;
///
/// let invoke = decode_invoke("{\"id\":7,\"cmd\":\"list_printers\"}\n").unwrap();
/// assert_eq!(invoke.id, 7);
/// ```
pub fn decode_invoke(line: impl AsRef<[u8]>) -> Result<Invoke> {
    let line = line.as_ref();
    check_size(line.len())?;
    serde_json::from_slice(line.trim_ascii()).map_err(ProtocolError::from)
}

/// Bounded line reader over an async byte stream
///
/// Never buffers more than the size limit of a single line. An oversized line
/// is skipped up to its newline and reported as
/// [`ProtocolError::LineTooLong`]; reading continues with the next line.
///
/// [`next_line`](Self::next_line) is cancel safe: a partially read line is
/// kept across cancellation, so it can be used as a `tokio::select!` branch.
#[cfg(feature = "async")]
#[derive(Debug)]
pub struct LineReader<R> {
    reader: R,
    max: usize,
    line: Vec<u8>,
    size: usize,
    pending: bool,
}

#[cfg(feature = "async")]
impl<R: AsyncBufRead + Unpin> LineReader<R> {
    pub fn new(reader: R) -> Self {
        Self::with_max(reader, MAX_LINE_SIZE)
    }

    pub fn with_max(reader: R, max: usize) -> Self {
        Self {
            reader,
            max,
            line: Vec::new(),
            size: 0,
            pending: false,
        }
    }

    /// Read the next line without its `\n` terminator
    ///
    /// Returns `Ok(None)` at end of input. A final line without a terminator
    /// is still returned.
    pub async fn next_line(&mut self) -> Result<Option<Vec<u8>>> {
        loop {
            let available = self.reader.fill_buf().await?;
            if available.is_empty() {
                if !self.pending {
                    return Ok(None);
                }
                break;
            }
            self.pending = true;

            let (chunk, used, done) = match available.iter().position(|&b| b == b'\n') {
                Some(end) => (&available[..end], end + 1, true),
                None => (available, available.len(), false),
            };
            self.size += chunk.len();
            if self.size <= self.max {
                self.line.extend_from_slice(chunk);
            } else if !self.line.is_empty() {
                self.line = Vec::new();
            }
            self.reader.consume(used);

            if done {
                break;
            }
        }

        let size = std::mem::take(&mut self.size);
        let line = std::mem::take(&mut self.line);
        self.pending = false;

        if size > self.max {
            return Err(ProtocolError::LineTooLong {
                size,
                max: self.max,
            });
        }
        Ok(Some(line))
    }
}

/// Write an already-encoded line to an async writer and flush it
#[cfg(feature = "async")]
pub async fn write_line_async<W: AsyncWrite + Unpin>(writer: &mut W, line: &str) -> Result<()> {
    check_size(line.len())?;
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

fn check_size(size: usize) -> Result<()> {
    if size > MAX_LINE_SIZE {
        return Err(ProtocolError::LineTooLong {
            size,
            max: MAX_LINE_SIZE,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{HostEvent, InvokeResponse, PermissionState};

    #[test]
    fn test_encoded_response_is_one_line() {
        let line = encode_line(&InvokeResponse::rejected(Some(2), "Transfer\nfailed")).unwrap();
        assert!(!line.contains('\n'));
        assert!(line.contains("\"status\":\"rejected\""));
    }

    #[test]
    fn test_decode_ignores_trailing_whitespace() {
        let invoke = decode_invoke("  {\"id\":1,\"cmd\":\"test_print\",\"args\":{\"value\":\"x\"}}\r\n")
            .unwrap();
        assert_eq!(invoke.cmd, "test_print");
        assert_eq!(invoke.args["value"], "x");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode_invoke("not json"),
            Err(ProtocolError::Json(_))
        ));
        assert!(decode_invoke("{\"cmd\":\"list_printers\"}").is_err());
    }

    #[test]
    fn test_decode_rejects_invalid_utf8() {
        assert!(matches!(
            decode_invoke(b"\xff\xfe garbage"),
            Err(ProtocolError::Json(_))
        ));
    }

    #[test]
    fn test_oversized_line_rejected() {
        let line = " ".repeat(MAX_LINE_SIZE + 1);
        assert!(matches!(
            decode_invoke(&line),
            Err(ProtocolError::LineTooLong { .. })
        ));
    }

    #[test]
    fn test_event_encodes_on_one_line() {
        let line = encode_line(&HostEvent::Permission {
            device_name: "/dev/bus/usb/001/002".to_string(),
            state: PermissionState::Granted,
        })
        .unwrap();
        assert!(line.starts_with('{'));
        assert!(line.contains("\"state\":\"granted\""));
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn test_write_line_async() {
        let mut buffer = Vec::new();
        write_line_async(&mut buffer, "{\"id\":1}").await.unwrap();
        assert_eq!(buffer, b"{\"id\":1}\n");
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn test_line_reader_splits_lines() {
        let input: &[u8] = b"first\n\nsecond\r\nlast";
        let mut lines = LineReader::new(input);

        assert_eq!(lines.next_line().await.unwrap().unwrap(), b"first");
        assert_eq!(lines.next_line().await.unwrap().unwrap(), b"");
        assert_eq!(lines.next_line().await.unwrap().unwrap(), b"second\r");
        assert_eq!(lines.next_line().await.unwrap().unwrap(), b"last");
        assert!(lines.next_line().await.unwrap().is_none());
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn test_line_reader_skips_oversized_line() {
        let input: &[u8] = b"0123456789abcdef\nok\n";
        let mut lines = LineReader::with_max(tokio::io::BufReader::with_capacity(4, input), 8);

        assert!(matches!(
            lines.next_line().await,
            Err(ProtocolError::LineTooLong { size: 16, max: 8 })
        ));
        assert!(lines.line.capacity() <= 8);
        assert_eq!(lines.next_line().await.unwrap().unwrap(), b"ok");
        assert!(lines.next_line().await.unwrap().is_none());
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn test_line_reader_non_utf8_line() {
        let input: &[u8] = b"\xff\xfe\n{}\n";
        let mut lines = LineReader::new(input);

        assert_eq!(lines.next_line().await.unwrap().unwrap(), b"\xff\xfe");
        assert_eq!(lines.next_line().await.unwrap().unwrap(), b"{}");
    }
}
