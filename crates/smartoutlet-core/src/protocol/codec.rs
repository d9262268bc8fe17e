//! Line framing for protocol messages.

use std::io::{self, Read, Write};

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Largest accepted message, newline included.
pub const MAX_MESSAGE_BYTES: usize = 64 * 1024;

/// Framing and decoding failures.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The stream failed.
    #[error("connection error: {0}")]
    Io(#[from] io::Error),
    /// The peer closed the connection without sending a message.
    #[error("connection closed before a message arrived")]
    Closed,
    /// A message exceeded [`MAX_MESSAGE_BYTES`].
    #[error("message of {size} bytes exceeds the {limit} byte limit")]
    TooLarge {
        /// Bytes received so far.
        size: usize,
        /// Configured limit.
        limit: usize,
    },
    /// A line was not a valid message.
    #[error("malformed message: {0}")]
    Malformed(#[source] serde_json::Error),
    /// A message could not be encoded.
    #[error("failed to encode message: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Reads and decodes one newline-terminated message.
///
/// A final line without a trailing newline is accepted when the peer closes
/// the stream after writing it.
///
/// # Errors
///
/// Returns [`ProtocolError::Closed`] on an empty stream,
/// [`ProtocolError::TooLarge`] once the limit is passed, and
/// [`ProtocolError::Malformed`] when the line is not valid JSON for `T`.
pub fn read_message<T, R>(reader: &mut R) -> Result<T, ProtocolError>
where
    T: DeserializeOwned,
    R: Read,
{
    let line = read_line(reader)?.ok_or(ProtocolError::Closed)?;
    serde_json::from_slice(trim_line(&line)).map_err(ProtocolError::Malformed)
}

/// Encodes one message followed by a newline and flushes.
///
/// # Errors
///
/// Returns [`ProtocolError::Serialize`] when encoding fails and
/// [`ProtocolError::Io`] when the write fails.
pub fn write_message<T, W>(writer: &mut W, message: &T) -> Result<(), ProtocolError>
where
    T: Serialize,
    W: Write,
{
    let mut payload = serde_json::to_vec(message).map_err(ProtocolError::Serialize)?;
    payload.push(b'\n');
    writer.write_all(&payload)?;
    writer.flush()?;
    Ok(())
}

fn read_line<R: Read>(reader: &mut R) -> Result<Option<Vec<u8>>, ProtocolError> {
    let mut buffer = Vec::new();
    let mut chunk = [0_u8; 1024];
    loop {
        let bytes_read = read_chunk_with_retry(reader, &mut chunk)?;
        if bytes_read == 0 {
            return Ok((!buffer.is_empty()).then_some(buffer));
        }
        let received = chunk.get(..bytes_read).unwrap_or_default();
        if let Some(newline) = received.iter().position(|byte| *byte == b'\n') {
            let (line, _) = received.split_at(newline + 1);
            buffer.extend_from_slice(line);
            enforce_limit(buffer.len())?;
            return Ok(Some(buffer));
        }
        buffer.extend_from_slice(received);
        enforce_limit(buffer.len())?;
    }
}

fn read_chunk_with_retry<R: Read>(reader: &mut R, chunk: &mut [u8]) -> io::Result<usize> {
    loop {
        match reader.read(chunk) {
            Ok(read) => return Ok(read),
            Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
            Err(error) => return Err(error),
        }
    }
}

fn enforce_limit(size: usize) -> Result<(), ProtocolError> {
    if size > MAX_MESSAGE_BYTES {
        return Err(ProtocolError::TooLarge {
            size,
            limit: MAX_MESSAGE_BYTES,
        });
    }
    Ok(())
}

fn trim_line(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::protocol::{DaemonRequest, DaemonResponse};

    #[test]
    fn writes_a_single_terminated_line() {
        let mut sink = Vec::new();
        write_message(&mut sink, &DaemonResponse::Ack).expect("write succeeds");
        assert_eq!(sink, b"{\"kind\":\"ack\"}\n");
    }

    #[test]
    fn reads_only_the_first_line() {
        let mut source = Cursor::new(b"{\"op\":\"check_version\",\"version\":7}\ntrailing".to_vec());
        let request: DaemonRequest = read_message(&mut source).expect("read succeeds");
        assert_eq!(request, DaemonRequest::CheckVersion { version: 7 });
    }

    #[test]
    fn accepts_an_unterminated_final_line() {
        let mut source = Cursor::new(b"{\"kind\":\"ack\"}".to_vec());
        let response: DaemonResponse = read_message(&mut source).expect("read succeeds");
        assert_eq!(response, DaemonResponse::Ack);
    }

    #[test]
    fn empty_stream_is_reported_as_closed() {
        let mut source = Cursor::new(Vec::new());
        let result: Result<DaemonResponse, _> = read_message(&mut source);
        assert!(matches!(result, Err(ProtocolError::Closed)));
    }

    #[test]
    fn oversized_lines_are_rejected() {
        let mut source = Cursor::new(vec![b'a'; MAX_MESSAGE_BYTES + 10]);
        let result: Result<DaemonRequest, _> = read_message(&mut source);
        assert!(matches!(result, Err(ProtocolError::TooLarge { .. })));
    }

    #[test]
    fn malformed_lines_are_rejected() {
        let mut source = Cursor::new(b"{\"op\":\"reboot\"}\n".to_vec());
        let result: Result<DaemonRequest, _> = read_message(&mut source);
        assert!(matches!(result, Err(ProtocolError::Malformed(_))));
    }
}
