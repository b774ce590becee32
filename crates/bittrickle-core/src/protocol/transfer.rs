//! Framing for the peer-to-peer transfer channel.
//!
//! Wire format:
//! ```text
//! fetcher  → listener:  <filename> "\n"               (at most 1024 bytes)
//! listener → fetcher:   [content_len:8 BE][content:content_len]   then close
//!                       or: close immediately (file not served)
//! ```
//!
//! The two-message shape (filename, then raw stream) is kept; the length
//! header is what lets the fetcher tell a complete transfer from one that was
//! cut short.

use crate::protocol::codec::ProtocolError;
use crate::protocol::messages::{validate_filename, MAX_DATAGRAM_SIZE};

/// Size of the big-endian content-length header.
pub const TRANSFER_HEADER_LEN: usize = 8;

/// Longest filename request the listener reads before giving up.
pub const MAX_TRANSFER_REQUEST_LEN: usize = MAX_DATAGRAM_SIZE;

/// Terminates the filename request.
pub const REQUEST_TERMINATOR: u8 = b'\n';

/// Builds the filename request a fetcher sends after connecting.
///
/// # Errors
///
/// Returns [`ProtocolError::InvalidFilename`] if `filename` is not servable.
pub fn encode_transfer_request(filename: &str) -> Result<Vec<u8>, ProtocolError> {
    validate_filename(filename)?;
    let mut buf = Vec::with_capacity(filename.len() + 1);
    buf.extend_from_slice(filename.as_bytes());
    buf.push(REQUEST_TERMINATOR);
    Ok(buf)
}

/// Parses the filename out of a request buffer.
///
/// Accepts the request with or without its terminator (a fetcher may instead
/// half-close the stream) and tolerates a trailing `\r`.
///
/// # Errors
///
/// Returns [`ProtocolError::InvalidUtf8`] or [`ProtocolError::InvalidFilename`].
pub fn parse_transfer_request(bytes: &[u8]) -> Result<&str, ProtocolError> {
    let line = match bytes.iter().position(|&b| b == REQUEST_TERMINATOR) {
        Some(end) => &bytes[..end],
        None => bytes,
    };
    let name = std::str::from_utf8(line)
        .map_err(|_| ProtocolError::InvalidUtf8)?
        .trim_end_matches('\r');
    validate_filename(name)?;
    Ok(name)
}

pub fn encode_length_header(content_len: u64) -> [u8; TRANSFER_HEADER_LEN] {
    content_len.to_be_bytes()
}

pub fn decode_length_header(header: [u8; TRANSFER_HEADER_LEN]) -> u64 {
    u64::from_be_bytes(header)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_is_filename_plus_newline() {
        assert_eq!(encode_transfer_request("notes.txt").unwrap(), b"notes.txt\n");
    }

    #[test]
    fn test_parse_accepts_unterminated_request() {
        assert_eq!(parse_transfer_request(b"notes.txt").unwrap(), "notes.txt");
    }

    #[test]
    fn test_parse_strips_crlf() {
        assert_eq!(parse_transfer_request(b"notes.txt\r\n").unwrap(), "notes.txt");
    }

    #[test]
    fn test_parse_rejects_traversal() {
        assert!(parse_transfer_request(b"../../etc/passwd\n").is_err());
    }

    #[test]
    fn test_length_header_is_big_endian() {
        assert_eq!(encode_length_header(1), [0, 0, 0, 0, 0, 0, 0, 1]);
        assert_eq!(decode_length_header([0, 0, 0, 0, 0, 0, 1, 0]), 256);
    }
}
