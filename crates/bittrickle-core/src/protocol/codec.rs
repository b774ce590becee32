//! Text codec for BitTrickle rendezvous datagrams.
//!
//! Wire format:
//! ```text
//! request  := KEYWORD [SP field]*           e.g. "AUTH alice pw1 50123", "sch rep"
//! response := free text, interpreted per request kind
//! ```
//! Everything is ASCII and fits in one datagram of at most
//! [`MAX_DATAGRAM_SIZE`] bytes.  There is no trailing delimiter.
//!
//! Responses carry no type tag: `"a | b"` is only a search result because it
//! answers an `sch` request.  [`decode_response`] therefore takes the
//! [`RequestKind`] of the request that was sent.

use std::net::IpAddr;

use thiserror::Error;
use tracing::warn;

use crate::protocol::messages::{
    keyword, reply, validate_filename, Request, RequestKind, Response, MAX_DATAGRAM_SIZE,
};

/// Errors that can occur while encoding or decoding a datagram.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The datagram was empty or contained only whitespace.
    #[error("empty request")]
    Empty,

    /// The datagram bytes are not valid UTF-8.
    #[error("request is not valid UTF-8")]
    InvalidUtf8,

    /// The first token is not a known keyword.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// The keyword was followed by the wrong number of fields.
    #[error("{command} expects {expected} argument(s), got {found}")]
    WrongArity {
        command: &'static str,
        expected: usize,
        found: usize,
    },

    /// The transfer port field is not a valid `u16`.
    #[error("invalid transfer port: {0}")]
    InvalidPort(String),

    /// A filename broke one of the naming rules.
    #[error("invalid filename '{name}': {reason}")]
    InvalidFilename { name: String, reason: &'static str },

    /// A non-filename field (identity, secret, search term) cannot be sent.
    #[error("invalid field: {0}")]
    InvalidField(String),

    /// The encoded message would not fit in one datagram.
    #[error("message of {size} bytes exceeds the {max}-byte datagram limit")]
    TooLarge { size: usize, max: usize },

    /// A response did not match anything the request kind can produce.
    #[error("unexpected response to {kind}: {text:?}")]
    UnexpectedResponse { kind: RequestKind, text: String },
}

// ── Requests ──────────────────────────────────────────────────────────────────

/// Encodes a [`Request`] into datagram bytes.
///
/// # Errors
///
/// Returns [`ProtocolError`] if a field contains whitespace, a filename is
/// invalid, or the message would exceed [`MAX_DATAGRAM_SIZE`].
///
/// # Examples
///
/// ```rust
/// use bittrickle_core::{encode_request, Request};
///
/// let bytes = encode_request(&Request::Publish("notes.txt".into())).unwrap();
/// assert_eq!(bytes, b"pub notes.txt");
/// ```
pub fn encode_request(request: &Request) -> Result<Vec<u8>, ProtocolError> {
    let text = match request {
        Request::Auth {
            identity,
            secret,
            transfer_port,
        } => {
            check_token("identity", identity)?;
            check_token("secret", secret)?;
            format!("{} {identity} {secret} {transfer_port}", keyword::AUTH)
        }
        Request::Heartbeat => keyword::HEARTBEAT.to_string(),
        Request::Logout => keyword::LOGOUT.to_string(),
        Request::ListActivePeers => keyword::LIST_ACTIVE_PEERS.to_string(),
        Request::ListPublished => keyword::LIST_PUBLISHED.to_string(),
        Request::Publish(name) => {
            validate_filename(name)?;
            format!("{} {name}", keyword::PUBLISH)
        }
        Request::Unpublish(name) => {
            validate_filename(name)?;
            format!("{} {name}", keyword::UNPUBLISH)
        }
        Request::Search(term) => {
            check_token("search term", term)?;
            format!("{} {term}", keyword::SEARCH)
        }
        Request::Get(name) => {
            validate_filename(name)?;
            format!("{} {name}", keyword::GET)
        }
    };

    if text.len() > MAX_DATAGRAM_SIZE {
        return Err(ProtocolError::TooLarge {
            size: text.len(),
            max: MAX_DATAGRAM_SIZE,
        });
    }
    Ok(text.into_bytes())
}

/// Decodes one request datagram.
///
/// Fields are split on runs of whitespace, so a trailing newline from a
/// hand-typed `nc -u` session is tolerated.
///
/// # Errors
///
/// Returns [`ProtocolError`] for empty, non-UTF-8, oversized, unknown, or
/// wrongly shaped requests.
pub fn decode_request(bytes: &[u8]) -> Result<Request, ProtocolError> {
    if bytes.len() > MAX_DATAGRAM_SIZE {
        return Err(ProtocolError::TooLarge {
            size: bytes.len(),
            max: MAX_DATAGRAM_SIZE,
        });
    }
    let text = std::str::from_utf8(bytes).map_err(|_| ProtocolError::InvalidUtf8)?;
    let fields: Vec<&str> = text.split_whitespace().collect();
    let (&command, args) = fields.split_first().ok_or(ProtocolError::Empty)?;

    match command {
        keyword::AUTH => {
            let [identity, secret, port] = expect_args::<3>(keyword::AUTH, args)?;
            let transfer_port = port
                .parse::<u16>()
                .map_err(|_| ProtocolError::InvalidPort(port.to_string()))?;
            Ok(Request::Auth {
                identity: identity.to_string(),
                secret: secret.to_string(),
                transfer_port,
            })
        }
        keyword::HEARTBEAT => {
            expect_args::<0>(keyword::HEARTBEAT, args)?;
            Ok(Request::Heartbeat)
        }
        keyword::LOGOUT => {
            expect_args::<0>(keyword::LOGOUT, args)?;
            Ok(Request::Logout)
        }
        keyword::LIST_ACTIVE_PEERS => {
            expect_args::<0>(keyword::LIST_ACTIVE_PEERS, args)?;
            Ok(Request::ListActivePeers)
        }
        keyword::LIST_PUBLISHED => {
            expect_args::<0>(keyword::LIST_PUBLISHED, args)?;
            Ok(Request::ListPublished)
        }
        keyword::PUBLISH => {
            let [name] = expect_args::<1>(keyword::PUBLISH, args)?;
            validate_filename(name)?;
            Ok(Request::Publish(name.to_string()))
        }
        keyword::UNPUBLISH => {
            let [name] = expect_args::<1>(keyword::UNPUBLISH, args)?;
            validate_filename(name)?;
            Ok(Request::Unpublish(name.to_string()))
        }
        keyword::SEARCH => {
            let [term] = expect_args::<1>(keyword::SEARCH, args)?;
            Ok(Request::Search(term.to_string()))
        }
        keyword::GET => {
            let [name] = expect_args::<1>(keyword::GET, args)?;
            validate_filename(name)?;
            Ok(Request::Get(name.to_string()))
        }
        other => Err(ProtocolError::UnknownCommand(other.to_string())),
    }
}

// ── Responses ─────────────────────────────────────────────────────────────────

/// Encodes a [`Response`] into datagram bytes.
///
/// List responses that would overflow one datagram are cut at the last entry
/// that still fits; a warning is logged when that happens.
pub fn encode_response(response: &Response) -> Vec<u8> {
    let text = match response {
        Response::AuthSuccess => reply::AUTH_SUCCESS.to_string(),
        Response::AuthFailure => reply::AUTH_FAILURE.to_string(),
        Response::UserAlreadyActive => reply::USER_ALREADY_ACTIVE.to_string(),
        Response::ActivePeers(peers) if peers.is_empty() => reply::NO_ACTIVE_PEERS.to_string(),
        Response::ActivePeers(peers) => {
            join_within_limit(reply::ACTIVE_PEERS_PREFIX, peers, reply::LIST_SEPARATOR)
        }
        Response::PublishedFiles(files) if files.is_empty() => {
            reply::NO_FILES_PUBLISHED.to_string()
        }
        Response::PublishedFiles(files) => {
            join_within_limit(reply::PUBLISHED_FILES_PREFIX, files, reply::LIST_SEPARATOR)
        }
        Response::Published(name) => format!("{}{name}", reply::PUBLISHED_PREFIX),
        Response::AlreadyPublished(name) => format!("{}{name}", reply::ALREADY_PUBLISHED_PREFIX),
        Response::Unpublished(name) => format!("{}{name}", reply::UNPUBLISHED_PREFIX),
        Response::NotPublished(name) => format!("{}{name}", reply::NOT_PUBLISHED_PREFIX),
        Response::SearchResults(files) => join_within_limit("", files, reply::SEARCH_SEPARATOR),
        Response::PeerEndpoint { ip, port } => format!("{ip} {port}"),
        Response::FileNotFound => reply::FILE_NOT_FOUND.to_string(),
        Response::Unauthenticated => format!("{}{}", reply::ERROR_PREFIX, reply::UNAUTHENTICATED),
        Response::Malformed(detail) => {
            let mut text = format!("{}{} {detail}", reply::ERROR_PREFIX, reply::MALFORMED);
            truncate_at_char_boundary(&mut text, MAX_DATAGRAM_SIZE);
            text
        }
    };
    text.into_bytes()
}

/// Decodes a response datagram sent in answer to a request of kind `kind`.
///
/// # Errors
///
/// Returns [`ProtocolError::UnexpectedResponse`] if the text does not match
/// any response `kind` can produce, and [`ProtocolError::InvalidUtf8`] for
/// non-UTF-8 bytes.
pub fn decode_response(kind: RequestKind, bytes: &[u8]) -> Result<Response, ProtocolError> {
    let text = std::str::from_utf8(bytes).map_err(|_| ProtocolError::InvalidUtf8)?;
    let unexpected = || ProtocolError::UnexpectedResponse {
        kind,
        text: text.to_string(),
    };

    // Only the two exact error forms are errors.  `ERROR` is itself a legal
    // filename, so a search reply may begin with "ERROR | ".
    if let Some(error) = decode_error(text) {
        return Ok(error);
    }

    match kind {
        RequestKind::Auth => match text {
            reply::AUTH_SUCCESS => Ok(Response::AuthSuccess),
            reply::AUTH_FAILURE => Ok(Response::AuthFailure),
            reply::USER_ALREADY_ACTIVE => Ok(Response::UserAlreadyActive),
            _ => Err(unexpected()),
        },
        RequestKind::Heartbeat | RequestKind::Logout => Err(unexpected()),
        RequestKind::ListActivePeers => {
            if text == reply::NO_ACTIVE_PEERS {
                Ok(Response::ActivePeers(Vec::new()))
            } else {
                text.strip_prefix(reply::ACTIVE_PEERS_PREFIX)
                    .map(|list| Response::ActivePeers(split_list(list, reply::LIST_SEPARATOR)))
                    .ok_or_else(unexpected)
            }
        }
        RequestKind::ListPublished => {
            if text == reply::NO_FILES_PUBLISHED {
                Ok(Response::PublishedFiles(Vec::new()))
            } else {
                text.strip_prefix(reply::PUBLISHED_FILES_PREFIX)
                    .map(|list| Response::PublishedFiles(split_list(list, reply::LIST_SEPARATOR)))
                    .ok_or_else(unexpected)
            }
        }
        RequestKind::Publish => {
            if let Some(name) = text.strip_prefix(reply::ALREADY_PUBLISHED_PREFIX) {
                Ok(Response::AlreadyPublished(name.to_string()))
            } else if let Some(name) = text.strip_prefix(reply::PUBLISHED_PREFIX) {
                Ok(Response::Published(name.to_string()))
            } else {
                Err(unexpected())
            }
        }
        RequestKind::Unpublish => {
            if let Some(name) = text.strip_prefix(reply::UNPUBLISHED_PREFIX) {
                Ok(Response::Unpublished(name.to_string()))
            } else if let Some(name) = text.strip_prefix(reply::NOT_PUBLISHED_PREFIX) {
                Ok(Response::NotPublished(name.to_string()))
            } else {
                Err(unexpected())
            }
        }
        RequestKind::Search => Ok(Response::SearchResults(split_list(
            text,
            reply::SEARCH_SEPARATOR,
        ))),
        RequestKind::Get => {
            if text == reply::FILE_NOT_FOUND {
                return Ok(Response::FileNotFound);
            }
            let mut fields = text.split_whitespace();
            match (fields.next(), fields.next(), fields.next()) {
                (Some(ip), Some(port), None) => {
                    let ip: IpAddr = ip.parse().map_err(|_| unexpected())?;
                    let port: u16 = port.parse().map_err(|_| unexpected())?;
                    Ok(Response::PeerEndpoint { ip, port })
                }
                _ => Err(unexpected()),
            }
        }
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Recognises `ERROR UNAUTHENTICATED` and `ERROR MALFORMED[ <detail>]`.
fn decode_error(text: &str) -> Option<Response> {
    let rest = text.strip_prefix(reply::ERROR_PREFIX)?;
    if rest == reply::UNAUTHENTICATED {
        return Some(Response::Unauthenticated);
    }
    let detail = rest.strip_prefix(reply::MALFORMED)?;
    if detail.is_empty() {
        return Some(Response::Malformed(String::new()));
    }
    detail
        .strip_prefix(' ')
        .map(|detail| Response::Malformed(detail.to_string()))
}

fn expect_args<'a, const N: usize>(
    command: &'static str,
    args: &[&'a str],
) -> Result<[&'a str; N], ProtocolError> {
    <[&str; N]>::try_from(args).map_err(|_| ProtocolError::WrongArity {
        command,
        expected: N,
        found: args.len(),
    })
}

fn check_token(field: &str, value: &str) -> Result<(), ProtocolError> {
    if value.is_empty() || value.chars().any(char::is_whitespace) {
        return Err(ProtocolError::InvalidField(format!(
            "{field} must be a single non-empty word"
        )));
    }
    Ok(())
}

fn split_list(list: &str, separator: &str) -> Vec<String> {
    if list.trim().is_empty() {
        return Vec::new();
    }
    list.split(separator)
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn join_within_limit(prefix: &str, items: &[String], separator: &str) -> String {
    let mut text = prefix.to_string();
    for (i, item) in items.iter().enumerate() {
        let extra = if i == 0 { 0 } else { separator.len() } + item.len();
        if text.len() + extra > MAX_DATAGRAM_SIZE {
            warn!(
                "response list truncated to {i} of {} entries to fit one datagram",
                items.len()
            );
            break;
        }
        if i > 0 {
            text.push_str(separator);
        }
        text.push_str(item);
    }
    text
}

fn truncate_at_char_boundary(text: &mut String, max: usize) {
    if text.len() <= max {
        return;
    }
    let mut cut = max;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── Request decoding ──────────────────────────────────────────────────────

    #[test]
    fn test_decode_auth_request_parses_all_fields() {
        // Arrange
        let bytes = b"AUTH alice pw1 50123";

        // Act
        let request = decode_request(bytes).unwrap();

        // Assert
        assert_eq!(
            request,
            Request::Auth {
                identity: "alice".into(),
                secret: "pw1".into(),
                transfer_port: 50123,
            }
        );
    }

    #[test]
    fn test_decode_auth_request_rejects_non_numeric_port() {
        let result = decode_request(b"AUTH alice pw1 port");
        assert_eq!(result, Err(ProtocolError::InvalidPort("port".into())));
    }

    #[test]
    fn test_decode_auth_request_rejects_missing_fields() {
        let result = decode_request(b"AUTH alice");
        assert!(matches!(
            result,
            Err(ProtocolError::WrongArity { command: "AUTH", expected: 3, found: 1 })
        ));
    }

    #[test]
    fn test_decode_tolerates_trailing_newline() {
        assert_eq!(decode_request(b"lap\n").unwrap(), Request::ListActivePeers);
        assert_eq!(
            decode_request(b"sch rep\r\n").unwrap(),
            Request::Search("rep".into())
        );
    }

    #[test]
    fn test_decode_rejects_unknown_and_empty_requests() {
        assert_eq!(decode_request(b"   "), Err(ProtocolError::Empty));
        assert_eq!(
            decode_request(b"publish x"),
            Err(ProtocolError::UnknownCommand("publish".into()))
        );
        // Keywords are case-sensitive.
        assert_eq!(
            decode_request(b"LAP"),
            Err(ProtocolError::UnknownCommand("LAP".into()))
        );
    }

    #[test]
    fn test_decode_rejects_invalid_utf8() {
        assert_eq!(decode_request(&[0x70, 0xFF, 0xFE]), Err(ProtocolError::InvalidUtf8));
    }

    #[test]
    fn test_decode_get_rejects_path_traversal() {
        let result = decode_request(b"get ../secret");
        assert!(matches!(result, Err(ProtocolError::InvalidFilename { .. })));
    }

    #[test]
    fn test_decode_pub_rejects_extra_arguments() {
        let result = decode_request(b"pub a b");
        assert!(matches!(result, Err(ProtocolError::WrongArity { found: 2, .. })));
    }

    // ── Request encoding ──────────────────────────────────────────────────────

    #[test]
    fn test_encode_auth_rejects_secret_with_space() {
        let request = Request::Auth {
            identity: "alice".into(),
            secret: "two words".into(),
            transfer_port: 1,
        };
        assert!(matches!(encode_request(&request), Err(ProtocolError::InvalidField(_))));
    }

    #[test]
    fn test_encode_search_rejects_empty_term() {
        assert!(encode_request(&Request::Search(String::new())).is_err());
    }

    // ── Response encoding ─────────────────────────────────────────────────────

    #[test]
    fn test_encode_empty_lists_use_fixed_texts() {
        assert_eq!(encode_response(&Response::ActivePeers(vec![])), b"No active peers");
        assert_eq!(encode_response(&Response::PublishedFiles(vec![])), b"No files published");
        assert_eq!(encode_response(&Response::SearchResults(vec![])), b"");
    }

    #[test]
    fn test_encode_search_results_truncates_to_one_datagram() {
        // Arrange: 100 names of 20 bytes each cannot fit in 1024 bytes.
        let names: Vec<String> = (0..100).map(|i| format!("file-{i:015}")).collect();

        // Act
        let bytes = encode_response(&Response::SearchResults(names));

        // Assert
        assert!(bytes.len() <= MAX_DATAGRAM_SIZE);
        let decoded = decode_response(RequestKind::Search, &bytes).unwrap();
        match decoded {
            Response::SearchResults(list) => {
                assert!(!list.is_empty());
                assert!(list.len() < 100);
                assert_eq!(list[0], "file-000000000000000");
            }
            other => panic!("unexpected response {other:?}"),
        }
    }

    #[test]
    fn test_encode_malformed_detail_is_capped() {
        let bytes = encode_response(&Response::Malformed("x".repeat(5000)));
        assert_eq!(bytes.len(), MAX_DATAGRAM_SIZE);
    }

    // ── Response decoding ─────────────────────────────────────────────────────

    #[test]
    fn test_decode_error_responses_for_any_kind() {
        assert_eq!(
            decode_response(RequestKind::Search, b"ERROR UNAUTHENTICATED"),
            Ok(Response::Unauthenticated)
        );
        assert_eq!(
            decode_response(RequestKind::Get, b"ERROR MALFORMED unknown command: x"),
            Ok(Response::Malformed("unknown command: x".into()))
        );
    }

    #[test]
    fn test_search_hit_named_error_is_not_an_error_reply() {
        // Arrange: "ERROR" is a legal filename and sorts first
        let files = vec!["ERROR".to_string(), "ERRORS.txt".to_string()];
        let bytes = encode_response(&Response::SearchResults(files.clone()));
        assert_eq!(bytes, b"ERROR | ERRORS.txt");

        // Act
        let decoded = decode_response(RequestKind::Search, &bytes);

        // Assert
        assert_eq!(decoded, Ok(Response::SearchResults(files)));
    }

    #[test]
    fn test_single_search_hit_named_error() {
        assert_eq!(
            decode_response(RequestKind::Search, b"ERROR"),
            Ok(Response::SearchResults(vec!["ERROR".into()]))
        );
    }

    #[test]
    fn test_decode_get_endpoint() {
        let response = decode_response(RequestKind::Get, b"127.0.0.1 50500").unwrap();
        assert_eq!(
            response,
            Response::PeerEndpoint {
                ip: "127.0.0.1".parse().unwrap(),
                port: 50500
            }
        );
    }

    #[test]
    fn test_decode_get_rejects_garbage() {
        assert!(decode_response(RequestKind::Get, b"somewhere over there").is_err());
        assert!(decode_response(RequestKind::Get, b"127.0.0.1 notaport").is_err());
    }

    #[test]
    fn test_decode_publish_distinguishes_already_published() {
        assert_eq!(
            decode_response(RequestKind::Publish, b"Already published file: a.txt"),
            Ok(Response::AlreadyPublished("a.txt".into()))
        );
        assert_eq!(
            decode_response(RequestKind::Publish, b"Published file: a.txt"),
            Ok(Response::Published("a.txt".into()))
        );
    }

    #[test]
    fn test_decode_heartbeat_response_is_unexpected() {
        assert!(decode_response(RequestKind::Heartbeat, b"anything").is_err());
    }

    #[test]
    fn test_decode_active_peers_list() {
        assert_eq!(
            decode_response(RequestKind::ListActivePeers, b"Active peers: bob, carol"),
            Ok(Response::ActivePeers(vec!["bob".into(), "carol".into()]))
        );
    }
}
