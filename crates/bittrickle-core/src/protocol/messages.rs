//! All BitTrickle rendezvous message types.
//!
//! The datagram channel is plain ASCII: one request per datagram, fields
//! separated by single spaces.  The keyword spellings below are part of the
//! compatibility surface with existing peers and servers, so they are defined
//! once here and never spelled out anywhere else.

use std::fmt;
use std::net::IpAddr;

use crate::protocol::codec::ProtocolError;

// ── Protocol constants ────────────────────────────────────────────────────────

/// Largest datagram either side sends or expects to receive.
pub const MAX_DATAGRAM_SIZE: usize = 1024;

/// Longest filename accepted on either channel.
pub const MAX_FILENAME_LEN: usize = 255;

/// Request keywords.
pub mod keyword {
    pub const AUTH: &str = "AUTH";
    pub const HEARTBEAT: &str = "HEARTBEAT";
    pub const LOGOUT: &str = "LOGOUT";
    pub const LIST_ACTIVE_PEERS: &str = "lap";
    pub const LIST_PUBLISHED: &str = "lpf";
    pub const PUBLISH: &str = "pub";
    pub const UNPUBLISH: &str = "unp";
    pub const SEARCH: &str = "sch";
    pub const GET: &str = "get";
}

/// Fixed response texts and prefixes.
pub mod reply {
    pub const AUTH_SUCCESS: &str = "AUTH_SUCCESS";
    pub const AUTH_FAILURE: &str = "AUTH_FAILURE";
    pub const USER_ALREADY_ACTIVE: &str = "USER_ALREADY_ACTIVE";
    pub const NO_ACTIVE_PEERS: &str = "No active peers";
    pub const ACTIVE_PEERS_PREFIX: &str = "Active peers: ";
    pub const NO_FILES_PUBLISHED: &str = "No files published";
    pub const PUBLISHED_FILES_PREFIX: &str = "Published files: ";
    pub const PUBLISHED_PREFIX: &str = "Published file: ";
    pub const ALREADY_PUBLISHED_PREFIX: &str = "Already published file: ";
    pub const UNPUBLISHED_PREFIX: &str = "Unpublished file: ";
    pub const NOT_PUBLISHED_PREFIX: &str = "User has not published file: ";
    pub const FILE_NOT_FOUND: &str = "File not found";
    pub const LIST_SEPARATOR: &str = ", ";
    pub const SEARCH_SEPARATOR: &str = " | ";
    pub const ERROR_PREFIX: &str = "ERROR ";
    pub const UNAUTHENTICATED: &str = "UNAUTHENTICATED";
    pub const MALFORMED: &str = "MALFORMED";
}

// ── Requests ──────────────────────────────────────────────────────────────────

/// A request sent from a client to the rendezvous server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Log in as `identity`, announcing the port the transfer listener is bound to.
    Auth {
        identity: String,
        secret: String,
        transfer_port: u16,
    },
    /// Liveness signal.  Never answered.
    Heartbeat,
    /// Explicit logout.  Never answered.
    Logout,
    /// `lap`: list other active peers.
    ListActivePeers,
    /// `lpf`: list the requester's own published files.
    ListPublished,
    /// `pub <file>`
    Publish(String),
    /// `unp <file>`
    Unpublish(String),
    /// `sch <substring>`
    Search(String),
    /// `get <file>`
    Get(String),
}

/// Discriminant of a [`Request`], used to interpret the matching response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Auth,
    Heartbeat,
    Logout,
    ListActivePeers,
    ListPublished,
    Publish,
    Unpublish,
    Search,
    Get,
}

impl Request {
    pub fn kind(&self) -> RequestKind {
        match self {
            Request::Auth { .. } => RequestKind::Auth,
            Request::Heartbeat => RequestKind::Heartbeat,
            Request::Logout => RequestKind::Logout,
            Request::ListActivePeers => RequestKind::ListActivePeers,
            Request::ListPublished => RequestKind::ListPublished,
            Request::Publish(_) => RequestKind::Publish,
            Request::Unpublish(_) => RequestKind::Unpublish,
            Request::Search(_) => RequestKind::Search,
            Request::Get(_) => RequestKind::Get,
        }
    }
}

impl RequestKind {
    /// `true` if the server answers this kind of request.
    pub fn expects_reply(self) -> bool {
        !matches!(self, RequestKind::Heartbeat | RequestKind::Logout)
    }

    /// The wire keyword for this request kind.
    pub fn keyword(self) -> &'static str {
        match self {
            RequestKind::Auth => keyword::AUTH,
            RequestKind::Heartbeat => keyword::HEARTBEAT,
            RequestKind::Logout => keyword::LOGOUT,
            RequestKind::ListActivePeers => keyword::LIST_ACTIVE_PEERS,
            RequestKind::ListPublished => keyword::LIST_PUBLISHED,
            RequestKind::Publish => keyword::PUBLISH,
            RequestKind::Unpublish => keyword::UNPUBLISH,
            RequestKind::Search => keyword::SEARCH,
            RequestKind::Get => keyword::GET,
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

// ── Responses ─────────────────────────────────────────────────────────────────

/// A response sent from the rendezvous server back to the requesting origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    AuthSuccess,
    AuthFailure,
    UserAlreadyActive,
    /// Other active identities, lexically sorted.  Empty means "no active peers".
    ActivePeers(Vec<String>),
    /// The requester's own catalog, lexically sorted.  Empty means "none".
    PublishedFiles(Vec<String>),
    Published(String),
    AlreadyPublished(String),
    Unpublished(String),
    NotPublished(String),
    /// Matching filenames, lexically sorted.  Empty means "no files found".
    SearchResults(Vec<String>),
    /// Where to fetch a file from.
    PeerEndpoint { ip: IpAddr, port: u16 },
    FileNotFound,
    /// A session-scoped command arrived from an origin with no session.
    Unauthenticated,
    /// The request could not be parsed.
    Malformed(String),
}

// ── Filename validation ───────────────────────────────────────────────────────

/// Checks that `name` is safe to announce, request, and serve.
///
/// A valid filename is a single non-empty token without whitespace or path
/// separators, so the transfer listener can join it onto its share directory
/// without ever escaping it.
///
/// # Errors
///
/// Returns [`ProtocolError::InvalidFilename`] describing the first rule broken.
///
/// # Examples
///
/// ```rust
/// use bittrickle_core::protocol::messages::validate_filename;
///
/// assert!(validate_filename("notes.txt").is_ok());
/// assert!(validate_filename("../etc/passwd").is_err());
/// ```
pub fn validate_filename(name: &str) -> Result<(), ProtocolError> {
    let reason = if name.is_empty() {
        Some("empty")
    } else if name.len() > MAX_FILENAME_LEN {
        Some("too long")
    } else if name == "." || name == ".." {
        Some("reserved name")
    } else if name.chars().any(char::is_whitespace) {
        Some("contains whitespace")
    } else if name.contains('/') || name.contains('\\') {
        Some("contains a path separator")
    } else if name.chars().any(char::is_control) {
        Some("contains a control character")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(ProtocolError::InvalidFilename {
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}
