//! # bittrickle-core
//!
//! Shared library for BitTrickle containing the rendezvous wire codec, the
//! transfer framing, and the server-side domain model (session registry and
//! file catalog).
//!
//! This crate is used by both the server and client applications.
//! It has no dependencies on sockets, the file system, or the console.
//!
//! # Architecture overview (for beginners)
//!
//! BitTrickle is a peer-to-peer file-sharing utility.  A central *rendezvous
//! server* knows who is logged in and which files each user has announced,
//! but it never touches file contents.  When a user wants a file, the server
//! hands out the owner's address and the two peers talk directly.
//!
//! This crate (`bittrickle-core`) is the shared foundation.  It defines:
//!
//! - **`protocol`** – How requests and responses look on the wire.  The
//!   datagram channel carries short space-delimited ASCII messages; the
//!   transfer channel carries a filename request followed by a length-prefixed
//!   byte stream.
//!
//! - **`domain`** – Pure business logic with no I/O.  The `SessionRegistry`
//!   tracks who is online; the `FileCatalog` tracks who announced what and
//!   answers searches.
//!
//! - **`shutdown`** – A cancellation signal that background tasks can both
//!   poll and await.

pub mod domain;
pub mod protocol;
pub mod shutdown;

// Re-export the most-used types at the crate root so callers can write
// `bittrickle_core::SessionRegistry` instead of the full module path.
pub use domain::catalog::{FileCatalog, PublishOutcome, UnpublishOutcome};
pub use domain::credentials::CredentialStore;
pub use domain::session::{AuthError, Session, SessionRegistry};
pub use protocol::codec::{
    decode_request, decode_response, encode_request, encode_response, ProtocolError,
};
pub use protocol::messages::{Request, RequestKind, Response};
pub use shutdown::Shutdown;
