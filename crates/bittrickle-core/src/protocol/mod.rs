//! Protocol module containing message types, the datagram codec, and the
//! transfer-channel framing.

pub mod codec;
pub mod messages;
pub mod transfer;

pub use codec::{decode_request, decode_response, encode_request, encode_response, ProtocolError};
pub use messages::*;
