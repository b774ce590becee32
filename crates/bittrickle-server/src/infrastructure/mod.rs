//! Infrastructure layer: sockets and files.

pub mod network;
pub mod storage;
