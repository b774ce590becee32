//! Infrastructure layer: sockets, files, and configuration.

pub mod network;
pub mod storage;
pub mod transfer;
