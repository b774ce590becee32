//! Datagram channel to the rendezvous server.

pub mod rendezvous;
