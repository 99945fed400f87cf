//! # parley-server
//!
//! The Parley rendezvous server: authenticates users, tracks who is online
//! and on which listen port, stores messages for offline recipients and
//! queues delivery notifications. Conversations themselves flow directly
//! between clients; the server is only the meeting point.
//!
//! Exposed as a library so the integration tests can drive a real server
//! over loopback TCP; the binary in `main.rs` is a thin wrapper.

pub mod config;
pub mod directory;
pub mod handler;
pub mod state;

mod error;

pub use error::ServerError;
