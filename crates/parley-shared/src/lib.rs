//! # parley-shared
//!
//! Wire framing, protocol vocabulary and data model shared by the Parley
//! rendezvous server and the Parley client.
//!
//! Every exchange in the system — client↔server commands as well as direct
//! peer↔peer chat traffic — rides the same three frame kinds defined in
//! [`wire`]: length-prefixed UTF-8 text, bare 16-bit integers, and
//! length-prefixed binary blobs.

pub mod constants;
pub mod protocol;
pub mod types;
pub mod wire;

mod error;

pub use error::WireError;
