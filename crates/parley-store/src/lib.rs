//! # parley-store
//!
//! File-backed persistence for the Parley chat platform: credentials,
//! the offline-message ledger, per-pair chat logs, the delivery-notice
//! ledger, the activity log and per-user contact lists.
//!
//! Everything is line-oriented text under one data directory — the formats
//! are the durable contract, not an implementation detail. Every rewrite
//! goes through write-to-temp-then-rename so a crash never leaves a file
//! half-written. The API is synchronous; callers serialize access (the
//! server funnels all mutations through one lock).

pub mod activity;
pub mod chatlog;
pub mod contacts;
pub mod credentials;
pub mod fsutil;
pub mod notices;
pub mod offline;
pub mod store;

mod error;

pub use activity::Activity;
pub use credentials::{AuthOutcome, SignupOutcome};
pub use error::{Result, StoreError};
pub use store::Store;
