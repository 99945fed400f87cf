//! Shared server state and the per-client connection handle.
//!
//! All directory and store mutations go through one [`Mutex`]; each
//! connection task acquires it per operation and never holds it across an
//! await. That serialization is what makes the store's count invariants
//! hold without any locking inside the store itself.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::net::tcp::OwnedWriteHalf;

use parley_store::Store;

use crate::directory::Directory;

/// Shared write half of one client's server connection.
///
/// Cross-connection pushes (login broadcast, delivery notifications) lock
/// the handle for the whole multi-frame sequence so frames from different
/// tasks never interleave on the wire.
pub type ClientHandle = Arc<tokio::sync::Mutex<OwnedWriteHalf>>;

/// Everything the connection handlers share.
pub struct ServerState {
    pub store: Store,
    pub directory: Directory,
}

impl ServerState {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            directory: Directory::new(),
        }
    }
}

/// The state behind its lock, as handed to every connection task.
#[derive(Clone)]
pub struct SharedState(Arc<Mutex<ServerState>>);

impl SharedState {
    pub fn new(store: Store) -> Self {
        Self(Arc::new(Mutex::new(ServerState::new(store))))
    }

    /// Acquire the state lock. A poisoned lock is recovered: the stores
    /// replace files atomically, so no torn state can be observed.
    pub fn lock(&self) -> MutexGuard<'_, ServerState> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
