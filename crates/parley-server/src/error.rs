use thiserror::Error;

use parley_shared::WireError;
use parley_store::StoreError;

/// Errors inside a connection handler.
///
/// `Wire` on the handler's own connection is fatal for that connection;
/// `Store` aborts the current command only — the session continues.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error(transparent)]
    Wire(#[from] WireError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
