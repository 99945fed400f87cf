use thiserror::Error;

use parley_shared::WireError;
use parley_store::StoreError;

use crate::session::SessionError;

/// Errors inside the client engine.
///
/// Wire errors on the server connection flow up to the disconnect logic;
/// store and session errors abort the current operation only.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Wire(#[from] WireError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Session(#[from] SessionError),
}
