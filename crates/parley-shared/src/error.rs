use thiserror::Error;

/// Errors produced by the framing layer.
///
/// `Closed` is the clean end of a connection (zero-length read) and is part
/// of normal operation: the peer logged out or the server went away. `Io`
/// means the transport failed mid-frame; callers must treat the connection
/// as dead.
#[derive(Error, Debug)]
pub enum WireError {
    /// The peer closed the connection cleanly.
    #[error("connection closed by peer")]
    Closed,

    /// Send or receive failed on a live socket.
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),

    /// Attempt to send a payload above [`crate::constants::MAX_PAYLOAD`].
    #[error("payload too large: {0} bytes")]
    TooLarge(usize),

    /// A text frame did not contain valid UTF-8.
    #[error("text frame is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl WireError {
    /// Whether the error is the clean-disconnect case.
    pub fn is_closed(&self) -> bool {
        matches!(self, WireError::Closed)
    }
}
