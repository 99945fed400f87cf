use thiserror::Error;

/// Errors produced by the store layer.
///
/// A failed operation is abandoned at the point of occurrence; partial
/// state is never left behind because rewrites replace files atomically.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Generic I/O error (open, read, append, create-dir).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Atomic replacement of a rewritten file failed.
    #[error("could not replace {path}: {source}")]
    Replace {
        path: String,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
