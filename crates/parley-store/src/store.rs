//! The store handle and the on-disk layout.
//!
//! [`Store`] owns the data directory and hands out paths to the individual
//! files. The typed operations live in sibling modules as `impl Store`
//! blocks, one per concern (credentials, offline ledger, chat logs, ...).

use std::path::{Path, PathBuf};

use crate::Result;

/// Handle to one Parley data directory.
///
/// Server and clients of a loopback deployment share a single directory so
/// that chat logs written by either side are visible to both.
#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
}

impl Store {
    /// Open (or create) a data directory, including the `contacts/`,
    /// `chat/` and `shared/` subdirectories.
    ///
    /// Failing to create the layout is unrecoverable for the caller; both
    /// binaries exit on an error here.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();

        std::fs::create_dir_all(&root)?;
        std::fs::create_dir_all(root.join("contacts"))?;
        std::fs::create_dir_all(root.join("chat"))?;
        std::fs::create_dir_all(root.join("shared"))?;

        tracing::info!(path = %root.display(), "data directory ready");

        Ok(Self { root })
    }

    /// The root of the data directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub(crate) fn users_file(&self) -> PathBuf {
        self.root.join("users.txt")
    }

    pub(crate) fn activity_file(&self) -> PathBuf {
        self.root.join("activity.txt")
    }

    pub(crate) fn pending_file(&self) -> PathBuf {
        self.root.join("pending.txt")
    }

    pub(crate) fn notices_file(&self) -> PathBuf {
        self.root.join("notices.txt")
    }

    pub(crate) fn contacts_file(&self, owner: &str) -> PathBuf {
        self.root.join("contacts").join(format!("{owner}.txt"))
    }

    /// Path of the chat log between two users. Either name order may exist
    /// on disk (whichever side created it first); both are probed before a
    /// canonical sorted-order path is chosen for a new file.
    pub(crate) fn chat_log_file(&self, a: &str, b: &str) -> PathBuf {
        let chat = self.root.join("chat");

        let ab = chat.join(format!("{a}-{b}.txt"));
        if ab.exists() {
            return ab;
        }
        let ba = chat.join(format!("{b}-{a}.txt"));
        if ba.exists() {
            return ba;
        }

        if a <= b {
            ab
        } else {
            ba
        }
    }

    /// Per-user directory for shared-file downloads, created on demand.
    pub fn shared_dir(&self, username: &str) -> Result<PathBuf> {
        let dir = self.root.join("shared").join(username);
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Destination path for a file received over a share transfer.
    pub fn received_file(&self, username: &str, epoch: i64) -> Result<PathBuf> {
        Ok(self.shared_dir(username)?.join(format!("received_{epoch}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn open_creates_layout() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path().join("data")).unwrap();

        assert!(store.root().join("contacts").is_dir());
        assert!(store.root().join("chat").is_dir());
        assert!(store.root().join("shared").is_dir());
    }

    #[test]
    fn chat_log_path_probes_both_orders() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path()).unwrap();

        // No file yet: canonical sorted order.
        let fresh = store.chat_log_file("zoe", "amy");
        assert!(fresh.ends_with("amy-zoe.txt"));

        // An existing reverse-order file wins over the canonical name.
        std::fs::write(store.root().join("chat").join("zoe-amy.txt"), "").unwrap();
        let probed = store.chat_log_file("amy", "zoe");
        assert!(probed.ends_with("zoe-amy.txt"));
    }
}
