//! The delivery-notice ledger (`notices.txt`).
//!
//! When a recipient reads stored messages while the original sender is
//! offline, a `sender:recipient` pair is queued here; the next server
//! round trip by that sender drains the queue and turns each entry into a
//! delivery notification.

use crate::fsutil::{append_line, read_lines, rewrite_atomic};
use crate::{Result, Store};

impl Store {
    /// Queue a notice: `sender`'s stored messages were read by `recipient`.
    pub fn queue_notice(&self, sender: &str, recipient: &str) -> Result<()> {
        append_line(&self.notices_file(), &format!("{sender}:{recipient}"))?;
        tracing::debug!(sender = %sender, recipient = %recipient, "delivery notice queued");
        Ok(())
    }

    /// Remove and return every queued notice owed to `sender`: the list of
    /// recipients that read messages while `sender` was away.
    pub fn drain_notices_for(&self, sender: &str) -> Result<Vec<String>> {
        let lines = read_lines(&self.notices_file())?;
        if lines.is_empty() {
            return Ok(Vec::new());
        }

        let mut owed = Vec::new();
        let mut kept = Vec::with_capacity(lines.len());

        for line in lines {
            match line.split_once(':') {
                Some((s, recipient)) if s == sender => owed.push(recipient.to_string()),
                _ => kept.push(line),
            }
        }

        if !owed.is_empty() {
            rewrite_atomic(&self.notices_file(), &kept)?;
        }
        Ok(owed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (Store, TempDir) {
        let dir = TempDir::new().unwrap();
        (Store::open(dir.path()).unwrap(), dir)
    }

    #[test]
    fn drain_returns_only_the_senders_notices() {
        let (store, _dir) = store();

        store.queue_notice("alice", "bob").unwrap();
        store.queue_notice("carol", "dave").unwrap();
        store.queue_notice("alice", "eve").unwrap();

        assert_eq!(store.drain_notices_for("alice").unwrap(), vec!["bob", "eve"]);
        // Drained entries are gone; others remain.
        assert!(store.drain_notices_for("alice").unwrap().is_empty());
        assert_eq!(store.drain_notices_for("carol").unwrap(), vec!["dave"]);
    }

    #[test]
    fn empty_ledger_drains_empty() {
        let (store, _dir) = store();
        assert!(store.drain_notices_for("anyone").unwrap().is_empty());
    }
}
