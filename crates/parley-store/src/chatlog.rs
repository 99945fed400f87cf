//! Per-pair chat transcripts (`chat/<a>-<b>.txt`).
//!
//! Lines are appended by whichever side performs the delivery (the
//! receiving peer, or the server for offline messages) and rewritten from
//! unread to read by whichever side displays them. Only one writer is ever
//! active on a log: the per-message acknowledgment keeps a single request
//! in flight per chat pair.

use parley_shared::types::ChatLine;

use crate::fsutil::{append_line, read_lines, rewrite_atomic};
use crate::{Result, Store};

impl Store {
    /// Append a line to the log between `line.sender` and `counterpart`.
    pub fn append_chat_line(&self, counterpart: &str, line: &ChatLine) -> Result<()> {
        let path = self.chat_log_file(&line.sender, counterpart);
        append_line(&path, &line.render())
    }

    /// The full transcript between two users, rendered lines in file order.
    pub fn chat_history(&self, me: &str, other: &str) -> Result<Vec<String>> {
        read_lines(&self.chat_log_file(me, other))
    }

    /// Mark every unread line from `sender` in the pair's log as read and
    /// return the rewritten lines in file order. A line returned once is
    /// never returned again. Empty result when there is nothing unread (or
    /// no transcript at all).
    pub fn read_pending(&self, recipient: &str, sender: &str) -> Result<Vec<String>> {
        let path = self.chat_log_file(sender, recipient);
        let lines = read_lines(&path)?;
        if lines.is_empty() {
            return Ok(Vec::new());
        }

        let mut delivered = Vec::new();
        let mut rewritten = Vec::with_capacity(lines.len());

        for line in lines {
            match ChatLine::parse(&line) {
                Some(parsed) if !parsed.read && parsed.sender == sender => {
                    let read = parsed.into_read().render();
                    delivered.push(read.clone());
                    rewritten.push(read);
                }
                _ => rewritten.push(line),
            }
        }

        if !delivered.is_empty() {
            rewrite_atomic(&path, &rewritten)?;
        }
        Ok(delivered)
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
    fn append_and_history_share_one_file_either_direction() {
        let (store, _dir) = store();

        store
            .append_chat_line("bob", &ChatLine::unread("alice", "hi bob"))
            .unwrap();
        store
            .append_chat_line("alice", &ChatLine::unread("bob", "hi alice"))
            .unwrap();

        let history = store.chat_history("alice", "bob").unwrap();
        assert_eq!(history, vec!["alice: hi bob (*)", "bob: hi alice (*)"]);
        assert_eq!(store.chat_history("bob", "alice").unwrap(), history);
    }

    #[test]
    fn read_pending_marks_and_returns_once() {
        let (store, _dir) = store();

        store
            .append_chat_line("carol", &ChatLine::unread("alice", "hi"))
            .unwrap();
        store
            .append_chat_line("carol", &ChatLine::unread("alice", "again"))
            .unwrap();

        let first = store.read_pending("carol", "alice").unwrap();
        assert_eq!(first, vec!["alice: hi (**)", "alice: again (**)"]);

        // Once rewritten to read, the lines are excluded from future reads.
        assert!(store.read_pending("carol", "alice").unwrap().is_empty());

        let history = store.chat_history("carol", "alice").unwrap();
        assert!(history.iter().all(|l| l.ends_with("(**)")));
    }

    #[test]
    fn read_pending_only_touches_the_named_sender() {
        let (store, _dir) = store();

        store
            .append_chat_line("carol", &ChatLine::unread("alice", "from alice"))
            .unwrap();
        store
            .append_chat_line("alice", &ChatLine::unread("carol", "from carol"))
            .unwrap();

        let delivered = store.read_pending("carol", "alice").unwrap();
        assert_eq!(delivered, vec!["alice: from alice (**)"]);

        // Carol's own outgoing line stays unread in the shared file.
        let history = store.chat_history("carol", "alice").unwrap();
        assert!(history.contains(&"carol: from carol (*)".to_string()));
    }

    #[test]
    fn read_pending_without_transcript_is_empty() {
        let (store, _dir) = store();
        assert!(store.read_pending("carol", "ghost").unwrap().is_empty());
    }
}
