//! The offline-message ledger (`pending.txt`).
//!
//! Per recipient, the ledger keeps one `(sender, count, last_ts)` triple
//! for every sender with undelivered messages. On disk each recipient owns
//! a two-line block:
//!
//! ```text
//! alice
//! list:bob:2:1722951112:carol:1:1722950000:
//! ```
//!
//! Recording a message creates-or-increments a triple; draining (the
//! `hanging` command) returns the triples and resets the block to empty —
//! the container persists, only its content is consumed.

use chrono::Utc;

use parley_shared::types::{ChatLine, PendingSummary};

use crate::fsutil::{read_lines, rewrite_atomic};
use crate::{Result, Store};

struct Block {
    recipient: String,
    entries: Vec<PendingSummary>,
}

fn parse_blocks(lines: &[String]) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut lines = lines.iter();

    while let (Some(recipient), Some(list)) = (lines.next(), lines.next()) {
        let mut entries = Vec::new();
        let fields: Vec<&str> = list
            .strip_prefix("list:")
            .unwrap_or("")
            .split(':')
            .collect();

        for triple in fields.chunks(3) {
            let [sender, count, ts] = triple else {
                continue;
            };
            if sender.is_empty() {
                continue;
            }
            entries.push(PendingSummary {
                sender: sender.to_string(),
                count: count.parse().unwrap_or(0),
                last_ts: ts.parse().unwrap_or(0),
            });
        }

        blocks.push(Block {
            recipient: recipient.clone(),
            entries,
        });
    }

    blocks
}

fn render_blocks(blocks: &[Block]) -> Vec<String> {
    let mut lines = Vec::with_capacity(blocks.len() * 2);
    for block in blocks {
        lines.push(block.recipient.clone());
        let mut list = String::from("list:");
        for e in &block.entries {
            list.push_str(&format!("{}:{}:{}:", e.sender, e.count, e.last_ts));
        }
        lines.push(list);
    }
    lines
}

impl Store {
    fn load_blocks(&self) -> Result<Vec<Block>> {
        Ok(parse_blocks(&read_lines(&self.pending_file())?))
    }

    fn save_blocks(&self, blocks: &[Block]) -> Result<()> {
        rewrite_atomic(&self.pending_file(), &render_blocks(blocks))
    }

    /// Create an (empty) ledger block for a freshly registered user.
    pub(crate) fn ensure_pending_block(&self, username: &str) -> Result<()> {
        let mut blocks = self.load_blocks()?;
        if blocks.iter().any(|b| b.recipient == username) {
            return Ok(());
        }
        blocks.push(Block {
            recipient: username.to_string(),
            entries: Vec::new(),
        });
        self.save_blocks(&blocks)
    }

    /// Store a message for an offline recipient: append it unread to the
    /// pair's chat log and bump the `(recipient, sender)` ledger entry.
    pub fn record_offline(&self, sender: &str, recipient: &str, body: &str) -> Result<()> {
        self.append_chat_line(recipient, &ChatLine::unread(sender, body))?;

        let now = Utc::now().timestamp();
        let mut blocks = self.load_blocks()?;

        let idx = match blocks.iter().position(|b| b.recipient == recipient) {
            Some(idx) => idx,
            None => {
                blocks.push(Block {
                    recipient: recipient.to_string(),
                    entries: Vec::new(),
                });
                blocks.len() - 1
            }
        };
        let block = &mut blocks[idx];

        match block.entries.iter_mut().find(|e| e.sender == sender) {
            Some(entry) => {
                entry.count += 1;
                entry.last_ts = now;
            }
            None => block.entries.push(PendingSummary {
                sender: sender.to_string(),
                count: 1,
                last_ts: now,
            }),
        }

        self.save_blocks(&blocks)?;
        tracing::debug!(from = %sender, to = %recipient, "offline message recorded");
        Ok(())
    }

    /// Return every pending summary for `recipient` and reset the counts.
    /// A second drain yields nothing until new messages arrive.
    pub fn drain_pending(&self, recipient: &str) -> Result<Vec<PendingSummary>> {
        let mut blocks = self.load_blocks()?;

        let Some(block) = blocks.iter_mut().find(|b| b.recipient == recipient) else {
            return Ok(Vec::new());
        };

        let drained = std::mem::take(&mut block.entries);
        if !drained.is_empty() {
            self.save_blocks(&blocks)?;
        }
        Ok(drained)
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
    fn drain_counts_one_tuple_per_sender() {
        let (store, _dir) = store();

        store.record_offline("alice", "carol", "one").unwrap();
        store.record_offline("alice", "carol", "two").unwrap();
        store.record_offline("bob", "carol", "hi").unwrap();

        let mut drained = store.drain_pending("carol").unwrap();
        drained.sort_by(|a, b| a.sender.cmp(&b.sender));

        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].sender, "alice");
        assert_eq!(drained[0].count, 2);
        assert_eq!(drained[1].sender, "bob");
        assert_eq!(drained[1].count, 1);
        assert!(drained[0].last_ts > 0);
    }

    #[test]
    fn immediate_second_drain_yields_nothing() {
        let (store, _dir) = store();

        store.record_offline("alice", "carol", "hello").unwrap();
        assert_eq!(store.drain_pending("carol").unwrap().len(), 1);
        assert!(store.drain_pending("carol").unwrap().is_empty());

        // New messages accumulate again after a drain.
        store.record_offline("alice", "carol", "more").unwrap();
        let again = store.drain_pending("carol").unwrap();
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].count, 1);
    }

    #[test]
    fn recipients_are_isolated() {
        let (store, _dir) = store();

        store.record_offline("alice", "bob", "for bob").unwrap();
        store.record_offline("alice", "carol", "for carol").unwrap();

        assert_eq!(store.drain_pending("bob").unwrap().len(), 1);
        assert_eq!(store.drain_pending("carol").unwrap().len(), 1);
        assert!(store.drain_pending("dave").unwrap().is_empty());
    }

    #[test]
    fn registration_creates_an_empty_block() {
        let (store, _dir) = store();
        store.register("newbie", "pw").unwrap();

        // The container exists but drains empty.
        assert!(store.drain_pending("newbie").unwrap().is_empty());

        let content = std::fs::read_to_string(store.root().join("pending.txt")).unwrap();
        assert!(content.contains("newbie"));
    }

    #[test]
    fn record_offline_appends_unread_chat_line() {
        let (store, _dir) = store();
        store.record_offline("alice", "carol", "hi there").unwrap();

        let history = store.chat_history("carol", "alice").unwrap();
        assert_eq!(history, vec!["alice: hi there (*)"]);
    }
}
