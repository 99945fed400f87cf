//! Per-user contact lists (`contacts/<user>.txt`), one username per line.
//!
//! A user can only open chats with (and run `show` against) people in
//! their own contact list.

use crate::fsutil::{append_line, read_lines};
use crate::{Result, Store};

impl Store {
    /// The owner's contacts in file order.
    pub fn contacts(&self, owner: &str) -> Result<Vec<String>> {
        Ok(read_lines(&self.contacts_file(owner))?
            .into_iter()
            .filter(|l| !l.is_empty())
            .collect())
    }

    /// Whether `contact` appears in the owner's list.
    pub fn has_contact(&self, owner: &str, contact: &str) -> Result<bool> {
        Ok(self.contacts(owner)?.iter().any(|c| c == contact))
    }

    /// Append a contact; adding an existing one is a no-op.
    pub fn add_contact(&self, owner: &str, contact: &str) -> Result<()> {
        if self.has_contact(owner, contact)? {
            return Ok(());
        }
        append_line(&self.contacts_file(owner), contact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn add_lookup_and_dedup() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path()).unwrap();

        assert!(!store.has_contact("alice", "bob").unwrap());

        store.add_contact("alice", "bob").unwrap();
        store.add_contact("alice", "carol").unwrap();
        store.add_contact("alice", "bob").unwrap();

        assert!(store.has_contact("alice", "bob").unwrap());
        assert_eq!(store.contacts("alice").unwrap(), vec!["bob", "carol"]);

        // Lists are per owner.
        assert!(store.contacts("bob").unwrap().is_empty());
    }
}
