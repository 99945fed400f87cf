//! The online registry: one [`RegistryEntry`] per user that ever logged in.
//!
//! Entries are created on first successful login and updated in place on
//! every later login/logout; they are never deleted. A user is online iff
//! its entry has no logout stamp, which in turn holds iff the entry owns a
//! live connection handle.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::state::ClientHandle;

/// Presence and address information for one known user.
pub struct RegistryEntry {
    /// Port where this user's own client listens for peer connections.
    pub listen_port: u16,
    /// When the current (or last) session started.
    pub login_at: DateTime<Utc>,
    /// When the last session ended; `None` while the user is online.
    pub logout_at: Option<DateTime<Utc>>,
    /// Write half of the live server connection; `None` while offline.
    pub conn: Option<ClientHandle>,
}

/// Mapping from username to [`RegistryEntry`].
#[derive(Default)]
pub struct Directory {
    entries: HashMap<String, RegistryEntry>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a login: create or update the user's entry, stamp the login
    /// time, clear the logout marker and attach the connection handle.
    ///
    /// Returns the handles of every *other* online user, for the
    /// now-online broadcast.
    pub fn upsert_online(
        &mut self,
        username: &str,
        conn: ClientHandle,
        listen_port: u16,
    ) -> Vec<(String, ClientHandle)> {
        let entry = RegistryEntry {
            listen_port,
            login_at: Utc::now(),
            logout_at: None,
            conn: Some(conn),
        };
        self.entries.insert(username.to_string(), entry);
        debug!(user = %username, port = listen_port, "user online");

        self.entries
            .iter()
            .filter(|(name, e)| name.as_str() != username && e.logout_at.is_none())
            .filter_map(|(name, e)| e.conn.clone().map(|h| (name.clone(), h)))
            .collect()
    }

    /// Record a logout: stamp the time and drop the connection handle. The
    /// entry itself stays forever.
    pub fn mark_offline(&mut self, username: &str) {
        if let Some(entry) = self.entries.get_mut(username) {
            entry.logout_at = Some(Utc::now());
            entry.conn = None;
            debug!(user = %username, "user offline");
        }
    }

    pub fn is_online(&self, username: &str) -> bool {
        self.entries
            .get(username)
            .is_some_and(|e| e.logout_at.is_none())
    }

    /// The user's listen port, while online.
    pub fn lookup_port(&self, username: &str) -> Option<u16> {
        self.entries
            .get(username)
            .filter(|e| e.logout_at.is_none())
            .map(|e| e.listen_port)
    }

    /// The user's live connection handle, while online.
    pub fn lookup_handle(&self, username: &str) -> Option<ClientHandle> {
        self.entries
            .get(username)
            .filter(|e| e.logout_at.is_none())
            .and_then(|e| e.conn.clone())
    }

    pub fn entry(&self, username: &str) -> Option<&RegistryEntry> {
        self.entries.get(username)
    }

    /// Number of users that ever logged in.
    pub fn known_users(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::net::{TcpListener, TcpStream};

    async fn handle() -> ClientHandle {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let _accepted = listener.accept().await.unwrap();
        let (_r, w) = client.into_split();
        Arc::new(tokio::sync::Mutex::new(w))
    }

    #[tokio::test]
    async fn login_logout_lifecycle_never_deletes() {
        let mut dir = Directory::new();

        assert!(!dir.is_online("alice"));
        dir.upsert_online("alice", handle().await, 5001);
        assert!(dir.is_online("alice"));
        assert_eq!(dir.lookup_port("alice"), Some(5001));

        dir.mark_offline("alice");
        assert!(!dir.is_online("alice"));
        assert_eq!(dir.lookup_port("alice"), None);
        assert!(dir.lookup_handle("alice").is_none());
        // The entry survives the logout.
        assert_eq!(dir.known_users(), 1);
        assert!(dir.entry("alice").unwrap().logout_at.is_some());

        // A fresh login updates in place, with the new port.
        dir.upsert_online("alice", handle().await, 6001);
        assert_eq!(dir.lookup_port("alice"), Some(6001));
        assert_eq!(dir.known_users(), 1);
    }

    #[tokio::test]
    async fn broadcast_snapshot_excludes_the_new_user_and_offline_users() {
        let mut dir = Directory::new();

        dir.upsert_online("alice", handle().await, 5001);
        dir.upsert_online("bob", handle().await, 5002);
        dir.mark_offline("bob");

        let others = dir.upsert_online("carol", handle().await, 5003);
        let names: Vec<&str> = others.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["alice"]);
    }

    #[tokio::test]
    async fn entry_invariant_conn_iff_online() {
        let mut dir = Directory::new();
        dir.upsert_online("alice", handle().await, 5001);

        let entry = dir.entry("alice").unwrap();
        assert!(entry.logout_at.is_none() && entry.conn.is_some());

        dir.mark_offline("alice");
        let entry = dir.entry("alice").unwrap();
        assert!(entry.logout_at.is_some() && entry.conn.is_none());
    }
}
