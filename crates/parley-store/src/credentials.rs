//! Account registration and authentication against `users.txt`.
//!
//! One `username password` pair per line; passwords may contain spaces
//! (everything after the first space is the password). The expected
//! outcomes — duplicate username, unknown user, wrong password — are enum
//! values, not errors: only I/O trouble is an `Err`.

use crate::fsutil::{append_line, read_lines};
use crate::{Result, Store};

/// Outcome of a registration attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignupOutcome {
    Created,
    DuplicateUsername,
}

/// Outcome of an authentication attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    Accepted,
    UnknownUser,
    WrongPassword,
}

impl Store {
    /// Register a new account. On success the user's (empty) block in the
    /// offline-message ledger is created as well, so later sends have a
    /// container to land in.
    pub fn register(&self, username: &str, password: &str) -> Result<SignupOutcome> {
        let lines = read_lines(&self.users_file())?;
        if lines
            .iter()
            .any(|l| l.split_whitespace().next() == Some(username))
        {
            return Ok(SignupOutcome::DuplicateUsername);
        }

        append_line(&self.users_file(), &format!("{username} {password}"))?;
        self.ensure_pending_block(username)?;

        tracing::debug!(user = %username, "account registered");
        Ok(SignupOutcome::Created)
    }

    /// Check a username/password pair.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<AuthOutcome> {
        let lines = read_lines(&self.users_file())?;

        for line in lines {
            let Some((user, stored)) = line.split_once(' ') else {
                continue;
            };
            if user == username {
                return Ok(if stored == password {
                    AuthOutcome::Accepted
                } else {
                    AuthOutcome::WrongPassword
                });
            }
        }

        Ok(AuthOutcome::UnknownUser)
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
    fn duplicate_username_is_rejected_the_second_time() {
        let (store, _dir) = store();

        assert_eq!(
            store.register("alice", "pw1").unwrap(),
            SignupOutcome::Created
        );
        assert_eq!(
            store.register("alice", "other").unwrap(),
            SignupOutcome::DuplicateUsername
        );
    }

    #[test]
    fn auth_outcome_matrix() {
        let (store, _dir) = store();
        store.register("alice", "correct horse").unwrap();

        assert_eq!(
            store.authenticate("nobody", "x").unwrap(),
            AuthOutcome::UnknownUser
        );
        assert_eq!(
            store.authenticate("alice", "wrong").unwrap(),
            AuthOutcome::WrongPassword
        );
        // A wrong attempt does not poison the account.
        assert_eq!(
            store.authenticate("alice", "correct horse").unwrap(),
            AuthOutcome::Accepted
        );
    }

    #[test]
    fn passphrases_with_spaces_survive() {
        let (store, _dir) = store();
        store.register("bob", "a long pass phrase").unwrap();

        assert_eq!(
            store.authenticate("bob", "a long pass phrase").unwrap(),
            AuthOutcome::Accepted
        );
        assert_eq!(
            store.authenticate("bob", "a long pass").unwrap(),
            AuthOutcome::WrongPassword
        );
    }
}
