//! Append-only login/logout log (`activity.txt`).

use chrono::Utc;

use parley_shared::types::format_instant;

use crate::fsutil::append_line;
use crate::{Result, Store};

/// What happened, and who wrote it down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    Login,
    Logout,
    /// Logout recorded by the client itself because the server was gone.
    ClientLogout,
}

impl Store {
    /// Append one timestamped activity line.
    pub fn log_activity(&self, activity: Activity, username: &str) -> Result<()> {
        let stamp = format_instant(Utc::now());
        let line = match activity {
            Activity::Login => format!("[{stamp}] LOGIN {username}"),
            Activity::Logout => format!("[{stamp}] LOGOUT {username}"),
            Activity::ClientLogout => format!("[{stamp}] LOGOUT {username} (client)"),
        };
        append_line(&self.activity_file(), &line)
    }
}
