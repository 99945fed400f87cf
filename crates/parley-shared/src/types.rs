//! Shared data model: chat-log lines, pending-message summaries and the
//! username rules both sides enforce.

use chrono::{DateTime, Local, TimeZone, Utc};

use crate::constants::{MAX_PASSWORD_LEN, MAX_USERNAME_LEN};

/// Marker appended to a chat-log line the recipient has not displayed yet.
pub const UNREAD_MARK: &str = "(*)";
/// Marker appended to a chat-log line the recipient has displayed.
pub const READ_MARK: &str = "(**)";

/// One line of a per-pair chat log: `sender: body (*)` or `sender: body (**)`.
///
/// Both participants (and the server, for offline delivery) append and
/// rewrite these lines; the rendered form is the durable file format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatLine {
    pub sender: String,
    pub body: String,
    pub read: bool,
}

impl ChatLine {
    /// A freshly delivered, not-yet-displayed line.
    pub fn unread(sender: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            body: body.into(),
            read: false,
        }
    }

    /// Render to the on-disk / on-screen form.
    pub fn render(&self) -> String {
        let mark = if self.read { READ_MARK } else { UNREAD_MARK };
        format!("{}: {} {}", self.sender, self.body, mark)
    }

    /// Parse a rendered line. Returns `None` for lines that do not follow
    /// the `sender: body (mark)` shape.
    pub fn parse(line: &str) -> Option<Self> {
        let (sender, rest) = line.split_once(": ")?;

        let (body, read) = if let Some(body) = rest.strip_suffix(&format!(" {READ_MARK}")) {
            (body, true)
        } else if let Some(body) = rest.strip_suffix(&format!(" {UNREAD_MARK}")) {
            (body, false)
        } else {
            return None;
        };

        Some(Self {
            sender: sender.to_string(),
            body: body.to_string(),
            read,
        })
    }

    /// The same line with the read marker set.
    pub fn into_read(mut self) -> Self {
        self.read = true;
        self
    }
}

/// Summary of pending offline messages from one sender, as produced by the
/// hanging drain: how many undelivered messages and when the latest arrived
/// (epoch seconds).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSummary {
    pub sender: String,
    pub count: u32,
    pub last_ts: i64,
}

/// Whether `name` is acceptable as a username: 1–30 characters, ASCII
/// alphanumerics and underscore only. The character set keeps usernames
/// safe inside the `:`/`-`-delimited file formats and file names.
pub fn valid_username(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_USERNAME_LEN
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Whether `password` is acceptable: 1–60 characters, no leading/trailing
/// whitespace (interior spaces allowed — passphrases are fine).
pub fn valid_password(password: &str) -> bool {
    !password.is_empty() && password.len() <= MAX_PASSWORD_LEN && password.trim() == password
}

/// Format epoch seconds for human display, in local time.
pub fn format_epoch(secs: i64) -> String {
    match Local.timestamp_opt(secs, 0) {
        chrono::LocalResult::Single(dt) => dt.format("%d %b %Y %H:%M:%S").to_string(),
        _ => format!("@{secs}"),
    }
}

/// Format an absolute instant for the activity log.
pub fn format_instant(instant: DateTime<Utc>) -> String {
    instant
        .with_timezone(&Local)
        .format("%d %b %Y %H:%M:%S")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_line_round_trip() {
        let line = ChatLine::unread("alice", "hello there");
        let rendered = line.render();
        assert_eq!(rendered, "alice: hello there (*)");
        assert_eq!(ChatLine::parse(&rendered).unwrap(), line);

        let read = line.into_read();
        assert_eq!(read.render(), "alice: hello there (**)");
        assert!(ChatLine::parse(&read.render()).unwrap().read);
    }

    #[test]
    fn chat_line_body_may_contain_colons_and_marks() {
        let line = ChatLine::unread("bob", "see: this (*) is fine");
        let parsed = ChatLine::parse(&line.render()).unwrap();
        assert_eq!(parsed.body, "see: this (*) is fine");
        assert!(!parsed.read);
    }

    #[test]
    fn malformed_lines_are_rejected() {
        assert!(ChatLine::parse("no separator here").is_none());
        assert!(ChatLine::parse("alice: missing mark").is_none());
    }

    #[test]
    fn username_rules() {
        assert!(valid_username("alice"));
        assert!(valid_username("user_42"));
        assert!(!valid_username(""));
        assert!(!valid_username("has space"));
        assert!(!valid_username("colon:name"));
        assert!(!valid_username("dash-name"));
        assert!(!valid_username(&"x".repeat(31)));
    }

    #[test]
    fn password_rules() {
        assert!(valid_password("hunter2"));
        assert!(valid_password("a pass phrase with spaces"));
        assert!(!valid_password(""));
        assert!(!valid_password(" leading"));
        assert!(!valid_password(&"x".repeat(61)));
    }
}
