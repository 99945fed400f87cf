//! Terminal input parsing.
//!
//! Before login only `signup` and `in` are understood; outside a chat the
//! top-level commands apply; inside a chat everything that is not one of
//! the chat controls is a message to the members.

/// A pre-login command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthCommand {
    Signup { username: String, password: String },
    Login { username: String, password: String },
}

/// A top-level command (no chat open).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Hanging,
    Show(String),
    Chat(String),
    Contact(String),
    ShareOutsideChat,
    Out,
}

/// Input while a chat is open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatInput {
    Close,
    AddMember,
    Share(String),
    Message(String),
}

/// Parse a pre-login line. The password is everything after the username,
/// so passphrases with spaces work.
pub fn parse_auth(line: &str) -> Option<AuthCommand> {
    let line = line.trim_end();
    if let Some(rest) = line.strip_prefix("signup ") {
        let (username, password) = rest.trim_start().split_once(' ')?;
        return Some(AuthCommand::Signup {
            username: username.to_string(),
            password: password.to_string(),
        });
    }
    if let Some(rest) = line.strip_prefix("in ") {
        let (username, password) = rest.trim_start().split_once(' ')?;
        return Some(AuthCommand::Login {
            username: username.to_string(),
            password: password.to_string(),
        });
    }
    None
}

/// Parse a top-level line. `None` means "not a command" and calls for the
/// help text.
pub fn parse_command(line: &str) -> Option<Command> {
    let line = line.trim();
    if line == "hanging" {
        return Some(Command::Hanging);
    }
    if let Some(user) = line.strip_prefix("show ") {
        return Some(Command::Show(user.trim().to_string()));
    }
    if let Some(user) = line.strip_prefix("chat ") {
        return Some(Command::Chat(user.trim().to_string()));
    }
    if let Some(user) = line.strip_prefix("contact ") {
        return Some(Command::Contact(user.trim().to_string()));
    }
    if line.starts_with("share ") {
        return Some(Command::ShareOutsideChat);
    }
    if line == "out" {
        return Some(Command::Out);
    }
    None
}

/// Classify a line typed while a chat is open.
pub fn parse_chat_input(line: &str) -> ChatInput {
    let trimmed = line.trim_end();
    match trimmed {
        "\\q" => ChatInput::Close,
        "\\u" => ChatInput::AddMember,
        _ => {
            if let Some(name) = trimmed.strip_prefix("share ") {
                ChatInput::Share(name.trim().to_string())
            } else {
                ChatInput::Message(trimmed.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_commands_allow_passphrases() {
        assert_eq!(
            parse_auth("signup alice secret words here\n"),
            Some(AuthCommand::Signup {
                username: "alice".into(),
                password: "secret words here".into(),
            })
        );
        assert_eq!(
            parse_auth("in bob pw"),
            Some(AuthCommand::Login {
                username: "bob".into(),
                password: "pw".into(),
            })
        );
        assert_eq!(parse_auth("in bob"), None);
        assert_eq!(parse_auth("login bob pw"), None);
    }

    #[test]
    fn top_level_commands() {
        assert_eq!(parse_command("hanging"), Some(Command::Hanging));
        assert_eq!(parse_command("show alice"), Some(Command::Show("alice".into())));
        assert_eq!(parse_command("chat bob "), Some(Command::Chat("bob".into())));
        assert_eq!(
            parse_command("contact carol"),
            Some(Command::Contact("carol".into()))
        );
        assert_eq!(parse_command("share notes.txt"), Some(Command::ShareOutsideChat));
        assert_eq!(parse_command("out"), Some(Command::Out));
        assert_eq!(parse_command("dance"), None);
    }

    #[test]
    fn chat_input_classification() {
        assert_eq!(parse_chat_input("\\q"), ChatInput::Close);
        assert_eq!(parse_chat_input("\\u"), ChatInput::AddMember);
        assert_eq!(
            parse_chat_input("share notes.txt"),
            ChatInput::Share("notes.txt".into())
        );
        assert_eq!(
            parse_chat_input("hello there\n"),
            ChatInput::Message("hello there".into())
        );
    }
}
