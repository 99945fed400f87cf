//! Terminal output. Deliberately thin: the engine decides *what* happened,
//! these helpers only decide how it looks.

use std::io::Write;

use parley_shared::types::format_epoch;

pub fn auth_menu() {
    println!("*************************************************");
    println!("AVAILABLE COMMANDS:");
    println!("-> signup <username> <password>: create an account");
    println!("-> in <username> <password>: log in");
    println!("*************************************************");
}

pub fn main_menu() {
    println!("*************************************************");
    println!("AVAILABLE COMMANDS:");
    println!("-> hanging: summarize your pending messages");
    println!("-> show <username>: read the pending messages from <username>");
    println!("-> chat <username>: open a chat with <username>");
    println!("-> contact <username>: add <username> to your contacts");
    println!("-> share <file>: send <file> to the chat (only inside a chat)");
    println!("-> out: log out");
    println!("In a chat: '\\q' closes it, '\\u' adds a member.");
    println!("*************************************************");
}

/// The input prompt: bare when idle, named inside a chat.
pub fn prompt(in_chat_as: Option<&str>) {
    match in_chat_as {
        Some(user) => print!("{user}>"),
        None => print!(">"),
    }
    let _ = std::io::stdout().flush();
}

/// The transcript with one interlocutor, plus the reachability banner.
pub fn render_history(other: &str, lines: &[String], peer_offline: bool) {
    if peer_offline {
        println!("{other} is offline: messages you send now are stored on the server.");
    } else {
        println!("{other} is online.");
    }
    println!("--------------------------------");
    println!("Conversation with '{other}':");
    for line in lines {
        println!("{line}");
    }
    println!("--------------------------------");
}

pub fn member_list(members: &[String]) {
    println!("Chat members:");
    for member in members {
        println!("- {member}");
    }
}

pub fn pending_summary(sender: &str, count: &str, epoch: i64) {
    println!("'{sender}' sent you {count} message(s) - {}", format_epoch(epoch));
}

pub fn delivery_note(recipient: &str) {
    println!("One or more messages sent to '{recipient}' have been delivered.");
}

pub fn new_message_notice(sender: &str) {
    println!("** New message from '{sender}' **");
}
