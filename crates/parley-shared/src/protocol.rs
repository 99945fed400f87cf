//! The wire protocol vocabulary.
//!
//! Every command and reply is a short text frame carrying one of the tokens
//! below; ports travel as integer frames. The token values are the durable
//! wire contract between server and clients.

/// Client → server: register a new account.
pub const SIGNUP: &str = "SGN";
/// Client → server: authenticate an existing account.
pub const LOGIN: &str = "LGN";
/// Server → client: the requested username is already taken.
pub const DUPLICATE_USERNAME: &str = "OLDUSR";
/// Server → client: registration succeeded.
pub const SIGNED_UP: &str = "OKSGN";
/// Server → client: no account with that username.
pub const UNKNOWN_USER: &str = "UNKUSR";
/// Server → client: password mismatch.
pub const WRONG_PASSWORD: &str = "WRGPSW";
/// Server → client: credentials accepted, session authenticated.
pub const AUTHENTICATED: &str = "AUTHOK";

/// Server → every other online client: a user just logged in. Followed by
/// the username and its listen port.
pub const NOW_ONLINE: &str = "NEWONL";

/// Client → server: log out and close the connection.
pub const LOGOUT: &str = "OUT";

/// Client → server: look up a chat target. Followed by the username.
pub const CHAT_REQUEST: &str = "CHT";
/// Status reply: the user is online (a port frame follows where the
/// exchange calls for one).
pub const USER_ONLINE: &str = "ON";
/// Status reply: the user is offline.
pub const USER_OFFLINE: &str = "OFF";

/// Client → server: start a bulk online-check loop for group assembly.
pub const GROUP_CHECK: &str = "GRPCHAT";
/// Client → server: terminator of the bulk online-check loop.
pub const GROUP_CHECK_DONE: &str = "GRPDONE";
/// Client → server: resolve one user's listen port. Followed by the
/// username; answered with `ON` + port or `OFF`.
pub const PORT_REQUEST: &str = "PRTREQ";

/// Inviter → invitee (direct): invitation to join the chat. Followed by the
/// inviter's username.
pub const GROUP_INVITE: &str = "GRPINVITE";
/// Invite accepted.
pub const YES: &str = "Y";
/// Invite rejected.
pub const NO: &str = "N";
/// Inviter → new member: terminator of the member-list sync.
pub const END_MEMBERS: &str = "ENDUSR";
/// New member → server: resolve an existing member's port. Answered with a
/// bare port frame, [`crate::constants::PORT_INVALID`] when unreachable.
pub const MEMBER_PORT_REQUEST: &str = "GRPPRTREQ";
/// New member → each existing member (direct): announce the join. Followed
/// by the new member's username.
pub const NEW_MEMBER: &str = "NEWMBR";

/// Client → server: summarize pending offline messages.
pub const HANGING: &str = "HNG";
/// Server → client: terminator of the hanging summary.
pub const HANGING_DONE: &str = "ENDHNG";

/// Client → server: retrieve pending messages from one sender. Followed by
/// the sender's username.
pub const SHOW: &str = "SHW";
/// Server → client: terminator of the show transfer.
pub const SHOW_DONE: &str = "ENDSHW";
/// Server → original sender: previously stored messages were delivered.
/// Followed by the recipient's username.
pub const MESSAGES_SENT: &str = "SENT";

/// Client → server: submit a message for an offline recipient. Followed by
/// the recipient and the body.
pub const OFFLINE_MESSAGE: &str = "NEWMSG";
/// Acknowledgment that a chat message was written to the log, sent by
/// whoever performed the write (server or peer).
pub const MESSAGE_LOGGED: &str = "OKMSG";

/// Sender → peer: a file transfer is about to start.
pub const SHARE: &str = "SHARE";
/// Peer → sender: ready to receive the file.
pub const SHARE_ACK: &str = "OKSHARE";
/// Sender → peer: the file is complete.
pub const SHARE_DONE: &str = "ENDSHARE";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::MAX_PAYLOAD;

    #[test]
    fn tokens_are_distinct() {
        let all = [
            SIGNUP,
            LOGIN,
            DUPLICATE_USERNAME,
            SIGNED_UP,
            UNKNOWN_USER,
            WRONG_PASSWORD,
            AUTHENTICATED,
            NOW_ONLINE,
            LOGOUT,
            CHAT_REQUEST,
            USER_ONLINE,
            USER_OFFLINE,
            GROUP_CHECK,
            GROUP_CHECK_DONE,
            PORT_REQUEST,
            GROUP_INVITE,
            YES,
            NO,
            END_MEMBERS,
            MEMBER_PORT_REQUEST,
            NEW_MEMBER,
            HANGING,
            HANGING_DONE,
            SHOW,
            SHOW_DONE,
            MESSAGES_SENT,
            OFFLINE_MESSAGE,
            MESSAGE_LOGGED,
            SHARE,
            SHARE_ACK,
            SHARE_DONE,
        ];
        let mut seen = std::collections::HashSet::new();
        for token in all {
            assert!(seen.insert(token), "duplicate token {token}");
            assert!(token.len() <= MAX_PAYLOAD);
        }
    }
}
