/// Maximum payload of a text or blob frame, in bytes.
pub const MAX_PAYLOAD: usize = 1023;

/// Maximum username length accepted at signup.
pub const MAX_USERNAME_LEN: usize = 30;

/// Maximum password length accepted at signup.
pub const MAX_PASSWORD_LEN: usize = 60;

/// Maximum number of participants in a chat, the local user included.
pub const MAX_MEMBERS: usize = 100;

/// Default rendezvous server port.
pub const DEFAULT_SERVER_PORT: u16 = 4242;

/// Integer-frame sentinel meaning "no listen port": the queried user is
/// offline or unknown.
pub const PORT_INVALID: u16 = u16::MAX;

/// File transfers are streamed in chunks of this many bytes.
pub const SHARE_CHUNK_SIZE: usize = MAX_PAYLOAD;
