//! The client-side chat session: who is in the conversation and how each
//! member is reached.
//!
//! A member's route is either a direct peer socket or the server relay
//! (store-and-forward for members that are offline). Routes flip between
//! the two as peers die and come back; the mode never changes because of
//! route churn, only through explicit open/add/close transitions.

use std::collections::HashMap;

use thiserror::Error;

use parley_shared::constants::MAX_MEMBERS;

/// Identifier of one live socket owned by the engine's connection table.
pub type ConnId = u32;

/// How messages to one member currently travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// A live peer-to-peer socket.
    Direct(ConnId),
    /// Store-and-forward through the server.
    Relay,
}

/// What kind of conversation is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatMode {
    None,
    OneToOne,
    Group,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SessionError {
    #[error("the chat is full ({MAX_MEMBERS} members)")]
    TooManyMembers,

    #[error("'{0}' is already a member of this chat")]
    DuplicateMember(String),
}

/// Per-login session state, owned by the event loop and handed to every
/// handler by reference.
pub struct ClientSession {
    /// The authenticated username.
    pub username: String,
    /// Current chat participants, in join order; the first entry is the
    /// original interlocutor (or the inviter, on the invitee side).
    members: Vec<String>,
    routes: HashMap<String, Route>,
    pub mode: ChatMode,
    /// True when the original single interlocutor is offline.
    pub peer_unreachable: bool,
    pub server_reachable: bool,
}

impl ClientSession {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            members: Vec::new(),
            routes: HashMap::new(),
            mode: ChatMode::None,
            peer_unreachable: false,
            server_reachable: true,
        }
    }

    pub fn in_chat(&self) -> bool {
        !matches!(self.mode, ChatMode::None)
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }

    pub fn is_member(&self, name: &str) -> bool {
        self.members.iter().any(|m| m == name)
    }

    /// The user this chat was opened with.
    pub fn original_interlocutor(&self) -> Option<&str> {
        self.members.first().map(String::as_str)
    }

    /// Whether another member still fits (the cap counts the local user).
    pub fn has_room(&self) -> bool {
        self.members.len() + 1 < MAX_MEMBERS
    }

    /// Add a member with its route. Members are unique and capped.
    pub fn add_member(&mut self, name: &str, route: Route) -> Result<(), SessionError> {
        if self.is_member(name) {
            return Err(SessionError::DuplicateMember(name.to_string()));
        }
        if !self.has_room() {
            return Err(SessionError::TooManyMembers);
        }
        self.members.push(name.to_string());
        self.routes.insert(name.to_string(), route);
        Ok(())
    }

    pub fn route(&self, name: &str) -> Option<Route> {
        self.routes.get(name).copied()
    }

    pub fn set_route(&mut self, name: &str, route: Route) {
        if self.is_member(name) {
            self.routes.insert(name.to_string(), route);
        }
    }

    /// The member reached over the given socket, if any.
    pub fn member_for_conn(&self, conn: ConnId) -> Option<&str> {
        self.routes
            .iter()
            .find(|(_, r)| **r == Route::Direct(conn))
            .map(|(name, _)| name.as_str())
    }

    /// A peer socket died: flip that member's route to the relay. In a
    /// one-to-one chat this also marks the interlocutor unreachable.
    /// Returns the affected member.
    pub fn demote_to_relay(&mut self, conn: ConnId) -> Option<String> {
        let member = self.member_for_conn(conn)?.to_string();
        self.routes.insert(member.clone(), Route::Relay);
        if self.mode == ChatMode::OneToOne {
            self.peer_unreachable = true;
        }
        Some(member)
    }

    /// A member came back online over a fresh socket. Clears the
    /// unreachable flag when it was the original interlocutor.
    pub fn promote_to_direct(&mut self, name: &str, conn: ConnId) {
        self.set_route(name, Route::Direct(conn));
        if self.original_interlocutor() == Some(name) {
            self.peer_unreachable = false;
        }
    }

    /// Members together with their routes, in join order.
    pub fn deliveries(&self) -> Vec<(String, Route)> {
        self.members
            .iter()
            .filter_map(|m| self.routes.get(m).map(|r| (m.clone(), *r)))
            .collect()
    }

    /// End the chat: returns the sockets to close and resets every
    /// chat-related field.
    pub fn close_chat(&mut self) -> Vec<ConnId> {
        let conns = self
            .routes
            .values()
            .filter_map(|r| match r {
                Route::Direct(c) => Some(*c),
                Route::Relay => None,
            })
            .collect();
        self.members.clear();
        self.routes.clear();
        self.mode = ChatMode::None;
        self.peer_unreachable = false;
        conns
    }
}
