//! Dynamic group formation by cascading invitations.
//!
//! The inviter opens a direct connection to the chosen contact and sends
//! the invite; on acceptance it syncs the current member list. The new
//! member then resolves every listed member through the server and
//! connects to each one directly, announcing itself, so that the whole
//! group ends up pairwise connected.

use tokio::net::TcpStream;
use tracing::warn;

use parley_shared::constants::PORT_INVALID;
use parley_shared::protocol;

use crate::engine::{Engine, Flow, SERVER_CONN};
use crate::error::ClientError;
use crate::session::{ChatMode, ConnId, Route};
use crate::ui;

impl Engine {
    /// `\u` during a chat: pick an online contact and invite them in.
    pub(crate) async fn add_member_flow(&mut self) -> Result<(), ClientError> {
        let me = self.session.username.clone();

        if self.session.mode == ChatMode::OneToOne && self.session.peer_unreachable {
            println!("You cannot grow the chat while your interlocutor is offline.");
            return Ok(());
        }
        if !self.session.has_room() {
            println!("The chat is full.");
            return Ok(());
        }

        let candidates: Vec<String> = self
            .store
            .contacts(&me)?
            .into_iter()
            .filter(|c| *c != me && !self.session.is_member(c))
            .collect();
        if candidates.is_empty() {
            println!("Nobody in your contacts can be added.");
            return Ok(());
        }

        // Bulk online-check: only reachable users may join a group.
        self.write_text(SERVER_CONN, protocol::GROUP_CHECK).await?;
        let mut online = Vec::new();
        for name in candidates {
            self.write_text(SERVER_CONN, &name).await?;
            match self.server_reply().await?.as_str() {
                protocol::USER_ONLINE => online.push(name),
                protocol::USER_OFFLINE => {}
                other => warn!(token = %other, "unexpected online-check reply"),
            }
        }
        self.write_text(SERVER_CONN, protocol::GROUP_CHECK_DONE)
            .await?;

        if online.is_empty() {
            println!("Nobody available right now.");
            return Ok(());
        }
        println!("Online users you can add:");
        for (i, name) in online.iter().enumerate() {
            println!("{}) {name}", i + 1);
        }
        print!("'\\a <username>' to add: ");
        ui::prompt(Some(&me));

        let answer = self.lines.recv().await.unwrap_or_default();
        let target = match answer.trim().strip_prefix("\\a ") {
            Some(name) => name.trim().to_string(),
            None => {
                println!("Invalid choice.");
                return Ok(());
            }
        };
        if !online.iter().any(|n| *n == target) {
            println!("Invalid username.");
            return Ok(());
        }

        // The target must still be reachable when we actually add them.
        self.write_text(SERVER_CONN, protocol::PORT_REQUEST).await?;
        self.write_text(SERVER_CONN, &target).await?;
        if self.server_reply().await? != protocol::USER_ONLINE {
            println!("'{target}' went offline in the meantime.");
            return Ok(());
        }
        let port = self.read_u16(SERVER_CONN).await?;

        let stream = match TcpStream::connect((self.server_ip(), port)).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!(peer = %target, error = %e, "could not connect for the invite");
                println!("Could not connect to '{target}'.");
                return Ok(());
            }
        };
        let peer = self.add_conn(stream);

        if self.write_text(peer, protocol::GROUP_INVITE).await.is_err()
            || self.write_text(peer, &me).await.is_err()
        {
            self.peer_lost(peer);
            return Ok(());
        }

        println!("Waiting for '{target}' to answer...");
        let answer = match self.read_text(peer).await {
            Ok(answer) => answer,
            Err(_) => {
                self.peer_lost(peer);
                return Ok(());
            }
        };
        if answer != protocol::YES {
            println!("'{target}' declined the invite.");
            self.conns.remove(&peer);
            return Ok(());
        }

        // First addition turns a one-to-one into a group: the original
        // member needs to hear that we are a member too, so their session
        // recognizes the link.
        if self.session.mode == ChatMode::OneToOne {
            if let Some(first) = self.session.original_interlocutor().map(str::to_string) {
                if let Some(Route::Direct(conn)) = self.session.route(&first) {
                    if self.write_text(conn, protocol::NEW_MEMBER).await.is_err()
                        || self.write_text(conn, &me).await.is_err()
                    {
                        self.peer_lost(conn);
                    }
                }
            }
        }

        // Sync the current member list to the newcomer.
        let members: Vec<String> = self.session.members().to_vec();
        for member in &members {
            if self.write_text(peer, member).await.is_err() {
                self.peer_lost(peer);
                return Ok(());
            }
        }
        if self.write_text(peer, protocol::END_MEMBERS).await.is_err() {
            self.peer_lost(peer);
            return Ok(());
        }

        self.session.add_member(&target, Route::Direct(peer))?;
        self.session.mode = ChatMode::Group;
        println!("'{target}' joined the chat!");
        ui::member_list(self.session.members());
        Ok(())
    }

    /// Inbound `GRPINVITE`: auto-reject while any chat is open, otherwise
    /// ask the operator; on acceptance, absorb the member list and connect
    /// to every member.
    pub(crate) async fn handle_invite(&mut self, id: ConnId) -> Result<Flow, ClientError> {
        let inviter = match self.read_text(id).await {
            Ok(name) => name,
            Err(_) => {
                self.peer_lost(id);
                return Ok(Flow::Continue);
            }
        };

        if self.session.in_chat() {
            // Busy: reject without prompting.
            let _ = self.write_text(id, protocol::NO).await;
            self.conns.remove(&id);
            return Ok(Flow::Continue);
        }

        println!("'{inviter}' invited you to join a group chat. Join? [y/n]: ");
        let answer = self.lines.recv().await.unwrap_or_default();
        let accept = answer.trim().eq_ignore_ascii_case(protocol::YES);

        let reply = if accept { protocol::YES } else { protocol::NO };
        if self.write_text(id, reply).await.is_err() {
            self.peer_lost(id);
            return Ok(Flow::Continue);
        }
        if !accept {
            println!("Invite rejected.");
            self.conns.remove(&id);
            ui::prompt(None);
            return Ok(Flow::Continue);
        }

        self.session.add_member(&inviter, Route::Direct(id))?;
        self.session.mode = ChatMode::Group;

        // Receive the member list; resolve and connect to each one.
        loop {
            let name = match self.read_text(id).await {
                Ok(name) => name,
                Err(_) => {
                    self.peer_lost(id);
                    break;
                }
            };
            if name == protocol::END_MEMBERS {
                break;
            }
            if name == self.session.username || self.session.is_member(&name) {
                continue;
            }
            if !self.session.has_room() {
                warn!(member = %name, "chat is full, member skipped");
                continue;
            }

            self.write_text(SERVER_CONN, protocol::MEMBER_PORT_REQUEST)
                .await?;
            self.write_text(SERVER_CONN, &name).await?;
            // Bare integer reply: a concurrent now-online push cannot be
            // told apart from it, a window this exchange accepts.
            let port = self.read_u16(SERVER_CONN).await?;

            if port == PORT_INVALID {
                self.session.add_member(&name, Route::Relay)?;
                continue;
            }

            match TcpStream::connect((self.server_ip(), port)).await {
                Ok(stream) => {
                    let conn = self.add_conn(stream);
                    self.session.add_member(&name, Route::Direct(conn))?;
                    println!("Connected to '{name}'.");

                    // Announce the join so they add us symmetrically.
                    let m = self.session.username.clone();
                    if self.write_text(conn, protocol::NEW_MEMBER).await.is_err()
                        || self.write_text(conn, &m).await.is_err()
                    {
                        self.peer_lost(conn);
                    }
                }
                Err(e) => {
                    warn!(member = %name, error = %e, "member unreachable, using the relay");
                    self.session.add_member(&name, Route::Relay)?;
                }
            }
        }

        self.display_history(&inviter)?;
        ui::prompt(self.prompt_user());
        Ok(Flow::Continue)
    }
}
