//! The client's single-owner event loop.
//!
//! One task owns every socket — the server connection, the peer listener
//! and all live peer-to-peer sockets — plus the terminal input channel.
//! Each wake-up services exactly one ready source; handlers may then
//! perform blocking sequential frame reads on one connection, which stalls
//! the loop for that handler's duration (an accepted property of the
//! design, matched by small payloads and local-host latencies).
//!
//! Error discipline: wire errors on *peer* sockets are always handled
//! inline (the member's route flips to the relay); only server-connection
//! errors propagate out of handlers, and the run loop funnels them into
//! the server-loss logic.

use std::collections::HashMap;
use std::net::IpAddr;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use parley_shared::types::ChatLine;
use parley_shared::{protocol, wire, WireError};
use parley_store::{Activity, Store};

use crate::commands::{self, ChatInput, Command};
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::session::{ChatMode, ClientSession, ConnId, Route};
use crate::ui;

/// The server connection's slot in the connection table.
pub const SERVER_CONN: ConnId = 0;

/// Whether the loop keeps going after an event.
pub enum Flow {
    Continue,
    Exit,
}

enum Event {
    Line(String),
    Accepted(TcpStream),
    Readable(ConnId),
    StdinClosed,
    Noop,
}

pub struct Engine {
    pub(crate) config: ClientConfig,
    pub(crate) store: Store,
    pub(crate) session: ClientSession,
    pub(crate) conns: HashMap<ConnId, TcpStream>,
    pub(crate) lines: mpsc::Receiver<String>,
    listener: TcpListener,
    next_conn: ConnId,
}

impl Engine {
    pub fn new(
        config: ClientConfig,
        store: Store,
        session: ClientSession,
        server: TcpStream,
        listener: TcpListener,
        lines: mpsc::Receiver<String>,
    ) -> Self {
        let mut conns = HashMap::new();
        conns.insert(SERVER_CONN, server);
        Self {
            config,
            store,
            session,
            conns,
            lines,
            listener,
            next_conn: SERVER_CONN + 1,
        }
    }

    pub async fn run(mut self) -> Result<(), ClientError> {
        ui::main_menu();
        ui::prompt(None);

        loop {
            let flow = match self.next_event().await {
                Event::Line(line) => match self.handle_line(&line).await {
                    Ok(flow) => flow,
                    Err(e) => self.operation_failed(e)?,
                },
                Event::Readable(id) => match self.handle_socket(id).await {
                    Ok(flow) => flow,
                    Err(e) => self.operation_failed(e)?,
                },
                Event::Accepted(stream) => {
                    let id = self.add_conn(stream);
                    debug!(conn = id, "inbound peer connection");
                    Flow::Continue
                }
                Event::StdinClosed => self.logout().await.unwrap_or(Flow::Exit),
                Event::Noop => Flow::Continue,
            };
            if matches!(flow, Flow::Exit) {
                return Ok(());
            }
        }
    }

    /// Route a handler failure: wire errors mean the server connection is
    /// gone (peer errors never propagate this far); the rest abort the
    /// operation only.
    fn operation_failed(&mut self, e: ClientError) -> Result<Flow, ClientError> {
        match e {
            ClientError::Wire(_) => Ok(self.server_lost()),
            other => {
                warn!(error = %other, "operation abandoned");
                ui::prompt(self.prompt_user());
                Ok(Flow::Continue)
            }
        }
    }

    async fn next_event(&mut self) -> Event {
        tokio::select! {
            line = self.lines.recv() => match line {
                Some(line) => Event::Line(line),
                None => Event::StdinClosed,
            },
            accepted = self.listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    debug!(%addr, "accepting peer");
                    Event::Accepted(stream)
                }
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    Event::Noop
                }
            },
            id = Self::next_readable(&self.conns) => Event::Readable(id),
        }
    }

    /// Wait until any tracked socket is readable and name it.
    async fn next_readable(conns: &HashMap<ConnId, TcpStream>) -> ConnId {
        if conns.is_empty() {
            return futures::future::pending().await;
        }
        let futs: Vec<_> = conns
            .iter()
            .map(|(id, stream)| {
                let id = *id;
                Box::pin(async move {
                    let _ = stream.readable().await;
                    id
                })
            })
            .collect();
        let (id, _, _) = futures::future::select_all(futs).await;
        id
    }

    // ----- connection table ------------------------------------------------

    pub(crate) fn add_conn(&mut self, stream: TcpStream) -> ConnId {
        let id = self.next_conn;
        self.next_conn += 1;
        self.conns.insert(id, stream);
        id
    }

    pub(crate) fn server_ip(&self) -> IpAddr {
        self.config.server_addr.ip()
    }

    pub(crate) async fn read_text(&mut self, id: ConnId) -> Result<String, WireError> {
        let stream = self.conns.get_mut(&id).ok_or(WireError::Closed)?;
        wire::recv_text(stream).await
    }

    pub(crate) async fn read_u16(&mut self, id: ConnId) -> Result<u16, WireError> {
        let stream = self.conns.get_mut(&id).ok_or(WireError::Closed)?;
        wire::recv_u16(stream).await
    }

    pub(crate) async fn read_blob(&mut self, id: ConnId) -> Result<Vec<u8>, WireError> {
        let stream = self.conns.get_mut(&id).ok_or(WireError::Closed)?;
        wire::recv_blob(stream).await
    }

    pub(crate) async fn write_text(&mut self, id: ConnId, text: &str) -> Result<(), WireError> {
        let stream = self.conns.get_mut(&id).ok_or(WireError::Closed)?;
        wire::send_text(stream, text).await
    }

    pub(crate) async fn write_blob(&mut self, id: ConnId, payload: &[u8]) -> Result<(), WireError> {
        let stream = self.conns.get_mut(&id).ok_or(WireError::Closed)?;
        wire::send_blob(stream, payload).await
    }

    // ----- terminal input --------------------------------------------------

    async fn handle_line(&mut self, line: &str) -> Result<Flow, ClientError> {
        let flow = if self.session.in_chat() {
            match commands::parse_chat_input(line) {
                ChatInput::Close => self.close_chat()?,
                ChatInput::AddMember => {
                    self.add_member_flow().await?;
                    Flow::Continue
                }
                ChatInput::Share(name) => {
                    self.share_file(&name).await?;
                    Flow::Continue
                }
                ChatInput::Message(msg) if msg.is_empty() => Flow::Continue,
                ChatInput::Message(msg) => {
                    self.send_chat_message(&msg).await?;
                    Flow::Continue
                }
            }
        } else {
            match commands::parse_command(line) {
                Some(Command::Hanging) => {
                    self.hanging().await?;
                    Flow::Continue
                }
                Some(Command::Show(user)) => {
                    self.show(&user).await?;
                    Flow::Continue
                }
                Some(Command::Chat(user)) => {
                    self.start_chat(&user).await?;
                    Flow::Continue
                }
                Some(Command::Contact(user)) => {
                    self.add_contact(&user)?;
                    Flow::Continue
                }
                Some(Command::ShareOutsideChat) => {
                    println!("'share' only works inside an open chat.");
                    Flow::Continue
                }
                Some(Command::Out) => self.logout().await?,
                None => {
                    if !line.trim().is_empty() {
                        println!("Invalid command.");
                        ui::main_menu();
                    }
                    Flow::Continue
                }
            }
        };

        if matches!(flow, Flow::Continue) {
            ui::prompt(self.prompt_user());
        }
        Ok(flow)
    }

    pub(crate) fn prompt_user(&self) -> Option<&str> {
        self.session
            .in_chat()
            .then_some(self.session.username.as_str())
    }

    // ----- socket events ---------------------------------------------------

    async fn handle_socket(&mut self, id: ConnId) -> Result<Flow, ClientError> {
        let first = match self.read_text(id).await {
            Ok(token) => token,
            Err(e) => {
                return if id == SERVER_CONN {
                    if !e.is_closed() {
                        warn!(error = %e, "server connection failed");
                    }
                    Ok(self.server_lost())
                } else {
                    self.peer_lost(id);
                    Ok(Flow::Continue)
                };
            }
        };

        if id == SERVER_CONN {
            self.handle_server_frame(&first).await?;
            Ok(Flow::Continue)
        } else {
            self.handle_peer_frame(id, &first).await
        }
    }

    async fn handle_server_frame(&mut self, token: &str) -> Result<(), ClientError> {
        match token {
            protocol::NOW_ONLINE => self.handle_now_online().await?,
            protocol::MESSAGES_SENT => {
                let recipient = self.read_text(SERVER_CONN).await?;
                ui::delivery_note(&recipient);
                ui::prompt(self.prompt_user());
            }
            other => warn!(token = %other, "unexpected server frame ignored"),
        }
        Ok(())
    }

    async fn handle_peer_frame(&mut self, id: ConnId, token: &str) -> Result<Flow, ClientError> {
        match token {
            protocol::GROUP_INVITE => self.handle_invite(id).await,
            protocol::NEW_MEMBER => {
                self.handle_new_member(id).await?;
                Ok(Flow::Continue)
            }
            protocol::SHARE => {
                self.receive_share(id).await?;
                Ok(Flow::Continue)
            }
            sender => {
                self.handle_peer_message(id, sender).await?;
                Ok(Flow::Continue)
            }
        }
    }

    /// A user just logged in. If they are a relay-routed member of the open
    /// chat, upgrade them to a fresh direct connection.
    pub(crate) async fn handle_now_online(&mut self) -> Result<(), ClientError> {
        let name = self.read_text(SERVER_CONN).await?;
        let port = self.read_u16(SERVER_CONN).await?;

        if self.session.in_chat() && self.session.route(&name) == Some(Route::Relay) {
            match TcpStream::connect((self.server_ip(), port)).await {
                Ok(stream) => {
                    let id = self.add_conn(stream);
                    self.session.promote_to_direct(&name, id);
                    println!("'{name}' is back online: direct connection restored.");
                    ui::prompt(self.prompt_user());
                }
                Err(e) => {
                    warn!(member = %name, error = %e, "could not upgrade route to direct");
                }
            }
        }
        Ok(())
    }

    /// Inbound chat message: sender frame already read, body follows.
    async fn handle_peer_message(&mut self, id: ConnId, sender: &str) -> Result<(), ClientError> {
        let body = match self.read_text(id).await {
            Ok(body) => body,
            Err(_) => {
                self.peer_lost(id);
                return Ok(());
            }
        };

        let me = self.session.username.clone();
        self.store
            .append_chat_line(&me, &ChatLine::unread(sender, &body))?;

        // The logged acknowledgment releases the sender's UI.
        if self.write_text(id, protocol::MESSAGE_LOGGED).await.is_err() {
            self.peer_lost(id);
        }

        if self.session.in_chat() && self.session.is_member(sender) {
            self.display_history(sender)?;
        } else {
            ui::new_message_notice(sender);
        }
        ui::prompt(self.prompt_user());
        Ok(())
    }

    /// `NEWMBR` from a cascading join: register the announcing peer as a
    /// member, unless we already hold a link to them.
    async fn handle_new_member(&mut self, id: ConnId) -> Result<(), ClientError> {
        let name = match self.read_text(id).await {
            Ok(name) => name,
            Err(_) => {
                self.peer_lost(id);
                return Ok(());
            }
        };

        if !self.session.in_chat() {
            debug!(member = %name, "member announcement outside a chat ignored");
            return Ok(());
        }
        if self.session.is_member(&name) {
            return Ok(());
        }

        match self.session.add_member(&name, Route::Direct(id)) {
            Ok(()) => {
                self.session.mode = ChatMode::Group;
                println!("'{name}' joined the group chat!");
                ui::member_list(self.session.members());
                ui::prompt(self.prompt_user());
            }
            Err(e) => warn!(member = %name, error = %e, "could not register member"),
        }
        Ok(())
    }

    // ----- connection loss -------------------------------------------------

    /// A peer socket died: close it and fall back to the server relay for
    /// the member it carried.
    pub(crate) fn peer_lost(&mut self, id: ConnId) {
        self.conns.remove(&id);
        if let Some(member) = self.session.demote_to_relay(id) {
            println!("'{member}' went offline: messages to them are now stored on the server.");
            ui::prompt(self.prompt_user());
        }
    }

    /// The server connection died. With no live chat (or a one-to-one whose
    /// interlocutor is already relay-routed) the client has nothing left to
    /// do; otherwise the chat stays open and the client exits at close.
    pub(crate) fn server_lost(&mut self) -> Flow {
        self.conns.remove(&SERVER_CONN);
        if !self.session.server_reachable {
            return Flow::Continue;
        }
        self.session.server_reachable = false;
        print!("Server disconnected. ");

        let relay_only_chat =
            self.session.mode == ChatMode::OneToOne && self.session.peer_unreachable;
        if !self.session.in_chat() || relay_only_chat {
            println!();
            if let Err(e) = self
                .store
                .log_activity(Activity::ClientLogout, &self.session.username)
            {
                warn!(error = %e, "could not record the logout locally");
            }
            Flow::Exit
        } else {
            println!("The chat stays open; the client will exit when you close it.");
            ui::prompt(self.prompt_user());
            Flow::Continue
        }
    }

    // ----- top-level commands ---------------------------------------------

    /// Await a server reply, applying any pushes (now-online broadcasts,
    /// delivery notifications) that arrive ahead of it.
    pub(crate) async fn server_reply(&mut self) -> Result<String, ClientError> {
        loop {
            let token = self.read_text(SERVER_CONN).await?;
            match token.as_str() {
                protocol::NOW_ONLINE => self.handle_now_online().await?,
                protocol::MESSAGES_SENT => {
                    let recipient = self.read_text(SERVER_CONN).await?;
                    ui::delivery_note(&recipient);
                }
                _ => return Ok(token),
            }
        }
    }

    async fn hanging(&mut self) -> Result<(), ClientError> {
        println!("Checking for pending messages...");
        self.write_text(SERVER_CONN, protocol::HANGING).await?;

        let mut any = false;
        loop {
            let sender = self.server_reply().await?;
            if sender == protocol::HANGING_DONE {
                break;
            }
            let count = self.read_text(SERVER_CONN).await?;
            let ts: i64 = self.read_text(SERVER_CONN).await?.parse().unwrap_or(0);
            ui::pending_summary(&sender, &count, ts);
            any = true;
        }
        if !any {
            println!("No pending messages!");
        }
        Ok(())
    }

    async fn show(&mut self, sender: &str) -> Result<(), ClientError> {
        let me = self.session.username.clone();
        if !self.store.has_contact(&me, sender)? {
            println!("'{sender}' is not in your contacts.");
            return Ok(());
        }

        self.write_text(SERVER_CONN, protocol::SHOW).await?;
        self.write_text(SERVER_CONN, sender).await?;

        let mut delivered = 0u32;
        loop {
            let line = self.server_reply().await?;
            if line == protocol::SHOW_DONE {
                break;
            }
            println!("{line}");
            delivered += 1;
        }
        if delivered == 0 {
            println!("'{sender}' sent you nothing while you were offline.");
        }
        Ok(())
    }

    fn add_contact(&mut self, contact: &str) -> Result<(), ClientError> {
        if !parley_shared::types::valid_username(contact) {
            println!("Usernames are 1-30 letters, digits or underscores.");
            return Ok(());
        }
        let me = self.session.username.clone();
        self.store.add_contact(&me, contact)?;
        println!("'{contact}' added to your contacts.");
        Ok(())
    }

    /// Close the open chat; with the server gone this is also the end of
    /// the process.
    pub(crate) fn close_chat(&mut self) -> Result<Flow, ClientError> {
        println!("Closing the chat...");
        for conn in self.session.close_chat() {
            self.conns.remove(&conn);
        }

        if self.session.server_reachable {
            println!("You left the chat.");
            ui::main_menu();
            Ok(Flow::Continue)
        } else {
            println!("The server is offline, so the client will exit now.");
            self.store
                .log_activity(Activity::ClientLogout, &self.session.username)?;
            Ok(Flow::Exit)
        }
    }

    async fn logout(&mut self) -> Result<Flow, ClientError> {
        println!("Logging out...");
        if self.session.server_reachable {
            if let Err(e) = self.write_text(SERVER_CONN, protocol::LOGOUT).await {
                debug!(error = %e, "logout send failed, the server is likely gone");
            }
        } else {
            self.store
                .log_activity(Activity::ClientLogout, &self.session.username)?;
        }
        Ok(Flow::Exit)
    }

    /// Mark the transcript with `other` as displayed and render it.
    pub(crate) fn display_history(&mut self, other: &str) -> Result<(), ClientError> {
        let me = self.session.username.clone();
        // Displaying is what turns unread lines into read ones.
        self.store.read_pending(&me, other)?;
        let lines = self.store.chat_history(&me, other)?;

        let offline = self.session.route(other) == Some(Route::Relay);
        ui::render_history(other, &lines, offline);
        if self.session.mode == ChatMode::Group {
            ui::member_list(self.session.members());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn engine() -> (Engine, TempDir, TcpStream) {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path()).unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

        let server_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let server_addr = server_listener.local_addr().unwrap();
        let client_side = TcpStream::connect(server_addr).await.unwrap();
        let (server_side, _) = server_listener.accept().await.unwrap();

        let (_tx, lines) = mpsc::channel(4);
        let config = ClientConfig {
            listen_port: listener.local_addr().unwrap().port(),
            server_addr,
            data_dir: dir.path().to_path_buf(),
        };
        let engine = Engine::new(
            config,
            store,
            ClientSession::new("me"),
            client_side,
            listener,
            lines,
        );
        (engine, dir, server_side)
    }

    async fn fake_peer(engine: &mut Engine) -> ConnId {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let peer = TcpStream::connect(listener.local_addr().unwrap())
            .await
            .unwrap();
        let (_other, _) = listener.accept().await.unwrap();
        engine.add_conn(peer)
    }

    #[tokio::test]
    async fn peer_loss_flips_the_route_to_relay() {
        let (mut engine, _dir, _server) = engine().await;
        let id = fake_peer(&mut engine).await;
        engine.session.add_member("alice", Route::Direct(id)).unwrap();
        engine.session.mode = ChatMode::OneToOne;

        engine.peer_lost(id);

        assert_eq!(engine.session.route("alice"), Some(Route::Relay));
        assert!(engine.session.peer_unreachable);
        assert!(!engine.conns.contains_key(&id));
        // The session itself survives the loss.
        assert!(engine.session.in_chat());
    }

    #[tokio::test]
    async fn server_loss_with_a_live_chat_keeps_the_session() {
        let (mut engine, _dir, _server) = engine().await;
        let id = fake_peer(&mut engine).await;
        engine.session.add_member("alice", Route::Direct(id)).unwrap();
        engine.session.mode = ChatMode::OneToOne;

        let flow = engine.server_lost();

        assert!(matches!(flow, Flow::Continue));
        assert!(!engine.session.server_reachable);
        assert!(engine.session.in_chat());
    }

    #[tokio::test]
    async fn server_loss_without_a_chat_ends_the_client() {
        let (mut engine, dir, _server) = engine().await;

        let flow = engine.server_lost();

        assert!(matches!(flow, Flow::Exit));
        let activity = std::fs::read_to_string(dir.path().join("activity.txt")).unwrap();
        assert!(activity.contains("LOGOUT me (client)"));
    }

    #[tokio::test]
    async fn server_loss_with_relay_only_interlocutor_ends_the_client() {
        let (mut engine, _dir, _server) = engine().await;
        engine.session.add_member("alice", Route::Relay).unwrap();
        engine.session.mode = ChatMode::OneToOne;
        engine.session.peer_unreachable = true;

        assert!(matches!(engine.server_lost(), Flow::Exit));
    }

    #[tokio::test]
    async fn invite_is_auto_rejected_while_in_a_chat() {
        let (mut engine, _dir, _server) = engine().await;
        let existing = fake_peer(&mut engine).await;
        engine
            .session
            .add_member("alice", Route::Direct(existing))
            .unwrap();
        engine.session.mode = ChatMode::OneToOne;

        // An inviter connects and announces itself.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let inbound = TcpStream::connect(listener.local_addr().unwrap())
            .await
            .unwrap();
        let (mut inviter, _) = listener.accept().await.unwrap();
        let id = engine.add_conn(inbound);
        wire::send_text(&mut inviter, "carol").await.unwrap();

        // Busy sessions answer N without prompting the operator.
        let flow = engine.handle_invite(id).await.unwrap();
        assert!(matches!(flow, Flow::Continue));
        assert_eq!(wire::recv_text(&mut inviter).await.unwrap(), protocol::NO);
        assert!(!engine.session.is_member("carol"));
        assert_eq!(engine.session.mode, ChatMode::OneToOne);
    }

    #[tokio::test]
    async fn member_announcement_for_a_known_member_is_ignored() {
        let (mut engine, _dir, _server) = engine().await;
        let existing = fake_peer(&mut engine).await;
        engine
            .session
            .add_member("alice", Route::Direct(existing))
            .unwrap();
        engine.session.mode = ChatMode::OneToOne;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let inbound = TcpStream::connect(listener.local_addr().unwrap())
            .await
            .unwrap();
        let (mut announcer, _) = listener.accept().await.unwrap();
        let id = engine.add_conn(inbound);

        // "alice" is already linked over the existing socket.
        wire::send_text(&mut announcer, "alice").await.unwrap();
        engine.handle_new_member(id).await.unwrap();
        assert_eq!(engine.session.route("alice"), Some(Route::Direct(existing)));
        assert_eq!(engine.session.mode, ChatMode::OneToOne);

        // A genuinely new member joins and turns the chat into a group.
        wire::send_text(&mut announcer, "bob").await.unwrap();
        engine.handle_new_member(id).await.unwrap();
        assert_eq!(engine.session.route("bob"), Some(Route::Direct(id)));
        assert_eq!(engine.session.mode, ChatMode::Group);
    }

    #[tokio::test]
    async fn closing_the_chat_resets_state_and_drops_peer_sockets() {
        let (mut engine, _dir, _server) = engine().await;
        let id = fake_peer(&mut engine).await;
        engine.session.add_member("alice", Route::Direct(id)).unwrap();
        engine.session.mode = ChatMode::Group;

        let flow = engine.close_chat().unwrap();

        assert!(matches!(flow, Flow::Continue));
        assert!(!engine.session.in_chat());
        assert!(!engine.conns.contains_key(&id));
        // The server connection stays.
        assert!(engine.conns.contains_key(&SERVER_CONN));
    }
}
