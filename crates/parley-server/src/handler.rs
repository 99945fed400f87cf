//! Per-connection protocol handler.
//!
//! Each accepted connection runs in its own task and walks the state
//! machine `Unauthenticated → Authenticated → (closed)`. Commands are read
//! and answered strictly in order on the connection; a command's whole
//! response sequence is written under one writer lock so pushes from other
//! tasks (login broadcast, delivery notifications) can never land in the
//! middle of a multi-frame reply.
//!
//! Lock discipline: the state lock is never held across an await, and a
//! task never acquires it while holding a writer lock it obtained from the
//! directory — handles are cloned out under the state lock and locked only
//! after the guard is dropped.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use parley_shared::constants::PORT_INVALID;
use parley_shared::{protocol, wire, WireError};
use parley_store::{Activity, AuthOutcome, SignupOutcome};

use crate::state::{ClientHandle, SharedState};
use crate::ServerError;

/// Accept loop: one task per connection.
pub async fn run(listener: TcpListener, state: SharedState) -> std::io::Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        debug!(%peer, "client connected");
        tokio::spawn(serve_connection(state.clone(), stream, peer));
    }
}

/// Drive one client connection to completion.
pub async fn serve_connection(state: SharedState, stream: TcpStream, peer: SocketAddr) {
    let (mut reader, writer) = stream.into_split();
    let mut conn = Connection {
        state,
        writer: Arc::new(tokio::sync::Mutex::new(writer)),
        username: None,
        peer,
    };

    loop {
        let command = match wire::recv_text(&mut reader).await {
            Ok(c) => c,
            Err(WireError::Closed) => break,
            Err(e) => {
                warn!(peer = %conn.peer, error = %e, "receive failed, dropping connection");
                break;
            }
        };

        match conn.dispatch(&mut reader, &command).await {
            Ok(Flow::Continue) => {}
            Ok(Flow::Close) => break,
            Err(ServerError::Wire(WireError::Closed)) => break,
            Err(ServerError::Wire(e)) => {
                warn!(peer = %conn.peer, error = %e, "transport failed, dropping connection");
                break;
            }
            Err(ServerError::Store(e)) => {
                // The operation is abandoned; temp-then-rename replacement
                // means no partial state was left behind.
                warn!(peer = %conn.peer, error = %e, "store operation failed, command abandoned");
            }
        }
    }

    conn.disconnected();
}

enum Flow {
    Continue,
    Close,
}

struct Connection {
    state: SharedState,
    writer: ClientHandle,
    username: Option<String>,
    peer: SocketAddr,
}

impl Connection {
    async fn dispatch(
        &mut self,
        reader: &mut OwnedReadHalf,
        command: &str,
    ) -> Result<Flow, ServerError> {
        if self.username.is_none() {
            match command {
                protocol::SIGNUP => self.signup(reader).await?,
                protocol::LOGIN => self.login(reader).await?,
                other => {
                    warn!(peer = %self.peer, token = %other, "command before authentication ignored");
                }
            }
            return Ok(Flow::Continue);
        }

        match command {
            protocol::SIGNUP => self.signup(reader).await?,
            protocol::LOGIN => self.login(reader).await?,
            protocol::LOGOUT => return Ok(Flow::Close),
            protocol::CHAT_REQUEST => self.chat_lookup(reader).await?,
            protocol::GROUP_CHECK => self.group_check(reader).await?,
            protocol::PORT_REQUEST => self.port_request(reader).await?,
            protocol::MEMBER_PORT_REQUEST => self.member_port_request(reader).await?,
            protocol::HANGING => self.hanging().await?,
            protocol::SHOW => self.show(reader).await?,
            protocol::OFFLINE_MESSAGE => self.offline_message(reader).await?,
            other => {
                warn!(peer = %self.peer, token = %other, "unknown command ignored");
            }
        }
        Ok(Flow::Continue)
    }

    /// `SGN` username password port → `OLDUSR` | `OKSGN`.
    async fn signup(&mut self, reader: &mut OwnedReadHalf) -> Result<(), ServerError> {
        let username = wire::recv_text(reader).await?;
        let password = wire::recv_text(reader).await?;
        let _listen_port = wire::recv_u16(reader).await?;

        let outcome = self.state.lock().store.register(&username, &password)?;
        let reply = match outcome {
            SignupOutcome::Created => {
                info!(user = %username, "account created");
                protocol::SIGNED_UP
            }
            SignupOutcome::DuplicateUsername => protocol::DUPLICATE_USERNAME,
        };

        let mut w = self.writer.lock().await;
        wire::send_text(&mut *w, reply).await?;
        Ok(())
    }

    /// `LGN` username password port → `UNKUSR` | `WRGPSW` | `AUTHOK`, then
    /// `NEWONL` + username + port to every other online client.
    async fn login(&mut self, reader: &mut OwnedReadHalf) -> Result<(), ServerError> {
        let username = wire::recv_text(reader).await?;
        let password = wire::recv_text(reader).await?;
        let listen_port = wire::recv_u16(reader).await?;

        let outcome = self.state.lock().store.authenticate(&username, &password)?;
        let reply = match outcome {
            AuthOutcome::UnknownUser => protocol::UNKNOWN_USER,
            AuthOutcome::WrongPassword => protocol::WRONG_PASSWORD,
            AuthOutcome::Accepted => protocol::AUTHENTICATED,
        };

        if !matches!(outcome, AuthOutcome::Accepted) {
            let mut w = self.writer.lock().await;
            wire::send_text(&mut *w, reply).await?;
            return Ok(());
        }

        let others = {
            let mut st = self.state.lock();
            let others =
                st.directory
                    .upsert_online(&username, self.writer.clone(), listen_port);
            if let Err(e) = st.store.log_activity(Activity::Login, &username) {
                warn!(error = %e, "could not record login activity");
            }
            others
        };
        self.username = Some(username.clone());
        info!(user = %username, port = listen_port, "login");

        {
            let mut w = self.writer.lock().await;
            wire::send_text(&mut *w, reply).await?;
        }

        // Tell everyone else. A failed push only affects that one peer.
        for (name, handle) in others {
            let mut w = handle.lock().await;
            let sent = async {
                wire::send_text(&mut *w, protocol::NOW_ONLINE).await?;
                wire::send_text(&mut *w, &username).await?;
                wire::send_u16(&mut *w, listen_port).await
            }
            .await;
            if let Err(e) = sent {
                debug!(peer = %name, error = %e, "now-online broadcast failed");
            }
        }
        Ok(())
    }

    /// `CHT` target → `OFF`, or `ON` + port. The status frame is retried
    /// up to 3 times; afterwards any delivery notices owed to the caller
    /// are flushed as `SENT` + recipient.
    async fn chat_lookup(&mut self, reader: &mut OwnedReadHalf) -> Result<(), ServerError> {
        let me = self.authed();
        let target = wire::recv_text(reader).await?;
        let port = self.state.lock().directory.lookup_port(&target);

        {
            let mut w = self.writer.lock().await;
            match port {
                Some(p) => {
                    send_status(&mut w, protocol::USER_ONLINE).await?;
                    wire::send_u16(&mut *w, p).await?;
                }
                None => send_status(&mut w, protocol::USER_OFFLINE).await?,
            }
        }

        let owed = self.state.lock().store.drain_notices_for(&me)?;
        if !owed.is_empty() {
            let mut w = self.writer.lock().await;
            for recipient in owed {
                wire::send_text(&mut *w, protocol::MESSAGES_SENT).await?;
                wire::send_text(&mut *w, &recipient).await?;
            }
        }
        Ok(())
    }

    /// `GRPCHAT`: candidate names until `GRPDONE`, answered `ON`/`OFF`.
    ///
    /// The writer stays locked for the whole loop so concurrent pushes
    /// queue up behind the last reply instead of interleaving with it.
    async fn group_check(&mut self, reader: &mut OwnedReadHalf) -> Result<(), ServerError> {
        let mut w = self.writer.lock().await;
        loop {
            let name = wire::recv_text(reader).await?;
            if name == protocol::GROUP_CHECK_DONE {
                return Ok(());
            }
            let online = self.state.lock().directory.is_online(&name);
            let reply = if online {
                protocol::USER_ONLINE
            } else {
                protocol::USER_OFFLINE
            };
            wire::send_text(&mut *w, reply).await?;
        }
    }

    /// `PRTREQ` target → `OFF`, or `ON` + port.
    async fn port_request(&mut self, reader: &mut OwnedReadHalf) -> Result<(), ServerError> {
        let target = wire::recv_text(reader).await?;
        let port = self.state.lock().directory.lookup_port(&target);

        let mut w = self.writer.lock().await;
        match port {
            Some(p) => {
                wire::send_text(&mut *w, protocol::USER_ONLINE).await?;
                wire::send_u16(&mut *w, p).await?;
            }
            None => wire::send_text(&mut *w, protocol::USER_OFFLINE).await?,
        }
        Ok(())
    }

    /// `GRPPRTREQ` member → bare port frame, `PORT_INVALID` if unreachable.
    async fn member_port_request(
        &mut self,
        reader: &mut OwnedReadHalf,
    ) -> Result<(), ServerError> {
        let member = wire::recv_text(reader).await?;
        let port = self
            .state
            .lock()
            .directory
            .lookup_port(&member)
            .unwrap_or(PORT_INVALID);

        let mut w = self.writer.lock().await;
        wire::send_u16(&mut *w, port).await?;
        Ok(())
    }

    /// `HNG` → (sender, count, last-timestamp) triples, then `ENDHNG`.
    /// Draining resets the caller's pending counts.
    async fn hanging(&mut self) -> Result<(), ServerError> {
        let me = self.authed();
        let pending = self.state.lock().store.drain_pending(&me)?;

        let mut w = self.writer.lock().await;
        for summary in pending {
            wire::send_text(&mut *w, &summary.sender).await?;
            wire::send_text(&mut *w, &summary.count.to_string()).await?;
            wire::send_text(&mut *w, &summary.last_ts.to_string()).await?;
        }
        wire::send_text(&mut *w, protocol::HANGING_DONE).await?;
        Ok(())
    }

    /// `SHW` sender → newly-read lines, then `ENDSHW`; if anything was
    /// delivered, the original sender gets (or is queued) a notification.
    async fn show(&mut self, reader: &mut OwnedReadHalf) -> Result<(), ServerError> {
        let me = self.authed();
        let sender = wire::recv_text(reader).await?;

        let delivered = self.state.lock().store.read_pending(&me, &sender)?;
        {
            let mut w = self.writer.lock().await;
            for line in &delivered {
                wire::send_text(&mut *w, line).await?;
            }
            wire::send_text(&mut *w, protocol::SHOW_DONE).await?;
        }

        if !delivered.is_empty() {
            self.notify_delivery(&sender, &me).await?;
        }
        Ok(())
    }

    /// `NEWMSG` recipient body → record offline, reply `OKMSG`.
    async fn offline_message(&mut self, reader: &mut OwnedReadHalf) -> Result<(), ServerError> {
        let me = self.authed();
        let recipient = wire::recv_text(reader).await?;
        let body = wire::recv_text(reader).await?;

        self.state
            .lock()
            .store
            .record_offline(&me, &recipient, &body)?;

        let mut w = self.writer.lock().await;
        wire::send_text(&mut *w, protocol::MESSAGE_LOGGED).await?;
        Ok(())
    }

    /// Deliver "your stored messages were read by `recipient`" to `sender`,
    /// immediately when online, queued otherwise.
    async fn notify_delivery(&self, sender: &str, recipient: &str) -> Result<(), ServerError> {
        let handle = self.state.lock().directory.lookup_handle(sender);
        match handle {
            Some(handle) => {
                let mut w = handle.lock().await;
                let sent = async {
                    wire::send_text(&mut *w, protocol::MESSAGES_SENT).await?;
                    wire::send_text(&mut *w, recipient).await
                }
                .await;
                if let Err(e) = sent {
                    debug!(user = %sender, error = %e, "delivery notification push failed");
                }
            }
            None => self.state.lock().store.queue_notice(sender, recipient)?,
        }
        Ok(())
    }

    /// The authenticated username. Dispatch gates every caller, so the
    /// fallback is unreachable in practice.
    fn authed(&self) -> String {
        self.username.clone().unwrap_or_default()
    }

    /// Handle the end of the connection, however it came about: stamp the
    /// logout and release the directory entry — but only if the entry
    /// still belongs to this connection (the user may have logged in again
    /// from elsewhere).
    fn disconnected(&self) {
        let Some(user) = self.username.as_deref() else {
            debug!(peer = %self.peer, "unauthenticated client disconnected");
            return;
        };

        let mut st = self.state.lock();
        let is_ours = st
            .directory
            .lookup_handle(user)
            .is_some_and(|h| Arc::ptr_eq(&h, &self.writer));
        if is_ours {
            st.directory.mark_offline(user);
            if let Err(e) = st.store.log_activity(Activity::Logout, user) {
                warn!(error = %e, "could not record logout activity");
            }
            info!(user = %user, "logout");
        }
    }
}

/// Send a status token, retrying transient transport failures up to 3
/// times. Only the `CHT` status reply gets this treatment.
async fn send_status(w: &mut OwnedWriteHalf, token: &str) -> Result<(), WireError> {
    let mut last = None;
    for attempt in 1..=3 {
        match wire::send_text(w, token).await {
            Ok(()) => return Ok(()),
            Err(WireError::Io(e)) => {
                debug!(attempt, error = %e, "status send failed");
                last = Some(e);
            }
            Err(e) => return Err(e),
        }
    }
    Err(WireError::Io(last.unwrap_or_else(|| {
        std::io::Error::other("status send failed")
    })))
}
