//! One-to-one chat establishment and message routing.

use tokio::net::TcpStream;
use tracing::warn;

use parley_shared::types::ChatLine;
use parley_shared::protocol;

use crate::engine::{Engine, SERVER_CONN};
use crate::error::ClientError;
use crate::session::{ChatMode, ConnId, Route};
use crate::ui;

impl Engine {
    /// `chat <user>`: look the target up, connect directly when online,
    /// fall back to the server relay when not.
    pub(crate) async fn start_chat(&mut self, target: &str) -> Result<(), ClientError> {
        let me = self.session.username.clone();
        if target == me {
            println!("You cannot chat with yourself.");
            return Ok(());
        }
        if !self.store.has_contact(&me, target)? {
            println!("User not found in your contacts.");
            return Ok(());
        }

        println!("Opening the chat...");
        self.write_text(SERVER_CONN, protocol::CHAT_REQUEST).await?;
        self.write_text(SERVER_CONN, target).await?;

        let status = self.server_reply().await?;
        match status.as_str() {
            protocol::USER_OFFLINE => {
                self.session.add_member(target, Route::Relay)?;
                self.session.mode = ChatMode::OneToOne;
                self.session.peer_unreachable = true;
            }
            protocol::USER_ONLINE => {
                let port = self.read_u16(SERVER_CONN).await?;
                let stream = match TcpStream::connect((self.server_ip(), port)).await {
                    Ok(stream) => stream,
                    Err(e) => {
                        warn!(peer = %target, error = %e, "direct connection failed");
                        println!("Could not connect to '{target}'.");
                        return Ok(());
                    }
                };
                let id = self.add_conn(stream);
                self.session.add_member(target, Route::Direct(id))?;
                self.session.mode = ChatMode::OneToOne;
                self.session.peer_unreachable = false;
            }
            other => {
                warn!(token = %other, "unexpected status reply, chat not opened");
                return Ok(());
            }
        }

        self.display_history(target)?;
        Ok(())
    }

    /// Deliver a typed message to every member: direct frames for live
    /// routes, store-and-forward submissions for relay routes. Each direct
    /// delivery blocks for the logged acknowledgment so only one write to
    /// a given chat log is ever in flight.
    pub(crate) async fn send_chat_message(&mut self, msg: &str) -> Result<(), ClientError> {
        let me = self.session.username.clone();

        for (member, route) in self.session.deliveries() {
            match route {
                Route::Relay => {
                    if !self.session.server_reachable {
                        println!("Cannot deliver to '{member}': the server is offline.");
                        continue;
                    }
                    self.write_text(SERVER_CONN, protocol::OFFLINE_MESSAGE).await?;
                    self.write_text(SERVER_CONN, &member).await?;
                    self.write_text(SERVER_CONN, msg).await?;

                    let ack = self.server_reply().await?;
                    if ack != protocol::MESSAGE_LOGGED {
                        warn!(token = %ack, "unexpected acknowledgment for a stored message");
                        println!("The server did not confirm the message for '{member}'.");
                    }
                }
                Route::Direct(conn) => {
                    self.send_direct(conn, &me, msg, &member).await;
                }
            }
        }

        if let Some(first) = self.session.original_interlocutor().map(str::to_string) {
            self.display_history(&first)?;
        }
        Ok(())
    }

    /// One direct delivery: username frame, body frame, then wait for the
    /// acknowledgment. A message from the same peer crossing ours on the
    /// wire is absorbed and acknowledged in place; anything else garbled is
    /// reported but not fatal to the session.
    async fn send_direct(&mut self, conn: ConnId, me: &str, msg: &str, member: &str) {
        if self.write_text(conn, me).await.is_err() || self.write_text(conn, msg).await.is_err() {
            self.peer_lost(conn);
            return;
        }

        loop {
            match self.read_text(conn).await {
                Ok(token) if token == protocol::MESSAGE_LOGGED => return,
                Ok(token) if token == member => {
                    // Crossing send: log their message and ack it, then
                    // keep waiting for our own ack.
                    match self.read_text(conn).await {
                        Ok(body) => {
                            if let Err(e) = self
                                .store
                                .append_chat_line(me, &ChatLine::unread(member, &body))
                            {
                                warn!(error = %e, "could not log a crossing message");
                            }
                            let _ = self.write_text(conn, protocol::MESSAGE_LOGGED).await;
                            ui::new_message_notice(member);
                        }
                        Err(_) => {
                            self.peer_lost(conn);
                            return;
                        }
                    }
                }
                Ok(token) => {
                    warn!(token = %token, peer = %member, "garbled acknowledgment");
                    println!("No acknowledgment from '{member}'.");
                    return;
                }
                Err(_) => {
                    self.peer_lost(conn);
                    return;
                }
            }
        }
    }
}
