//! File sharing over the chat's direct connections.
//!
//! The transfer rides the blob framing: a `SHARE`/`OKSHARE` handshake with
//! every recipient, the file as bounded chunks, then the `ENDSHARE`
//! terminator. Relay-routed members are skipped — transfers only run
//! between online peers.

use chrono::Utc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::warn;

use parley_shared::constants::SHARE_CHUNK_SIZE;
use parley_shared::protocol;

use crate::engine::Engine;
use crate::error::ClientError;
use crate::session::{ChatMode, ConnId, Route};
use crate::ui;

impl Engine {
    /// `share <name>` during a chat: stream `shared/<me>/<name>` to every
    /// directly connected member.
    pub(crate) async fn share_file(&mut self, name: &str) -> Result<(), ClientError> {
        let me = self.session.username.clone();

        if self.session.mode == ChatMode::OneToOne && self.session.peer_unreachable {
            println!("File sharing needs an online interlocutor.");
            return Ok(());
        }
        if name.contains('/') || name.contains("..") {
            println!("Invalid file name.");
            return Ok(());
        }

        let path = self.store.shared_dir(&me)?.join(name);
        if !path.is_file() {
            println!("The file to share does not exist: {}", path.display());
            return Ok(());
        }

        let direct: Vec<(String, ConnId)> = self
            .session
            .deliveries()
            .into_iter()
            .filter_map(|(member, route)| match route {
                Route::Direct(conn) => Some((member, conn)),
                Route::Relay => None,
            })
            .collect();
        if direct.is_empty() {
            println!("No online members to share with.");
            return Ok(());
        }

        // Handshake with every recipient before the first byte moves.
        let mut ready = Vec::new();
        for (member, conn) in direct {
            if self.write_text(conn, protocol::SHARE).await.is_err() {
                self.peer_lost(conn);
                continue;
            }
            match self.read_text(conn).await {
                Ok(token) if token == protocol::SHARE_ACK => ready.push((member, conn)),
                Ok(token) => {
                    warn!(member = %member, token = %token, "share handshake went wrong")
                }
                Err(_) => self.peer_lost(conn),
            }
        }
        if ready.is_empty() {
            println!("Nobody acknowledged the transfer.");
            return Ok(());
        }
        println!("Sending the file to {} member(s)...", ready.len());

        let mut file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not open the shared file");
                println!("Could not open the file.");
                return Ok(());
            }
        };

        let mut failed: Vec<ConnId> = Vec::new();
        let mut buf = vec![0u8; SHARE_CHUNK_SIZE];
        loop {
            let n = match file.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    warn!(error = %e, "read failed mid-transfer");
                    println!("Transfer aborted.");
                    return Ok(());
                }
            };
            for (_, conn) in &ready {
                if failed.contains(conn) {
                    continue;
                }
                if self.write_blob(*conn, &buf[..n]).await.is_err() {
                    failed.push(*conn);
                }
            }
        }

        for (_, conn) in &ready {
            if !failed.contains(conn) {
                let _ = self.write_text(*conn, protocol::SHARE_DONE).await;
            }
        }
        for conn in failed {
            self.peer_lost(conn);
        }
        println!("File sent.");
        Ok(())
    }

    /// Inbound `SHARE`: acknowledge and spool the chunks into this user's
    /// download directory.
    pub(crate) async fn receive_share(&mut self, id: ConnId) -> Result<(), ClientError> {
        if self.write_text(id, protocol::SHARE_ACK).await.is_err() {
            self.peer_lost(id);
            return Ok(());
        }

        let me = self.session.username.clone();
        let path = self.store.received_file(&me, Utc::now().timestamp())?;
        let mut file = match tokio::fs::File::create(&path).await {
            Ok(file) => file,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not create the download file");
                return Ok(());
            }
        };

        loop {
            match self.read_blob(id).await {
                Ok(chunk) if chunk == protocol::SHARE_DONE.as_bytes() => break,
                Ok(chunk) => {
                    if let Err(e) = file.write_all(&chunk).await {
                        warn!(error = %e, "write failed mid-transfer");
                        return Ok(());
                    }
                }
                Err(_) => {
                    self.peer_lost(id);
                    return Ok(());
                }
            }
        }

        println!("** New file received: {} **", path.display());
        ui::prompt(self.prompt_user());
        Ok(())
    }
}
