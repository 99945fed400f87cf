//! Parley client binary: authenticate against the rendezvous server, then
//! hand the session to the event loop.

mod chat;
mod commands;
mod config;
mod engine;
mod error;
mod group;
mod session;
mod share;
mod ui;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use parley_shared::types::{valid_password, valid_username};
use parley_shared::{protocol, wire};
use parley_store::Store;

use crate::commands::AuthCommand;
use crate::config::ClientConfig;
use crate::engine::Engine;
use crate::session::ClientSession;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = ClientConfig::from_args(&args).map_err(|e| anyhow::anyhow!(e))?;

    // The data layout must exist before anything else runs.
    let store = Store::open(&config.data_dir)?;

    let server = TcpStream::connect(config.server_addr)
        .await
        .with_context(|| format!("could not reach the server at {}", config.server_addr))?;
    let listener = TcpListener::bind(("0.0.0.0", config.listen_port))
        .await
        .with_context(|| format!("could not listen on port {}", config.listen_port))?;

    println!("************ CONNECTED TO THE SERVER ************");

    let (tx, mut lines) = mpsc::channel::<String>(16);
    tokio::spawn(async move {
        let mut stdin = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = stdin.next_line().await {
            if tx.send(line).await.is_err() {
                break;
            }
        }
    });

    ui::auth_menu();
    let (username, server) = auth_loop(server, &mut lines, &config).await?;

    // Per-user download directory; required for the session to work.
    store.shared_dir(&username)?;

    let session = ClientSession::new(username);
    let engine = Engine::new(config, store, session, server, listener, lines);
    engine.run().await?;
    Ok(())
}

/// Run signup/login exchanges until one login succeeds.
async fn auth_loop(
    mut server: TcpStream,
    lines: &mut mpsc::Receiver<String>,
    config: &ClientConfig,
) -> anyhow::Result<(String, TcpStream)> {
    loop {
        ui::prompt(None);
        let Some(line) = lines.recv().await else {
            anyhow::bail!("stdin closed before login");
        };

        let Some(command) = commands::parse_auth(&line) else {
            if !line.trim().is_empty() {
                println!("Invalid command.");
                ui::auth_menu();
            }
            continue;
        };

        let (op, username, password) = match &command {
            AuthCommand::Signup { username, password } => (protocol::SIGNUP, username, password),
            AuthCommand::Login { username, password } => (protocol::LOGIN, username, password),
        };
        if !valid_username(username) {
            println!("Usernames are 1-30 letters, digits or underscores.");
            continue;
        }
        if !valid_password(password) {
            println!("Passwords are 1-60 characters, without surrounding spaces.");
            continue;
        }

        let exchange = async {
            wire::send_text(&mut server, op).await?;
            wire::send_text(&mut server, username).await?;
            wire::send_text(&mut server, password).await?;
            wire::send_u16(&mut server, config.listen_port).await?;
            wire::recv_text(&mut server).await
        };
        let reply = exchange
            .await
            .context("the server went away during authentication")?;

        match reply.as_str() {
            protocol::SIGNED_UP => {
                println!("Registered! Log in with 'in <username> <password>'.");
            }
            protocol::DUPLICATE_USERNAME => println!("That username is already taken."),
            protocol::UNKNOWN_USER => println!("No account with that username."),
            protocol::WRONG_PASSWORD => println!("Wrong password."),
            protocol::AUTHENTICATED => {
                println!("Logged in!");
                return Ok((username.clone(), server));
            }
            other => warn!(token = %other, "unexpected authentication reply"),
        }
    }
}
