//! Parley rendezvous server binary.

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use parley_server::config::ServerConfig;
use parley_server::handler;
use parley_server::state::SharedState;
use parley_store::Store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,parley_server=debug")),
        )
        .init();

    info!("Starting Parley server v{}", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // Failing to set up the data directory is the one startup error worth
    // dying for.
    let store = Store::open(&config.data_dir)?;
    let state = SharedState::new(store);

    let listener = TcpListener::bind(config.listen_addr).await?;
    info!(addr = %config.listen_addr, "listening");

    tokio::select! {
        result = handler::run(listener, state) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "accept loop failed");
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
