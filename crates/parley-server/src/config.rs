//! Server configuration loaded from environment variables.
//!
//! All settings have defaults so the server starts with zero configuration
//! for local development.

use std::net::SocketAddr;
use std::path::PathBuf;

use parley_shared::constants::DEFAULT_SERVER_PORT;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address to listen on.
    /// Env: `PARLEY_LISTEN_ADDR`
    /// Default: `127.0.0.1:4242`
    pub listen_addr: SocketAddr,

    /// Data directory holding the credential file, ledgers and chat logs.
    /// Clients of a loopback deployment point at the same directory.
    /// Env: `PARLEY_DATA_DIR`
    /// Default: `.`
    pub data_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], DEFAULT_SERVER_PORT)),
            data_dir: PathBuf::from("."),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("PARLEY_LISTEN_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.listen_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "invalid PARLEY_LISTEN_ADDR, using default");
            }
        }

        if let Ok(dir) = std::env::var("PARLEY_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter.

        config
    }
}
