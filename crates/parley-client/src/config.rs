//! Client configuration: positional arguments plus environment variables.
//!
//! The listen port is mandatory — every client must announce where its own
//! peer listener lives. The server address comes from the second argument
//! or `PARLEY_SERVER_ADDR`; the data directory from `PARLEY_DATA_DIR`.

use std::net::SocketAddr;
use std::path::PathBuf;

use parley_shared::constants::DEFAULT_SERVER_PORT;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Port this client listens on for direct peer connections.
    pub listen_port: u16,
    /// Address of the rendezvous server.
    pub server_addr: SocketAddr,
    /// Data directory shared with the server in a loopback deployment.
    pub data_dir: PathBuf,
}

impl ClientConfig {
    /// Build the configuration from `args` (without the program name).
    pub fn from_args(args: &[String]) -> Result<Self, String> {
        let port_arg = args
            .first()
            .ok_or("the listen port must be given as the first argument")?;
        let listen_port: u16 = port_arg
            .parse()
            .map_err(|_| format!("invalid listen port '{port_arg}'"))?;
        if listen_port < 1024 {
            return Err("the first 1024 ports are reserved".to_string());
        }

        let server_addr = match args.get(1) {
            Some(addr) => addr
                .parse()
                .map_err(|_| format!("invalid server address '{addr}'"))?,
            None => match std::env::var("PARLEY_SERVER_ADDR") {
                Ok(addr) => addr
                    .parse()
                    .map_err(|_| format!("invalid PARLEY_SERVER_ADDR '{addr}'"))?,
                Err(_) => SocketAddr::from(([127, 0, 0, 1], DEFAULT_SERVER_PORT)),
            },
        };

        let data_dir = std::env::var("PARLEY_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."));

        Ok(Self {
            listen_port,
            server_addr,
            data_dir,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn listen_port_is_mandatory_and_unprivileged() {
        assert!(ClientConfig::from_args(&[]).is_err());
        assert!(ClientConfig::from_args(&args(&["80"])).is_err());
        assert!(ClientConfig::from_args(&args(&["nope"])).is_err());

        let config = ClientConfig::from_args(&args(&["5001"])).unwrap();
        assert_eq!(config.listen_port, 5001);
        assert_eq!(config.server_addr.port(), DEFAULT_SERVER_PORT);
    }

    #[test]
    fn explicit_server_address_wins() {
        let config = ClientConfig::from_args(&args(&["5001", "127.0.0.1:9000"])).unwrap();
        assert_eq!(config.server_addr.port(), 9000);
    }
}
