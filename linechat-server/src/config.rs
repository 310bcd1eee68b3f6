//! Server configuration
//!
//! The CLI surface is a single optional port argument; everything else is
//! compiled defaults. No configuration files, no environment knobs beyond
//! `LINECHAT_LOG` for the log filter.

use std::time::Duration;

use linechat_protocol::DEFAULT_PORT;
use linechat_utils::{ChatError, Result};

/// Runtime configuration for the chat server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// TCP port to listen on
    pub port: u16,
    /// How long a fresh connection may take to send its username. Reads
    /// after the handshake are unbounded; disconnects are detected via
    /// I/O errors.
    pub handshake_timeout: Duration,
    /// Capacity of each connection's outbound line buffer. A peer that
    /// falls this far behind is treated as a failed write and evicted.
    pub outbound_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            handshake_timeout: Duration::from_secs(30),
            outbound_buffer: 64,
        }
    }
}

impl ServerConfig {
    /// Build a config from CLI arguments (everything after the program
    /// name). Accepts one optional port argument; extra arguments are
    /// ignored.
    pub fn from_args<I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut config = Self::default();

        if let Some(arg) = args.into_iter().next() {
            config.port = arg
                .parse()
                .map_err(|_| ChatError::config(format!("invalid port '{}'", arg)))?;
        }

        Ok(config)
    }

    /// Address to bind the listener to
    pub fn bind_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.handshake_timeout, Duration::from_secs(30));
        assert!(config.outbound_buffer > 0);
    }

    #[test]
    fn test_from_args_empty() {
        let config = ServerConfig::from_args(Vec::new()).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn test_from_args_port() {
        let config = ServerConfig::from_args(vec!["9000".to_string()]).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.bind_addr(), "0.0.0.0:9000");
    }

    #[test]
    fn test_from_args_invalid_port() {
        let result = ServerConfig::from_args(vec!["not-a-port".to_string()]);
        assert!(matches!(result, Err(ChatError::Config(_))));
    }

    #[test]
    fn test_from_args_extra_ignored() {
        let config =
            ServerConfig::from_args(vec!["9000".to_string(), "whatever".to_string()]).unwrap();
        assert_eq!(config.port, 9000);
    }
}
