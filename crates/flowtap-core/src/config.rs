//! Relay configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default interface the listener binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default listener port
pub const DEFAULT_PORT: u16 = 8082;

/// Default deadline for a single client reply, in seconds
pub const DEFAULT_REPLY_TIMEOUT_SECS: u64 = 30;

/// Default maximum inbound WebSocket message size (1 GiB, large bodies pass
/// through the relay base64-encoded)
pub const DEFAULT_MAX_FRAME_BYTES: usize = 1024 * 1024 * 1024;

/// Configuration for an [`InterceptionRelay`](crate::InterceptionRelay)
///
/// The embedding proxy engine owns option loading; this struct is the whole
/// configuration surface the relay accepts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Interface to bind the WebSocket listener to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port for the WebSocket listener. Port 0 binds an ephemeral port,
    /// reported by `InterceptionRelay::local_addr` after startup.
    #[serde(default = "default_port")]
    pub port: u16,

    /// How long the pipeline waits for a client reply before abandoning the
    /// transaction and skipping that client
    #[serde(default = "default_reply_timeout_secs")]
    pub reply_timeout_secs: u64,

    /// Maximum size of a single inbound WebSocket message
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_reply_timeout_secs() -> u64 {
    DEFAULT_REPLY_TIMEOUT_SECS
}

fn default_max_frame_bytes() -> usize {
    DEFAULT_MAX_FRAME_BYTES
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            reply_timeout_secs: default_reply_timeout_secs(),
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

impl RelayConfig {
    /// Address string the listener binds to
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Reply deadline as a [`Duration`]
    pub fn reply_timeout(&self) -> Duration {
        Duration::from_secs(self.reply_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RelayConfig::default();
        assert_eq!(config.bind_addr(), "127.0.0.1:8082");
        assert_eq!(config.reply_timeout(), Duration::from_secs(30));
        assert_eq!(config.max_frame_bytes, 1024 * 1024 * 1024);
    }

    #[test]
    fn test_partial_deserialization_fills_defaults() {
        let config: RelayConfig = serde_json::from_str(r#"{"port": 9000}"#).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.reply_timeout_secs, DEFAULT_REPLY_TIMEOUT_SECS);
    }
}
