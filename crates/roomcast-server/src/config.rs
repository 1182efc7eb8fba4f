//! Server configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the roomcast server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Maximum concurrent `WebSocket` connections.
    pub max_connections: usize,
    /// Capacity of each session's outbound frame queue.
    pub outbound_queue: usize,
    /// Seconds between server pings.
    pub ping_interval_secs: u64,
    /// Close a connection after this many seconds without any inbound frame.
    pub pong_timeout_secs: u64,
    /// Max `WebSocket` message size in bytes.
    pub max_message_size: usize,
}

impl ServerConfig {
    /// `host:port` bind address.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Ping interval as a `Duration`.
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    /// Pong timeout as a `Duration`.
    pub fn pong_timeout(&self) -> Duration {
        Duration::from_secs(self.pong_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            max_connections: 1024,
            outbound_queue: 1024,
            ping_interval_secs: 30,
            pong_timeout_secs: 90,
            max_message_size: 1024 * 1024, // 1 MB
        }
    }
}
