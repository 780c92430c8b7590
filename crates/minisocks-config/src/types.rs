//! Configuration type definitions.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::defaults::*;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// SOCKS5 listen address, e.g. "0.0.0.0:1080".
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Maximum concurrent sessions (None = unlimited).
    #[serde(default)]
    pub max_connections: Option<usize>,
    /// TCP listener backlog.
    #[serde(default = "default_connection_backlog")]
    pub connection_backlog: u32,
    /// Relay buffer size per direction (bytes).
    #[serde(default = "default_relay_buffer_size")]
    pub relay_buffer_size: usize,
    /// Close sessions with no traffic for this long (None = never).
    #[serde(default)]
    pub tcp_idle_timeout_secs: Option<u64>,
    /// Outbound connect timeout (None = OS default).
    #[serde(default)]
    pub connect_timeout_secs: Option<u64>,
    /// How handshake messages are read off the client socket.
    #[serde(default)]
    pub handshake_read: HandshakeRead,
    /// Answer negotiation failures with a SOCKS5 REP code before closing.
    #[serde(default = "default_failure_replies")]
    pub failure_replies: bool,
    /// Set TCP_NODELAY on outbound connections.
    #[serde(default = "default_tcp_no_delay")]
    pub tcp_nodelay: bool,
    /// How long shutdown waits for active sessions to finish.
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            max_connections: None,
            connection_backlog: default_connection_backlog(),
            relay_buffer_size: default_relay_buffer_size(),
            tcp_idle_timeout_secs: None,
            connect_timeout_secs: None,
            handshake_read: HandshakeRead::default(),
            failure_replies: default_failure_replies(),
            tcp_nodelay: default_tcp_no_delay(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
        }
    }
}

impl ServerConfig {
    pub fn tcp_idle_timeout(&self) -> Option<Duration> {
        self.tcp_idle_timeout_secs.map(Duration::from_secs)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_secs.map(Duration::from_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// Handshake read policy.
///
/// `Single` expects each handshake message to be complete after at most one
/// read, like minimal servers do; a message split across TCP segments is
/// rejected. `Reassemble` keeps reading until the message is complete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum HandshakeRead {
    #[default]
    Single,
    Reassemble,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: Option<String>,
    /// Log format: json, pretty, or compact. Default: pretty.
    pub format: Option<String>,
    /// Output target: stdout or stderr. Default: stderr.
    pub output: Option<String>,
    /// Per-module log level filters (e.g., {"minisocks_server": "debug"}).
    #[serde(default)]
    pub filters: HashMap<String, String>,
}
