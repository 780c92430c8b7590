//! CLI override definitions and application logic.

use clap::Parser;

use crate::Config;
use crate::types::HandshakeRead;

#[derive(Debug, Clone, Parser, Default)]
pub struct CliOverrides {
    /// Override listen address, e.g. 0.0.0.0:1080
    #[arg(short, long)]
    pub listen: Option<String>,
    /// Override maximum concurrent sessions (0 = unlimited)
    #[arg(long)]
    pub max_connections: Option<usize>,
    /// Override TCP listener backlog size
    #[arg(long)]
    pub connection_backlog: Option<u32>,
    /// Override relay buffer size per direction (bytes)
    #[arg(long)]
    pub relay_buffer_size: Option<usize>,
    /// Override session idle timeout in seconds (0 = never)
    #[arg(long)]
    pub tcp_idle_timeout_secs: Option<u64>,
    /// Override outbound connect timeout in seconds (0 = OS default)
    #[arg(long)]
    pub connect_timeout_secs: Option<u64>,
    /// Handshake read policy
    #[arg(long, value_enum)]
    pub handshake_read: Option<HandshakeRead>,
    /// Send SOCKS5 failure replies before closing
    #[arg(long)]
    pub failure_replies: Option<bool>,
    /// Override log level (trace/debug/info/warn/error)
    #[arg(long)]
    pub log_level: Option<String>,
}

pub fn apply_overrides(config: &mut Config, overrides: &CliOverrides) {
    if let Some(v) = &overrides.listen {
        config.server.listen = v.clone();
    }
    // 0 on the command line means "unset" for the optional limits.
    if let Some(v) = overrides.max_connections {
        config.server.max_connections = if v == 0 { None } else { Some(v) };
    }
    if let Some(v) = overrides.connection_backlog {
        config.server.connection_backlog = v;
    }
    if let Some(v) = overrides.relay_buffer_size {
        config.server.relay_buffer_size = v;
    }
    if let Some(v) = overrides.tcp_idle_timeout_secs {
        config.server.tcp_idle_timeout_secs = if v == 0 { None } else { Some(v) };
    }
    if let Some(v) = overrides.connect_timeout_secs {
        config.server.connect_timeout_secs = if v == 0 { None } else { Some(v) };
    }
    if let Some(v) = overrides.handshake_read {
        config.server.handshake_read = v;
    }
    if let Some(v) = overrides.failure_replies {
        config.server.failure_replies = v;
    }
    if let Some(v) = &overrides.log_level {
        config.logging.level = Some(v.clone());
    }
}
