//! Server state shared across connections.

use std::sync::Arc;
use std::time::Duration;

use minisocks_config::{HandshakeRead, ServerConfig};
use minisocks_core::io::RelayOptions;

use crate::resolve::Resolver;

/// Read-only settings every session needs. Sessions share nothing mutable.
#[derive(Clone)]
pub struct ServerState {
    pub handshake_read: HandshakeRead,
    pub failure_replies: bool,
    pub connect_timeout: Option<Duration>,
    pub tcp_nodelay: bool,
    pub relay: RelayOptions,
    pub resolver: Arc<dyn Resolver>,
}

impl ServerState {
    pub fn from_config(config: &ServerConfig, resolver: Arc<dyn Resolver>) -> Self {
        Self {
            handshake_read: config.handshake_read,
            failure_replies: config.failure_replies,
            connect_timeout: config.connect_timeout(),
            tcp_nodelay: config.tcp_nodelay,
            relay: RelayOptions {
                buffer_size: config.relay_buffer_size,
                idle_timeout: config.tcp_idle_timeout(),
            },
            resolver,
        }
    }
}
