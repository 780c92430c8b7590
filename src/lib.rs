//! # minisocks
//!
//! A minimal SOCKS5 proxy: no-auth method, CONNECT command, IPv4 and domain
//! targets, raw bidirectional relay.
//!
//! ## Crates
//!
//! - [`minisocks_core`] - Defaults, error labels, relay engine
//! - [`minisocks_proto`] - SOCKS5 wire codec
//! - [`minisocks_config`] - Configuration loading and validation
//! - [`minisocks_server`] - Negotiation, sessions and acceptor

pub use minisocks_config as config;
pub use minisocks_core as core;
pub use minisocks_proto as proto;
pub use minisocks_server as server;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use minisocks_config::{Config, ServerConfig, load_config, validate_config};
    pub use minisocks_server::{
        BoundServer, CancellationToken, Resolver, ServerError, SystemResolver, run,
        run_with_shutdown,
    };
}
