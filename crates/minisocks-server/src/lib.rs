//! SOCKS5 CONNECT proxy server.
//!
//! This module exposes the server implementation for use by integration tests
//! and the unified `minisocks` CLI.

pub mod cli;
mod error;
mod handler;
mod negotiate;
mod resolve;
mod server;
mod state;
mod util;

pub use cli::ServerArgs;
pub use error::{ServerError, SessionError};
pub use handler::handle_conn;
pub use negotiate::{Negotiated, negotiate};
pub use resolve::{Resolver, SystemResolver, Target, resolve_target};
pub use server::{BoundServer, run, run_with_shutdown};
pub use state::ServerState;
pub use tokio_util::sync::CancellationToken;
