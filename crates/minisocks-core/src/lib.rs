//! Core types and I/O primitives shared across minisocks crates.
//!
//! This crate provides:
//! - Default configuration values
//! - Error kind labels for logging
//! - The bidirectional relay engine and stream adapters

pub mod defaults;
pub mod errors;
pub mod io;

// Re-export commonly used items at crate root
pub use defaults::*;
pub use errors::*;

/// Project name.
pub const PROJECT_NAME: &str = "minisocks";
/// Project version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
