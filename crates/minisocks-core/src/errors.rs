//! Error kind labels for logging.
//!
//! These constants provide consistent session outcome classification across all crates.

/// Protocol violation during negotiation.
pub const ERROR_PROTOCOL: &str = "protocol";
/// Domain name resolution failed.
pub const ERROR_RESOLVE: &str = "resolve";
/// Outbound connection failed.
pub const ERROR_CONNECT: &str = "connect";
/// I/O error.
pub const ERROR_IO: &str = "io";
/// Peer closed before negotiation finished.
pub const ERROR_CLOSED: &str = "closed";
/// Configuration error.
pub const ERROR_CONFIG: &str = "config";
