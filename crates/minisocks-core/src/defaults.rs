//! Default configuration values.
//!
//! Centralized default constants for use across all crates.

// ============================================================================
// Listener Defaults
// ============================================================================

/// Default SOCKS5 listen address (all interfaces, standard port).
pub const DEFAULT_LISTEN: &str = "0.0.0.0:1080";
/// Default TCP listener backlog.
pub const DEFAULT_CONNECTION_BACKLOG: u32 = 1024;
/// Default graceful shutdown drain timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Buffer/Size Defaults
// ============================================================================

/// Default relay buffer size per direction.
pub const DEFAULT_RELAY_BUFFER_SIZE: usize = 1024;
/// Smallest accepted relay buffer size.
pub const MIN_RELAY_BUFFER_SIZE: usize = 512;
/// Largest accepted relay buffer size (1 MiB).
pub const MAX_RELAY_BUFFER_SIZE: usize = 1024 * 1024;
/// Bytes requested from the socket per handshake read.
pub const DEFAULT_HANDSHAKE_READ_SIZE: usize = 1024;

// ============================================================================
// Socket Defaults
// ============================================================================

/// Default TCP_NODELAY on outbound connections.
pub const DEFAULT_TCP_NO_DELAY: bool = true;

// ============================================================================
// Negotiation Defaults
// ============================================================================

/// Send standard SOCKS5 failure replies before closing.
pub const DEFAULT_FAILURE_REPLIES: bool = false;
