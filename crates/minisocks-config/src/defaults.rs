//! Default value functions for serde deserialization.
//!
//! These functions forward to constants defined in `minisocks_core::defaults`.

use minisocks_core::defaults;

/// Generate default value functions that forward to minisocks_core::defaults constants.
macro_rules! default_fns {
    // For Copy types (integers, bool, etc.)
    ($($fn_name:ident => $const_name:ident : $ty:ty),* $(,)?) => {
        $(
            pub(crate) fn $fn_name() -> $ty {
                defaults::$const_name
            }
        )*
    };
}

/// Generate default value functions that return String from &str constants.
macro_rules! default_string_fns {
    ($($fn_name:ident => $const_name:ident),* $(,)?) => {
        $(
            pub(crate) fn $fn_name() -> String {
                defaults::$const_name.to_string()
            }
        )*
    };
}

default_fns! {
    default_relay_buffer_size     => DEFAULT_RELAY_BUFFER_SIZE: usize,
    default_connection_backlog    => DEFAULT_CONNECTION_BACKLOG: u32,
    default_shutdown_timeout_secs => DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64,
    default_tcp_no_delay          => DEFAULT_TCP_NO_DELAY: bool,
    default_failure_replies       => DEFAULT_FAILURE_REPLIES: bool,
}

default_string_fns! {
    default_listen => DEFAULT_LISTEN,
}
