//! Configuration validation logic.

use std::net::SocketAddr;

use minisocks_core::defaults::{MAX_RELAY_BUFFER_SIZE, MIN_RELAY_BUFFER_SIZE};

use crate::Config;
use crate::loader::ConfigError;

const LOG_FORMATS: [&str; 3] = ["pretty", "compact", "json"];
const LOG_OUTPUTS: [&str; 2] = ["stderr", "stdout"];

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let server = &config.server;
    if server.listen.trim().is_empty() {
        return Err(ConfigError::Validation("server.listen is empty".into()));
    }
    if server.listen.parse::<SocketAddr>().is_err() {
        return Err(ConfigError::Validation(format!(
            "server.listen is not a socket address: {}",
            server.listen
        )));
    }
    if server.relay_buffer_size < MIN_RELAY_BUFFER_SIZE {
        return Err(ConfigError::Validation(format!(
            "server.relay_buffer_size must be >= {MIN_RELAY_BUFFER_SIZE}"
        )));
    }
    if server.relay_buffer_size > MAX_RELAY_BUFFER_SIZE {
        return Err(ConfigError::Validation(
            "server.relay_buffer_size must be <= 1MB".into(),
        ));
    }
    if server.connection_backlog == 0 {
        return Err(ConfigError::Validation(
            "server.connection_backlog must be > 0".into(),
        ));
    }
    if server.max_connections == Some(0) {
        return Err(ConfigError::Validation(
            "server.max_connections must be > 0 (omit for unlimited)".into(),
        ));
    }
    if server.tcp_idle_timeout_secs == Some(0) {
        return Err(ConfigError::Validation(
            "server.tcp_idle_timeout_secs must be > 0 (omit to disable)".into(),
        ));
    }
    if server.connect_timeout_secs == Some(0) {
        return Err(ConfigError::Validation(
            "server.connect_timeout_secs must be > 0 (omit for OS default)".into(),
        ));
    }
    if let Some(format) = config.logging.format.as_deref()
        && !LOG_FORMATS.contains(&format)
    {
        return Err(ConfigError::Validation(format!(
            "logging.format must be one of: {:?}",
            LOG_FORMATS
        )));
    }
    if let Some(output) = config.logging.output.as_deref()
        && !LOG_OUTPUTS.contains(&output)
    {
        return Err(ConfigError::Validation(format!(
            "logging.output must be one of: {:?}",
            LOG_OUTPUTS
        )));
    }
    Ok(())
}
