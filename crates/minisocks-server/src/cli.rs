//! Command-line entry points for the server.
//!
//! Used by the standalone `minisocks-server` binary and by the `serve` and
//! `check` subcommands of the unified `minisocks` CLI.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use minisocks_config::{
    CliOverrides, Config, LoggingConfig, apply_overrides, load_config, validate_config,
};

use crate::{CancellationToken, SystemResolver, run_with_shutdown};

/// Server CLI arguments.
#[derive(Parser, Debug, Clone)]
#[command(name = "minisocks-server", version, about = "Minimal SOCKS5 CONNECT proxy")]
pub struct ServerArgs {
    /// Config file path (toml/json/jsonc/yaml). Built-in defaults when omitted.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: CliOverrides,
}

/// Load the config file (if any), then apply overrides and validate.
pub fn effective_config(args: &ServerArgs) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };
    apply_overrides(&mut config, &args.overrides);
    validate_config(&config)?;
    Ok(config)
}

/// Run the proxy until SIGINT/SIGTERM, then drain.
pub async fn run(args: ServerArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = effective_config(&args)?;

    init_tracing(&config.logging);
    info!(version = minisocks_core::VERSION, "starting {}", minisocks_core::PROJECT_NAME);

    let shutdown = CancellationToken::new();
    let shutdown_signal = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal_handler().await;
        shutdown_signal.cancel();
    });

    run_with_shutdown(&config.server, Arc::new(SystemResolver), shutdown).await?;
    Ok(())
}

/// Validate the configuration and print the effective settings as TOML.
pub fn check(args: &ServerArgs) -> Result<String, Box<dyn std::error::Error>> {
    let config = effective_config(args)?;
    Ok(toml::to_string_pretty(&config)?)
}

/// Wait for shutdown signals (SIGTERM, SIGINT).
async fn shutdown_signal_handler() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// Build the `EnvFilter` directive string: base level, then per-module filters.
fn filter_directives(config: &LoggingConfig) -> String {
    let mut directives = config.level.as_deref().unwrap_or("info").to_string();
    let mut modules: Vec<_> = config.filters.iter().collect();
    modules.sort();
    for (module, level) in modules {
        directives.push(',');
        directives.push_str(module);
        directives.push('=');
        directives.push_str(level);
    }
    directives
}

/// Initialize tracing subscriber with the given logging configuration.
///
/// - `level`: base log level (trace, debug, info, warn, error)
/// - `format`: json, pretty or compact. Default: pretty
/// - `output`: stdout or stderr. Default: stderr
/// - `filters`: per-module level overrides
fn init_tracing(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_new(filter_directives(config)).unwrap_or_else(|_| EnvFilter::new("info"));

    let format = config.format.as_deref().unwrap_or("pretty");
    let output = config.output.as_deref().unwrap_or("stderr");

    match (format, output) {
        ("json", "stdout") => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(io::stdout))
            .init(),
        ("json", _) => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(io::stderr))
            .init(),
        ("compact", "stdout") => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact().with_writer(io::stdout))
            .init(),
        ("compact", _) => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact().with_writer(io::stderr))
            .init(),
        (_, "stdout") => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(io::stdout))
            .init(),
        _ => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(io::stderr))
            .init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn filter_directives_sorted_modules() {
        let config = LoggingConfig {
            level: Some("warn".into()),
            filters: HashMap::from([
                ("minisocks_server".to_string(), "debug".to_string()),
                ("minisocks_core".to_string(), "trace".to_string()),
            ]),
            ..Default::default()
        };
        assert_eq!(
            filter_directives(&config),
            "warn,minisocks_core=trace,minisocks_server=debug"
        );
        assert_eq!(filter_directives(&LoggingConfig::default()), "info");
    }

    #[test]
    fn check_prints_effective_config() {
        let args = ServerArgs::parse_from([
            "minisocks-server",
            "--listen",
            "127.0.0.1:1090",
            "--handshake-read",
            "reassemble",
        ]);
        let out = check(&args).unwrap();
        assert!(out.contains("listen = \"127.0.0.1:1090\""));
        assert!(out.contains("handshake_read = \"reassemble\""));
    }

    #[test]
    fn check_rejects_invalid_overrides() {
        let args = ServerArgs::parse_from(["minisocks-server", "--relay-buffer-size", "8"]);
        assert!(check(&args).is_err());
    }
}
