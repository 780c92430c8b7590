//! Unified minisocks CLI.
//!
//! - `minisocks serve` - run the SOCKS5 proxy
//! - `minisocks check` - validate a config and print the effective settings
//!
//! The server is also available as the standalone `minisocks-server` binary.

use std::process::ExitCode;

use clap::{Parser, Subcommand};

/// minisocks unified CLI.
#[derive(Parser)]
#[command(
    name = "minisocks",
    version,
    about = "Minimal SOCKS5 CONNECT proxy",
    propagate_version = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the proxy server.
    #[command(name = "serve", alias = "server")]
    Serve(Box<minisocks_server::ServerArgs>),

    /// Validate configuration and print the effective settings.
    #[command(name = "check")]
    Check(Box<minisocks_server::ServerArgs>),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve(args) => minisocks_server::cli::run(*args).await,
        Commands::Check(args) => minisocks_server::cli::check(&args).map(|effective| {
            print!("{effective}");
        }),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
