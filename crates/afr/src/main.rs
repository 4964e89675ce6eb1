//! afr CLI - live reload notifications for development.
//!
//! Provides commands for:
//! - `serve`: Start the broadcaster, optionally serving and watching files
//! - `send`: Post a message to a running server

mod commands;
mod error;
mod output;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{SendArgs, ServeArgs};
use error::CliError;
use output::Output;

/// afr - push reload signals to browser tabs.
#[derive(Parser)]
#[command(name = "afr", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the live reload server.
    Serve(ServeArgs),
    /// Send a message to a running server.
    Send(SendArgs),
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    // Check if verbose flag is set for serve command
    let verbose = matches!(&cli.command, Commands::Serve(args) if args.verbose);

    let rust_log = std::env::var("RUST_LOG").ok();
    let filter = env_filter(verbose, rust_log.as_deref());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let result = match cli.command {
        Commands::Serve(args) => tokio::runtime::Runtime::new()
            .map_err(CliError::from)
            .and_then(|rt| rt.block_on(args.execute())),
        Commands::Send(args) => args.execute(),
    };

    if let Err(err) = result {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}

/// Log filter: `--verbose` forces INFO, otherwise `RUST_LOG`, otherwise WARN.
fn env_filter(verbose: bool, rust_log: Option<&str>) -> EnvFilter {
    match rust_log {
        _ if verbose => EnvFilter::new("info"),
        Some(directives) if !directives.is_empty() => EnvFilter::new(directives),
        _ => EnvFilter::new("warn"),
    }
}
