//! Burrow CLI entry point.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use burrow_cli::commands::{dispatch, Cli};

fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    let default_level = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match dispatch(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
