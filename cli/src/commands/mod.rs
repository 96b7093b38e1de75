//! CLI command definitions and dispatch.

mod run;
mod version;

use clap::{Parser, Subcommand};

/// Burrow: run a command inside a registry image, in a chroot sandbox.
#[derive(Parser)]
#[command(name = "burrow", version, about)]
pub struct Cli {
    /// Log progress at info level (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Command {
    /// Pull an image and run a command inside it
    Run(run::RunArgs),
    /// Show version information
    Version(version::VersionArgs),
}

/// Dispatch a parsed CLI and return the process exit code.
pub fn dispatch(cli: Cli) -> Result<i32, Box<dyn std::error::Error>> {
    match cli.command {
        Command::Run(args) => run::execute(args),
        Command::Version(args) => version::execute(args),
    }
}
