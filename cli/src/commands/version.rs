//! `burrow version` command.

use clap::Args;

#[derive(Args)]
pub struct VersionArgs;

pub fn execute(_args: VersionArgs) -> Result<i32, Box<dyn std::error::Error>> {
    println!("burrow version {}", burrow_core::VERSION);
    Ok(0)
}
