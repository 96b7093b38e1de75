//! Burrow Core - Foundational Types
//!
//! Error taxonomy and configuration shared by the image pipeline, the
//! sandbox and the CLI.

pub mod config;
pub mod error;

// Re-export commonly used types
pub use config::{EngineConfig, RegistryConfig, SandboxConfig};
pub use error::{BurrowError, Result};

/// Burrow version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
