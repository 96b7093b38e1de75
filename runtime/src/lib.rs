//! Burrow Runtime - image assembly and sandboxed execution.
//!
//! The `oci` module pulls an image from a Docker/OCI registry and unpacks
//! its layers into a directory. The `sandbox` module turns that directory
//! into the filesystem root of a forked, PID-namespaced child and relays
//! the child's output back to the caller.

#![allow(clippy::result_large_err)]

pub mod oci;
pub mod sandbox;

// Re-export common types
pub use oci::{AssembledImage, ImageAssembler, ImageReference, ManifestInfo, RegistryClient};
pub use oci::{LayerExtractor, PlatformManifestRef, PullStage, TarExtractor};
pub use sandbox::{HostOps, LinuxHost, ProcessSupervisor, SandboxLauncher, SandboxRoot};

/// Burrow Runtime version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
