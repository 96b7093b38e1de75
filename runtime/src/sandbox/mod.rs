//! Sandboxed execution.
//!
//! The supervisor requests a PID namespace, forks once, and in the child
//! prepares the image root, chroots into it and execs the command. The
//! parent relays the child's stdout/stderr and returns its exit code.

mod host;
mod launcher;
pub mod relay;
mod supervisor;

pub use host::{HostOps, LinuxHost};
pub use launcher::{SandboxLauncher, SandboxRoot};
pub use relay::{relay, RelayEnd};
pub use supervisor::{ProcessSupervisor, EXIT_EXEC_FAILED, EXIT_PREPARE_FAILED, EXIT_SANDBOX_FAILED};
