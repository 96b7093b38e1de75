//! Privileged host operations behind a trait.
//!
//! The sandbox only needs three kernel facilities: a new PID namespace,
//! a working-directory change and a filesystem-root change. Keeping them
//! behind `HostOps` lets the launcher run unprivileged in tests.

use std::path::Path;

use burrow_core::error::{BurrowError, Result};

/// OS capabilities used to isolate a sandboxed process.
pub trait HostOps {
    /// Put future children of the calling process in a new PID namespace.
    fn unshare_pid_namespace(&self) -> Result<()>;

    /// Change the working directory.
    fn change_dir(&self, path: &Path) -> Result<()>;

    /// Change the filesystem root of the calling process.
    fn change_root(&self, path: &Path) -> Result<()>;
}

/// Real Linux implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinuxHost;

#[cfg(target_os = "linux")]
impl HostOps for LinuxHost {
    fn unshare_pid_namespace(&self) -> Result<()> {
        use nix::sched::{unshare, CloneFlags};

        unshare(CloneFlags::CLONE_NEWPID)
            .map_err(|e| BurrowError::Process(format!("unshare(CLONE_NEWPID) failed: {}", e)))
    }

    fn change_dir(&self, path: &Path) -> Result<()> {
        nix::unistd::chdir(path).map_err(|e| {
            BurrowError::Filesystem(format!("chdir to {} failed: {}", path.display(), e))
        })
    }

    fn change_root(&self, path: &Path) -> Result<()> {
        nix::unistd::chroot(path).map_err(|e| {
            BurrowError::Filesystem(format!("chroot to {} failed: {}", path.display(), e))
        })
    }
}

/// Stub for non-Linux platforms (development only).
#[cfg(not(target_os = "linux"))]
impl HostOps for LinuxHost {
    fn unshare_pid_namespace(&self) -> Result<()> {
        Err(BurrowError::Process(
            "PID namespaces are only available on Linux".to_string(),
        ))
    }

    fn change_dir(&self, path: &Path) -> Result<()> {
        std::env::set_current_dir(path).map_err(|e| {
            BurrowError::Filesystem(format!("chdir to {} failed: {}", path.display(), e))
        })
    }

    fn change_root(&self, path: &Path) -> Result<()> {
        Err(BurrowError::Filesystem(format!(
            "chroot to {} is only supported on Linux",
            path.display()
        )))
    }
}
