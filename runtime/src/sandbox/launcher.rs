//! Sandbox root preparation and entry.
//!
//! Entry is `chdir(root)` followed by `chroot(root)`. There is no mount
//! namespace and no `pivot_root`, so a process that keeps root privileges
//! inside the sandbox can escape it.

use std::path::{Path, PathBuf};

use burrow_core::config::SandboxConfig;
use burrow_core::error::{BurrowError, Result};

use super::host::HostOps;
use crate::oci::{ImageAssembler, ImageReference};

/// A uniquely named directory that becomes a sandbox's filesystem root.
///
/// The directory outlives the run: nothing removes it afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxRoot(PathBuf);

impl SandboxRoot {
    /// Create a new empty root under `config.root_parent`.
    pub fn create(config: &SandboxConfig) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(&config.root_prefix)
            .tempdir_in(&config.root_parent)
            .map_err(|e| {
                BurrowError::Filesystem(format!(
                    "Failed to create sandbox root in {}: {}",
                    config.root_parent.display(),
                    e
                ))
            })?;

        Ok(Self(dir.keep()))
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl From<PathBuf> for SandboxRoot {
    fn from(path: PathBuf) -> Self {
        Self(path)
    }
}

/// Isolates the process, prepares the root and confines the process to it.
pub struct SandboxLauncher<H: HostOps> {
    host: H,
    config: SandboxConfig,
}

impl<H: HostOps> SandboxLauncher<H> {
    pub fn new(host: H, config: SandboxConfig) -> Self {
        Self { host, config }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Request a new PID namespace. Must run before the fork so that the
    /// child becomes PID 1 of the namespace.
    pub fn isolate_namespace(&self) -> Result<()> {
        self.host.unshare_pid_namespace()?;
        tracing::debug!("PID namespace requested for future children");
        Ok(())
    }

    /// Create a fresh root and populate it with `image`.
    pub async fn prepare_root(
        &self,
        assembler: &ImageAssembler,
        image: &ImageReference,
    ) -> Result<SandboxRoot> {
        let root = SandboxRoot::create(&self.config)?;
        tracing::info!(root = %root.path().display(), image = %image, "Preparing sandbox root");

        assembler.assemble(image, root.path()).await?;
        Ok(root)
    }

    /// Blocking variant of [`prepare_root`](Self::prepare_root).
    ///
    /// Builds a single-threaded runtime in the calling process, which makes
    /// it safe to use in a freshly forked child.
    pub fn prepare_root_blocking(
        &self,
        assembler: &ImageAssembler,
        image: &ImageReference,
    ) -> Result<SandboxRoot> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| BurrowError::Process(format!("Failed to start async runtime: {}", e)))?;

        runtime.block_on(self.prepare_root(assembler, image))
    }

    /// Change into `root` and make it the filesystem root.
    pub fn enter_sandbox(&self, root: &SandboxRoot) -> Result<()> {
        self.host.change_dir(root.path())?;
        self.host.change_root(root.path())?;

        tracing::debug!(root = %root.path().display(), "Entered sandbox root");
        Ok(())
    }
}
