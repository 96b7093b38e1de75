//! `burrow run` command: pull, chroot, exec.

use std::path::PathBuf;

use burrow_core::config::EngineConfig;
use burrow_runtime::{ImageAssembler, ImageReference, LinuxHost, ProcessSupervisor, SandboxLauncher};
use clap::Args;

#[derive(Args)]
pub struct RunArgs {
    /// Image reference (e.g., "alpine", "library/ubuntu"); always resolves to `latest`
    pub image: String,

    /// Absolute path of the command inside the image
    pub command: String,

    /// Arguments passed to the command
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,

    /// Registry API base URL (overrides BURROW_REGISTRY_URL)
    #[arg(long)]
    pub registry_url: Option<String>,

    /// Token endpoint URL (overrides BURROW_AUTH_URL)
    #[arg(long)]
    pub auth_url: Option<String>,

    /// Directory in which the sandbox root is created (overrides BURROW_TMPDIR)
    #[arg(long)]
    pub tmpdir: Option<PathBuf>,
}

impl RunArgs {
    fn engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig::from_env();
        if let Some(ref url) = self.registry_url {
            config.registry.registry_url = url.clone();
        }
        if let Some(ref url) = self.auth_url {
            config.registry.auth_url = url.clone();
        }
        if let Some(ref dir) = self.tmpdir {
            config.sandbox.root_parent = dir.clone();
        }
        config
    }
}

pub fn execute(args: RunArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let image = ImageReference::parse(&args.image)?;
    let config = args.engine_config();

    tracing::debug!(config = ?config, "Engine configuration");

    let assembler = ImageAssembler::new(&config)?;
    let supervisor = ProcessSupervisor::new(SandboxLauncher::new(LinuxHost, config.sandbox));

    // The pull runs in the forked child, after its output is redirected
    let code = supervisor.run(&args.command, &args.args, |launcher| {
        launcher.prepare_root_blocking(&assembler, &image)
    })?;

    tracing::info!(image = %image, command = %args.command, code, "Sandboxed command finished");
    Ok(code)
}
