//! Process supervision for a single sandboxed run.
//!
//! ```text
//! PREPARE (pipes, PID namespace) → FORK ─┬─ child:  redirect → root → chroot → exec
//!                                        └─ parent: relay → REAP → exit code
//! ```

use std::ffi::CString;
use std::io::{self, Write};
use std::os::fd::{AsRawFd, OwnedFd};

use burrow_core::error::{BurrowError, Result};
use nix::errno::Errno;
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{dup2, execv, fork, pipe, ForkResult, Pid};

use super::host::HostOps;
use super::launcher::{SandboxLauncher, SandboxRoot};
use super::relay::relay;

/// Child exit status when the sandbox root could not be prepared.
pub const EXIT_PREPARE_FAILED: i32 = 125;

/// Child exit status when the sandbox could not be entered.
pub const EXIT_SANDBOX_FAILED: i32 = 126;

/// Child exit status when the command could not be executed.
pub const EXIT_EXEC_FAILED: i32 = 127;

/// Forks, confines and execs one command, relaying its output.
pub struct ProcessSupervisor<H: HostOps> {
    launcher: SandboxLauncher<H>,
}

impl<H: HostOps> ProcessSupervisor<H> {
    pub fn new(launcher: SandboxLauncher<H>) -> Self {
        Self { launcher }
    }

    pub fn launcher(&self) -> &SandboxLauncher<H> {
        &self.launcher
    }

    /// Run `command` with `args` inside a sandbox root produced by `prepare`,
    /// relaying to this process's stdout and stderr.
    ///
    /// `prepare` runs in the forked child after its output is redirected.
    pub fn run<F>(&self, command: &str, args: &[String], prepare: F) -> Result<i32>
    where
        F: FnOnce(&SandboxLauncher<H>) -> Result<SandboxRoot>,
    {
        self.run_with_output(command, args, prepare, &mut io::stdout(), &mut io::stderr())
    }

    /// Like [`run`](Self::run), relaying into the given sinks.
    pub fn run_with_output<F>(
        &self,
        command: &str,
        args: &[String],
        prepare: F,
        out: &mut dyn Write,
        err: &mut dyn Write,
    ) -> Result<i32>
    where
        F: FnOnce(&SandboxLauncher<H>) -> Result<SandboxRoot>,
    {
        // argv is built before the fork; the child only execs it
        let argv = build_argv(command, args)?;

        let (stdout_rx, stdout_tx) = pipe()
            .map_err(|e| BurrowError::Process(format!("Failed to create stdout pipe: {}", e)))?;
        let (stderr_rx, stderr_tx) = pipe()
            .map_err(|e| BurrowError::Process(format!("Failed to create stderr pipe: {}", e)))?;

        self.launcher.isolate_namespace()?;

        tracing::info!(command = %command, args = ?args, "Forking sandboxed process");

        // SAFETY: the child only redirects descriptors, prepares the root
        // and execs; it never returns into the caller.
        match unsafe { fork() }.map_err(|e| BurrowError::Process(format!("fork failed: {}", e)))? {
            ForkResult::Child => {
                drop(stdout_rx);
                drop(stderr_rx);
                let code = self.child(&argv, stdout_tx, stderr_tx, prepare);
                // SAFETY: terminate the forked child without running the
                // parent's atexit handlers or unwinding into its stack.
                unsafe { libc::_exit(code) }
            }
            ForkResult::Parent { child } => {
                drop(stdout_tx);
                drop(stderr_tx);
                tracing::debug!(pid = child.as_raw(), "Child forked");

                if let Err(e) = relay(stdout_rx, stderr_rx, out, err) {
                    tracing::warn!(error = %e, "Output relay stopped with an error");
                }

                reap(child)
            }
        }
    }

    /// Child path; returns the exit status to use if exec does not happen.
    fn child<F>(&self, argv: &[CString], stdout_tx: OwnedFd, stderr_tx: OwnedFd, prepare: F) -> i32
    where
        F: FnOnce(&SandboxLauncher<H>) -> Result<SandboxRoot>,
    {
        if dup2(stdout_tx.as_raw_fd(), libc::STDOUT_FILENO).is_err()
            || dup2(stderr_tx.as_raw_fd(), libc::STDERR_FILENO).is_err()
        {
            return EXIT_SANDBOX_FAILED;
        }
        drop(stdout_tx);
        drop(stderr_tx);

        let root = match prepare(&self.launcher) {
            Ok(root) => root,
            Err(e) => {
                report(format_args!("failed to prepare sandbox root: {}", e));
                return EXIT_PREPARE_FAILED;
            }
        };

        if let Err(e) = self.launcher.enter_sandbox(&root) {
            report(format_args!("failed to enter sandbox {}: {}", root.path().display(), e));
            return EXIT_SANDBOX_FAILED;
        }

        let err = match execv(&argv[0], argv) {
            Ok(never) => match never {},
            Err(e) => e,
        };
        report(format_args!("exec {} failed: {}", argv[0].to_string_lossy(), err));
        EXIT_EXEC_FAILED
    }
}

/// Write a child-side diagnostic straight to fd 2 (the stderr pipe by now),
/// bypassing any in-process output capture.
fn report(message: std::fmt::Arguments<'_>) {
    let _ = writeln!(io::stderr(), "burrow: {}", message);
}

fn build_argv(command: &str, args: &[String]) -> Result<Vec<CString>> {
    std::iter::once(command)
        .chain(args.iter().map(String::as_str))
        .map(|arg| {
            CString::new(arg).map_err(|_| {
                BurrowError::Config(format!("Argument contains a NUL byte: {:?}", arg))
            })
        })
        .collect()
}

/// Wait for `child` and translate its status into an exit code.
///
/// A child killed by a signal maps to 0, not to a failure code.
fn reap(child: Pid) -> Result<i32> {
    loop {
        match waitpid(child, None) {
            Ok(WaitStatus::Exited(_, code)) => {
                tracing::debug!(pid = child.as_raw(), code, "Child exited");
                return Ok(code);
            }
            Ok(WaitStatus::Signaled(_, signal, _)) => {
                tracing::warn!(
                    pid = child.as_raw(),
                    signal = ?signal,
                    "Child terminated by signal; reporting exit code 0"
                );
                return Ok(0);
            }
            Ok(status) => {
                tracing::debug!(status = ?status, "Ignoring non-terminal wait status");
            }
            Err(Errno::EINTR) => {}
            Err(e) => {
                return Err(BurrowError::Process(format!(
                    "waitpid({}) failed: {}",
                    child, e
                )))
            }
        }
    }
}
