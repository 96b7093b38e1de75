//! Child output relay.
//!
//! A single blocking `poll(2)` loop over the read ends of the stdout and
//! stderr pipes. Each round reads once from every ready descriptor and
//! forwards the bytes verbatim. The loop stops after the first round in
//! which either descriptor reaches end-of-stream or fails; anything the
//! other stream still holds, or writes later, is not relayed.

use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::{AsFd, OwnedFd};

use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};

const RELAY_BUF_SIZE: usize = 8192;

/// Which stream ended the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayEnd {
    Stdout,
    Stderr,
}

/// Forward child output to `out` and `err` until one stream closes.
///
/// # Errors
///
/// Returns an error if `poll` fails or a sink cannot be written.
pub fn relay(
    stdout_rx: OwnedFd,
    stderr_rx: OwnedFd,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> io::Result<RelayEnd> {
    let mut sources = [File::from(stdout_rx), File::from(stderr_rx)];
    let mut buf = [0u8; RELAY_BUF_SIZE];
    let readable = PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR | PollFlags::POLLNVAL;

    loop {
        let ready = {
            let mut fds = [
                PollFd::new(sources[0].as_fd(), PollFlags::POLLIN),
                PollFd::new(sources[1].as_fd(), PollFlags::POLLIN),
            ];
            match poll(&mut fds, PollTimeout::NONE) {
                Ok(_) => {}
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(io::Error::from(e)),
            }
            fds.map(|fd| fd.revents().is_some_and(|r| r.intersects(readable)))
        };

        let mut ended = None;
        for (index, source) in sources.iter_mut().enumerate() {
            if !ready[index] {
                continue;
            }

            let stream = if index == 0 { RelayEnd::Stdout } else { RelayEnd::Stderr };
            match source.read(&mut buf) {
                Ok(0) => {
                    ended.get_or_insert(stream);
                }
                Ok(n) => {
                    let sink: &mut dyn Write = if index == 0 { &mut *out } else { &mut *err };
                    sink.write_all(&buf[..n])?;
                    sink.flush()?;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    tracing::debug!(stream = ?stream, error = %e, "Relay read failed");
                    ended.get_or_insert(stream);
                }
            }
        }

        if let Some(stream) = ended {
            tracing::debug!(stream = ?stream, "Relay finished");
            return Ok(stream);
        }
    }
}
