//! Signal self-pipe: turns asynchronous signal delivery into readable bytes on a single fd.
//!
//! The kernel has no "wakeup fd" primitive of its own here (that facility belongs to runtimes
//! that register one, e.g. Python's `signal.set_wakeup_fd`), so this reimplements the contract
//! directly: a non-blocking socketpair whose write end a signal handler writes the delivered
//! signal number into, one byte per signal, tolerating `EAGAIN` if the pipe is momentarily full.
//! The read end stays blocking; the main loop's only suspension point is a `read` on it.

use anyhow::{Context, Result};
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::sys::socket::{socketpair, AddressFamily, SockFlag, SockType};
use nix::unistd::{close, read};
use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicI32, Ordering};

/// Write end of the currently-installed self-pipe, consulted only by [`handler`]. `-1` means no
/// pipe is installed and the handler is a no-op; set by [`SelfPipe::install`], cleared by
/// [`SelfPipe::restore`].
static WAKEUP_FD: AtomicI32 = AtomicI32::new(-1);

extern "C" fn handler(signum: libc::c_int) {
    let fd = WAKEUP_FD.load(Ordering::Relaxed);
    if fd >= 0 {
        let byte = [signum as u8];
        // Async-signal-safe: a single write(2), errors (including a full pipe) ignored.
        unsafe {
            libc::write(fd, byte.as_ptr() as *const libc::c_void, 1);
        }
    }
}

/// One installed signal's previous disposition, restored on teardown.
struct Restore {
    signal: Signal,
    previous: SigAction,
}

/// The signal self-pipe plus the signal dispositions it installed. `read_fd` is what the main
/// loop blocks on; `escape` names the signals whose delivery should unwind the main loop instead
/// of being forwarded to a container.
pub struct SelfPipe {
    read_fd: RawFd,
    write_fd: RawFd,
    escape: Vec<Signal>,
    restores: Vec<Restore>,
}

impl SelfPipe {
    /// Installs the self-pipe and a common handler for every signal in `forward` (delivered to
    /// containers), `silent` (observed but never forwarded, e.g. `WINCH`/`CHLD`), and `escape`
    /// (breaks the main loop instead of being forwarded; see [`SelfPipe::is_escape`]).
    pub fn install(forward: &[Signal], silent: &[Signal], escape: &[Signal]) -> Result<Self> {
        let (read_fd, write_fd) = socketpair(
            AddressFamily::Unix,
            SockType::Stream,
            None,
            SockFlag::empty(),
        )
        .context("create signal self-pipe socketpair")?;

        fcntl(write_fd, FcntlArg::F_SETFL(OFlag::O_NONBLOCK))
            .context("set self-pipe write end non-blocking")?;

        WAKEUP_FD.store(write_fd, Ordering::SeqCst);

        let action = SigAction::new(
            SigHandler::Handler(handler),
            SaFlags::SA_RESTART,
            SigSet::empty(),
        );

        let mut restores = Vec::new();
        for &signal in forward.iter().chain(silent).chain(escape) {
            let previous = unsafe { sigaction(signal, &action) }
                .with_context(|| format!("install handler for {:?}", signal))?;
            restores.push(Restore { signal, previous });
        }

        Ok(Self {
            read_fd,
            write_fd,
            escape: escape.to_vec(),
            restores,
        })
    }

    pub fn read_fd(&self) -> RawFd {
        self.read_fd
    }

    /// True if `signum` is one of this pipe's escape-hatch signals.
    pub fn is_escape(&self, signum: u8) -> bool {
        self.escape.iter().any(|s| *s as u8 == signum)
    }

    /// Blocks until at least one signal byte is available, tolerating `EINTR`. Returns the
    /// signal numbers observed in this read (at most `buf`'s length, which the caller sizes to
    /// drain a reasonable burst in one call).
    pub fn recv(&self) -> Result<Vec<u8>> {
        let mut buf = [0u8; 64];
        loop {
            match read(self.read_fd, &mut buf) {
                Ok(0) => return Ok(Vec::new()),
                Ok(n) => return Ok(buf[..n].to_vec()),
                Err(nix::Error::Sys(nix::errno::Errno::EINTR)) => continue,
                Err(e) => return Err(e).context("read signal self-pipe"),
            }
        }
    }

    /// Restores every signal's prior disposition and closes both ends of the pipe, best-effort.
    /// Never raises: teardown must not fail on account of signal bookkeeping.
    pub fn restore(self) {
        for r in &self.restores {
            let _ = unsafe { sigaction(r.signal, &r.previous) };
        }
        WAKEUP_FD.store(-1, Ordering::SeqCst);
        let _ = close(self.read_fd);
        let _ = close(self.write_fd);
    }
}

/// The signals forwarded verbatim to every live container.
pub fn forwarded_signals() -> Vec<Signal> {
    vec![Signal::SIGINT, Signal::SIGHUP, Signal::SIGTERM, Signal::SIGQUIT]
}

/// Signals observed by the main loop but never forwarded to a container: `CHLD` triggers a reap,
/// `WINCH` triggers a size query and propagation.
pub fn silent_signals() -> Vec<Signal> {
    vec![Signal::SIGWINCH, Signal::SIGCHLD]
}

/// Escape-hatch signals: delivery unwinds the main loop into teardown instead of being forwarded,
/// so a stuck loop can always be broken from outside. `SIGABRT` only, per the specification's
/// explicit placement of it in the raising set rather than the forwarded set.
pub fn escape_signals() -> Vec<Signal> {
    vec![Signal::SIGABRT]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_and_restore_round_trip() {
        let pipe = SelfPipe::install(&forwarded_signals(), &silent_signals(), &escape_signals())
            .expect("install self-pipe");
        assert!(pipe.is_escape(Signal::SIGABRT as i32 as u8));
        assert!(!pipe.is_escape(Signal::SIGTERM as i32 as u8));
        pipe.restore();
    }

    #[test]
    fn recv_observes_a_forwarded_signal() {
        let pipe = SelfPipe::install(&forwarded_signals(), &silent_signals(), &escape_signals())
            .expect("install self-pipe");
        unsafe {
            libc::raise(Signal::SIGWINCH as i32);
        }
        let bytes = pipe.recv().expect("recv");
        assert_eq!(bytes, vec![Signal::SIGWINCH as i32 as u8]);
        pipe.restore();
    }
}
