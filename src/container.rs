//! The container handle: the record the executor operates on.
//!
//! Split from the source's single mutable object into an immutable identity (name, bundle path,
//! config, runtime dir) and a small bundle of execution state (pid, status, returncode, owned fds
//! and threads) the executor mutates under its own lock. `close()` is the one operation allowed to
//! run twice: it is idempotent, since teardown calls it unconditionally regardless of how far the
//! lifecycle got.

use crate::config::ContainerConfig;
use crate::rundir::Rundir;
use crate::sys::proc::compute_returncode;
use anyhow::Result;
use nix::sys::wait::{waitpid, WaitPidFlag};
use nix::unistd::Pid;
use std::os::unix::io::RawFd;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// `wait()`'s sentinel return code when the child was already reaped by someone else (the
/// executor's `SIGCHLD` handler, typically) before this handle's own `wait()` call could run.
pub const ALREADY_REAPED: i32 = 255;

/// Lifecycle status. Only the transitions named in the component design are legal; the executor
/// is responsible for enforcing that, not this type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    New,
    Created,
    Running,
    Stopped,
    Removed,
}

/// The container handle. Owns its `config` (mutable only through [`Container::disable_tty`]),
/// its runtime dir, and the fds/threads it accumulates over its lifetime.
pub struct Container {
    name: String,
    bundle_path: PathBuf,
    config: ContainerConfig,
    rundir: Rundir,

    pid: Option<i32>,
    tty_fd: Option<RawFd>,
    stdin: Option<RawFd>,
    stdout: Option<RawFd>,
    stderr: Option<RawFd>,
    status: Status,
    returncode: Option<i32>,

    close_fds: Vec<RawFd>,
    io_threads: Vec<JoinHandle<()>>,
    stop: Arc<AtomicBool>,

    closing: bool,
}

impl Container {
    pub fn new(name: impl Into<String>, bundle_path: PathBuf, config: ContainerConfig, rundir: Rundir) -> Self {
        Self {
            name: name.into(),
            bundle_path,
            config,
            rundir,
            pid: None,
            tty_fd: None,
            stdin: None,
            stdout: None,
            stderr: None,
            status: Status::New,
            returncode: None,
            close_fds: Vec::new(),
            io_threads: Vec::new(),
            stop: Arc::new(AtomicBool::new(false)),
            closing: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bundle_path(&self) -> &PathBuf {
        &self.bundle_path
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    pub fn rundir(&self) -> &Rundir {
        &self.rundir
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn set_status(&mut self, status: Status) {
        self.status = status;
    }

    pub fn pid(&self) -> Option<i32> {
        self.pid
    }

    pub fn set_pid(&mut self, pid: i32) {
        self.pid = Some(pid);
    }

    pub fn returncode(&self) -> Option<i32> {
        self.returncode
    }

    /// Sets the returncode, but only if unset: the first writer wins, matching the invariant that
    /// a container's returncode is assigned exactly once.
    pub fn set_returncode_once(&mut self, code: i32) {
        if self.returncode.is_none() {
            self.returncode = Some(code);
        }
    }

    pub fn tty_fd(&self) -> Option<RawFd> {
        self.tty_fd
    }

    pub fn set_tty_fd(&mut self, fd: RawFd) {
        self.tty_fd = Some(fd);
    }

    pub fn stdin(&self) -> Option<RawFd> {
        self.stdin
    }

    pub fn stdout(&self) -> Option<RawFd> {
        self.stdout
    }

    pub fn stderr(&self) -> Option<RawFd> {
        self.stderr
    }

    pub fn set_stdio(&mut self, stdin: RawFd, stdout: RawFd, stderr: RawFd) {
        self.stdin = Some(stdin);
        self.stdout = Some(stdout);
        self.stderr = Some(stderr);
    }

    /// Whether this container wants a TTY, read through `config.exec.terminal`.
    pub fn use_tty(&self) -> bool {
        self.config.exec().terminal()
    }

    /// Clears the TTY request, written back through `config.exec.terminal`. Called by the
    /// executor's TTY detection step when the host has no TTY to back the container's request.
    pub fn disable_tty(&mut self) {
        self.config.exec_mut().clear_terminal();
    }

    /// The stop flag I/O pumps spawned for this container observe on every `select` wakeup.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    /// Registers an fd this handle owns and must close exactly once, on `close()`.
    pub fn track_fd(&mut self, fd: RawFd) {
        self.close_fds.push(fd);
    }

    /// Registers a joinable I/O pump thread, joined on `close()`.
    pub fn track_thread(&mut self, handle: JoinHandle<()>) {
        self.io_threads.push(handle);
    }

    /// `waitpid`s this container's own pid, mapping `ECHILD` (already reaped, e.g. by the
    /// executor's `SIGCHLD` handler racing this call) to [`ALREADY_REAPED`] rather than an error.
    pub fn wait(&mut self, blocking: bool) -> Result<i32> {
        let pid = match self.pid {
            Some(p) => p,
            None => return Ok(self.returncode.unwrap_or(ALREADY_REAPED)),
        };
        let flags = if blocking {
            WaitPidFlag::empty()
        } else {
            WaitPidFlag::WNOHANG
        };
        match waitpid(Pid::from_raw(pid), Some(flags)) {
            Ok(status) => {
                if let Some(code) = compute_returncode(status) {
                    self.set_returncode_once(code);
                }
                Ok(self.returncode.unwrap_or(ALREADY_REAPED))
            }
            Err(nix::Error::Sys(nix::errno::Errno::ECHILD)) => {
                self.set_returncode_once(ALREADY_REAPED);
                Ok(ALREADY_REAPED)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Idempotent teardown: on the first call, sets the stop flag, best-effort reaps the child,
    /// joins every tracked I/O thread, and closes every tracked fd, each individually swallowing
    /// `OSError`-equivalent failures so that teardown itself never fails.
    pub fn close(&mut self) {
        if self.closing {
            return;
        }
        self.closing = true;

        let _ = self.wait(false);
        self.stop.store(true, Ordering::SeqCst);

        for handle in self.io_threads.drain(..) {
            let _ = handle.join();
        }

        for fd in self.close_fds.drain(..) {
            let _ = nix::unistd::close(fd);
        }

        self.status = Status::Removed;
    }
}

impl Drop for Container {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        ContainerConfigBuilder, DnsConfigBuilder, ExecConfigBuilder, ImageConfigBuilder,
        UserConfigBuilder,
    };
    use std::sync::atomic::Ordering;

    fn config(terminal: bool) -> ContainerConfig {
        ContainerConfigBuilder::default()
            .name("demo")
            .image(
                ImageConfigBuilder::default()
                    .typ("oci")
                    .path("busybox")
                    .tag("latest")
                    .build()
                    .unwrap(),
            )
            .bundle_path("/tmp/bundle")
            .exec(
                ExecConfigBuilder::default()
                    .cmd("/bin/cat".to_string())
                    .terminal(terminal)
                    .build()
                    .unwrap(),
            )
            .user(UserConfigBuilder::default().uid(0u32).gid(0u32).build().unwrap())
            .dns(
                DnsConfigBuilder::default()
                    .hostname("demo")
                    .domain("darkwing.local")
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap()
    }

    fn rundir() -> Rundir {
        crate::rundir::make_rundir(
            &tempfile::tempdir().unwrap().into_path(),
            "ctx",
            &config(false),
            false,
        )
        .unwrap()
    }

    #[test]
    fn returncode_first_writer_wins() {
        let mut c = Container::new("demo", "/tmp/bundle".into(), config(false), rundir());
        c.set_returncode_once(0);
        c.set_returncode_once(17);
        assert_eq!(c.returncode(), Some(0));
    }

    #[test]
    fn disable_tty_only_touches_the_terminal_flag() {
        let mut c = Container::new("demo", "/tmp/bundle".into(), config(true), rundir());
        assert!(c.use_tty());
        c.disable_tty();
        assert!(!c.use_tty());
        assert_eq!(c.config().exec().cmd().as_deref(), Some("/bin/cat"));
    }

    #[test]
    fn close_is_idempotent_and_joins_threads_and_closes_fds() {
        let mut c = Container::new("demo", "/tmp/bundle".into(), config(false), rundir());
        let (r, w) = nix::unistd::pipe().unwrap();
        c.track_fd(r);
        c.track_fd(w);

        let stop = c.stop_flag();
        let handle = std::thread::spawn(move || {
            while !stop.load(Ordering::SeqCst) {
                std::thread::sleep(std::time::Duration::from_millis(5));
            }
        });
        c.track_thread(handle);

        c.close();
        c.close(); // second call is a no-op, must not panic or double-close

        assert!(nix::unistd::close(r).is_err());
        assert!(nix::unistd::close(w).is_err());
    }
}
