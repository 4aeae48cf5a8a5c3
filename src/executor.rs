//! The event loop: the core of this crate.
//!
//! Orchestrates one container through `create` → `start` → run → teardown, acting as the I/O,
//! signal and lifecycle bridge between the host and the detached process the runtime leaves
//! behind. Single main thread drives signal handling and reaping; one worker thread per I/O
//! stream shuttles bytes; nothing here is async — every suspension point is a blocking `select`,
//! `recv`, `waitpid(WNOHANG)` or `join`.

use crate::config::Context;
use crate::container::{Container, Status};
use crate::error::DarkwingError;
use crate::io_pump::{pump, PumpConfig};
use crate::lock;
use crate::oci::overlay::{self, TtyPolicy};
use crate::oci::runtime::{GlobalArgs, Runtime};
use crate::signal::{self, SelfPipe};
use crate::sys::{subreaper, tty};
use anyhow::{anyhow, Context as _, Result};
use nix::poll::{poll, PollFd, PollFlags};
use nix::sys::signal::{kill, Signal};
use nix::sys::socket::{socketpair, AddressFamily, ControlMessageOwned, MsgFlags, SockFlag, SockType};
use nix::sys::uio::IoVec;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{close, dup, Pid};
use std::convert::TryFrom;
use std::os::unix::io::RawFd;
use std::os::unix::net::UnixListener;
use std::path::Path;
use std::process::Stdio;
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

/// How long the console-socket accept waits for the runtime to connect and hand over the PTY
/// master fd before giving up. The specification flags this as possibly too aggressive under
/// load; kept as one named constant so it is easy to retune.
const CONSOLE_ACCEPT_TIMEOUT: Duration = Duration::from_millis(200);

/// Select-loop polling interval for a TTY-backed container's I/O pumps: short, since a PTY user
/// expects low-latency echo.
const TTY_SELECT_TIMEOUT: Duration = Duration::from_millis(100);

/// Select-loop polling interval for pipe-backed I/O pumps.
const PIPE_SELECT_TIMEOUT: Duration = Duration::from_millis(200);

/// Three host-owned fds duped from the process's own stdin/stdout/stderr, plus whether teardown
/// should close each: the real stderr is never closed, an inherited stdout/stdin is closed unless
/// it is itself a TTY (in which case some other stream is almost certainly the controlling one and
/// closing it here would rip the terminal out from under the process).
struct HostStdio {
    stdin: RawFd,
    stdout: RawFd,
    stderr: RawFd,
    close_stdin: bool,
    close_stdout: bool,
}

impl HostStdio {
    fn capture() -> Result<Self> {
        let stdin = dup(0).context("dup host stdin")?;
        let stdout = dup(1).context("dup host stdout")?;
        let stderr = dup(2).context("dup host stderr")?;
        Ok(Self {
            stdin,
            stdout,
            stderr,
            close_stdin: !tty::is_tty(stdin),
            close_stdout: !tty::is_tty(stdout),
        })
    }

    /// The first of stdin/stdout/stderr that is a TTY, per the executor's TTY-detection step.
    fn tty_candidate(&self) -> Option<RawFd> {
        [self.stdin, self.stdout, self.stderr]
            .into_iter()
            .find(|fd| tty::is_tty(*fd))
    }

    fn close(self) {
        if self.close_stdin {
            let _ = close(self.stdin);
        }
        if self.close_stdout {
            let _ = close(self.stdout);
        }
        // self.stderr is never closed, per policy.
    }
}

/// Saved host terminal state the executor restores on teardown, set only when TTY-raw mode was
/// actually entered.
struct TtyState {
    control_fd: RawFd,
    saved: nix::sys::termios::Termios,
}

/// The event loop. Holds the runtime binary interface, the context a container's runtime dir and
/// state directory are rooted under, and the registry of live containers keyed by pid, guarded by
/// its own lock per the concurrency design (`_containers`, `_closing` in the specification).
pub struct Executor {
    runtime: Runtime,
    context: Context,
    registry: Mutex<Registry>,
}

/// Guards the executor's shutdown flag. The component design models a `pid -> Container` map
/// here too, for a future executor driving more than the one container this core specifies; with
/// exactly one container in flight, the single [`Container`] `run_until_complete` already holds
/// by unique reference is its own registry entry, so no map is needed yet.
#[derive(Default)]
struct Registry {
    closing: bool,
}

impl Executor {
    pub fn new(runtime: Runtime, context: Context) -> Self {
        Self {
            runtime,
            context,
            registry: Mutex::new(Registry::default()),
        }
    }

    fn state_root(&self, container: &Container) -> std::path::PathBuf {
        container.rundir().runtime_state_dir()
    }

    fn global_args(&self, container: &Container) -> Vec<GlobalArgs> {
        vec![GlobalArgs::Root(self.state_root(container))]
    }

    /// The full lifecycle: setup stdio and TTY, install the signal self-pipe, become a subreaper,
    /// create and start the container, run the signal loop until every container has exited,
    /// remove the container if requested, and always tear down. Never panics; any error is mapped
    /// to a process return code and logged.
    pub fn run_until_complete(&self, mut container: Container, remove: bool) -> i32 {
        let name = container.name().to_string();
        match self.run_lifecycle(&mut container, remove) {
            Ok(code) => code,
            Err(e) => {
                let code = e
                    .downcast_ref::<DarkwingError>()
                    .map(DarkwingError::exit_code)
                    .unwrap_or(1);
                eprintln!("Error for container \"{}\": {}", name, crate::error::chain(e));
                code
            }
        }
    }

    fn run_lifecycle(&self, container: &mut Container, remove: bool) -> Result<i32> {
        let host_stdio = HostStdio::capture()?;

        let host_tty = host_stdio.tty_candidate();
        if container.use_tty() && host_tty.is_none() {
            log::warn!(
                "container \"{}\" requested a TTY but the host has none; clearing the request",
                container.name()
            );
            container.disable_tty();
        }
        let tty_raw = container.use_tty()
            && host_tty.is_some()
            && tty::same_tty(host_stdio.stdout, host_stdio.stderr);

        let mut tty_state: Option<TtyState> = None;
        if tty_raw {
            if let Some(fd) = host_tty {
                let control = tty::open_control_fd(fd)?;
                let control_fd = std::os::unix::io::AsRawFd::as_raw_fd(&control);
                let saved = tty::set_raw(control_fd)?;
                std::mem::forget(control); // control_fd is kept alive for the lifetime of the run
                tty_state = Some(TtyState { control_fd, saved });
            }
        }

        let self_pipe = SelfPipe::install(
            &signal::forwarded_signals(),
            &signal::silent_signals(),
            &signal::escape_signals(),
        )?;

        subreaper::set_subreaper(true)?;

        let result = self.drive(container, &host_stdio, &self_pipe, remove);

        // Teardown, in order, regardless of how `drive` ended: subreaper off, signal handlers
        // restored, container handle closed (joins I/O threads, closes owned fds), TTY restored,
        // host stdio closed per policy.
        let _ = subreaper::set_subreaper(false);
        self_pipe.restore();
        container.close();
        if let Some(state) = tty_state {
            let _ = tty::restore(state.control_fd, &state.saved);
            let _ = close(state.control_fd);
        }
        host_stdio.close();

        result
    }

    fn drive(&self, container: &mut Container, host_stdio: &HostStdio, self_pipe: &SelfPipe, remove: bool) -> Result<i32> {
        self.create_container(container, host_stdio)?;
        self.start_io_pumps(container, host_stdio)?;

        if let Some(tty_fd) = container.tty_fd() {
            if let Some(host_tty) = host_stdio.tty_candidate() {
                if let Ok(size) = tty::get_size(host_tty) {
                    let _ = tty::resize(tty_fd, size.columns, size.rows);
                }
            }
        }

        self.start_container(container)?;
        self.process_signals(container, host_stdio, self_pipe)?;

        let code = container.returncode().unwrap_or(0);

        if remove {
            self.remove_container(container)?;
        }

        Ok(code)
    }

    /// Ensures the runtime dir and locks exist, overlays the spec, and invokes `create`. With a
    /// TTY, hands the runtime a console socket and adopts the PTY master fd it sends back over
    /// `SCM_RIGHTS`. Without one, gives the `create` subprocess three socketpair fds directly as
    /// its own stdio, keeping the parent sides as the container's streams.
    pub fn create_container(&self, container: &mut Container, host_stdio: &HostStdio) -> Result<()> {
        if self.registry.lock().unwrap().closing {
            return Err(DarkwingError::ShutdownRace(container.name().to_string()).into());
        }

        let rundir = container.rundir().clone();
        lock::acquire(&rundir.lockfile(), container.name())?;

        overlay::ensure_mounts(
            container.config().volumes(),
            Some(&rundir),
            Some((self.context.uid(), self.context.gid())),
        )?;

        let owner = if self.context.rootless() {
            Some((self.context.uid(), self.context.gid()))
        } else {
            None
        };
        let spec = overlay::apply_overlay(
            container.bundle_path(),
            container.config(),
            Some(&rundir),
            owner,
            TtyPolicy::default(),
        )?;
        let terminal = spec.process().as_ref().map(|p| p.terminal().unwrap_or(false)).unwrap_or(false);

        std::fs::create_dir_all(rundir.runtime_state_dir())
            .context("create runtime state directory")?;

        if terminal {
            self.create_with_pty(container, &rundir)?;
        } else {
            self.create_with_pipes(container, &rundir, host_stdio)?;
        }

        let state = self.runtime.state(&self.state_root(container), container.name())?;
        if !state.is_created() {
            return Err(DarkwingError::ChildProtocol {
                name: container.name().to_string(),
                reason: format!("expected status \"created\", got \"{}\"", state.status()),
            }
            .into());
        }

        container.set_pid(state.pid());
        container.set_status(Status::Created);

        Ok(())
    }

    fn create_with_pty(&self, container: &mut Container, rundir: &crate::rundir::Rundir) -> Result<()> {
        let sock_path = rundir.tty_sock();
        let _ = std::fs::remove_file(&sock_path);
        let listener = UnixListener::bind(&sock_path).context("bind console socket")?;
        listener.set_nonblocking(true).context("set console socket non-blocking")?;

        self.runtime.create_container(
            &self.state_root(container),
            container.name(),
            container.bundle_path(),
            &rundir.pidfile(),
            Some(&sock_path),
        )?;

        let stream = accept_with_timeout(&listener, CONSOLE_ACCEPT_TIMEOUT).ok_or_else(|| {
            DarkwingError::ChildProtocol {
                name: container.name().to_string(),
                reason: "console socket accept timed out".to_string(),
            }
        })?;

        let master = recv_fd(&stream)?.ok_or_else(|| DarkwingError::ChildProtocol {
            name: container.name().to_string(),
            reason: "console socket delivered zero fds".to_string(),
        })?;

        let stdout_dup = dup(master).context("dup PTY master for stdout")?;
        let stderr_dup = dup(master).context("dup PTY master for stderr")?;
        container.set_tty_fd(master);
        container.set_stdio(master, stdout_dup, stderr_dup);
        container.track_fd(stdout_dup);
        container.track_fd(stderr_dup);
        // `master` itself is tracked once; stdin/stdout/stderr intentionally alias the same open
        // file description (three views, one owner) per the component design.
        container.track_fd(master);

        let _ = std::fs::remove_file(&sock_path);
        Ok(())
    }

    fn create_with_pipes(&self, container: &mut Container, rundir: &crate::rundir::Rundir, _host_stdio: &HostStdio) -> Result<()> {
        let (stdin_parent, stdin_child) = socketpair(AddressFamily::Unix, SockType::Stream, None, SockFlag::empty())
            .context("create stdin socketpair")?;
        let (stdout_parent, stdout_child) = socketpair(AddressFamily::Unix, SockType::Stream, None, SockFlag::empty())
            .context("create stdout socketpair")?;
        let (stderr_parent, stderr_child) = socketpair(AddressFamily::Unix, SockType::Stream, None, SockFlag::empty())
            .context("create stderr socketpair")?;

        let mut cmd = self.runtime.command(
            &crate::oci::runtime::Subcommand::Create((
                container.name().to_string(),
                vec![
                    crate::oci::runtime::CreateArgs::Bundle(container.bundle_path().clone()),
                    crate::oci::runtime::CreateArgs::PidFile(rundir.pidfile()),
                ],
            )),
            &self.global_args(container),
        );
        unsafe {
            use std::os::unix::io::FromRawFd;
            cmd.stdin(Stdio::from_raw_fd(stdin_child));
            cmd.stdout(Stdio::from_raw_fd(stdout_child));
            cmd.stderr(Stdio::from_raw_fd(stderr_child));
        }

        let mut child = cmd.spawn().context("spawn OCI runtime create subprocess")?;
        // The child-side fds were moved into `Stdio::from_raw_fd` above; `Command::spawn` dup2s
        // them into the child and closes its own copies, so they must not be closed again here.
        let status = child.wait().context("wait on OCI runtime create subprocess")?;

        if !status.success() {
            let stderr_text = drain_nonblocking(stderr_parent);
            let _ = close(stdin_parent);
            let _ = close(stdout_parent);
            let _ = close(stderr_parent);
            return Err(DarkwingError::Runc {
                name: container.name().to_string(),
                code: status.code().unwrap_or(1),
                stderr: stderr_text,
            }
            .into());
        }

        container.set_stdio(stdin_parent, stdout_parent, stderr_parent);
        container.track_fd(stdin_parent);
        container.track_fd(stdout_parent);
        container.track_fd(stderr_parent);

        Ok(())
    }

    /// Spawns the three I/O pump threads (host stdin → container stdin, container stdout/stderr →
    /// host), sharing the container's stop flag. Uses the shorter TTY select timeout when the
    /// container is PTY-backed.
    fn start_io_pumps(&self, container: &mut Container, host_stdio: &HostStdio) -> Result<()> {
        let is_tty = container.tty_fd().is_some();
        let select_timeout = if is_tty { TTY_SELECT_TIMEOUT } else { PIPE_SELECT_TIMEOUT };
        let stop = container.stop_flag();

        let stdin_read = dup(host_stdio.stdin).context("dup host stdin for pump")?;
        let stdin_write = container.stdin().ok_or_else(|| anyhow!("container stdin not set"))?;
        let stdin_write = dup(stdin_write).context("dup container stdin for pump")?;
        let in_stop = stop.clone();
        let in_cfg = PumpConfig {
            tty_eof: is_tty,
            pipe_eof: !is_tty,
            select_timeout,
        };
        let in_handle = thread::spawn(move || {
            if let Err(e) = pump(stdin_read, stdin_write, in_stop, in_cfg) {
                log::debug!("stdin pump stopped: {}", e);
            }
        });
        container.track_thread(in_handle);

        let stdout_read = container.stdout().ok_or_else(|| anyhow!("container stdout not set"))?;
        let stdout_read = dup(stdout_read).context("dup container stdout for pump")?;
        let stdout_write = dup(host_stdio.stdout).context("dup host stdout for pump")?;
        let out_stop = stop.clone();
        let out_cfg = PumpConfig {
            tty_eof: false,
            pipe_eof: true,
            select_timeout,
        };
        let out_handle = thread::spawn(move || {
            if let Err(e) = pump(stdout_read, stdout_write, out_stop, out_cfg) {
                log::debug!("stdout pump stopped: {}", e);
            }
        });
        container.track_thread(out_handle);

        let stderr_read = container.stderr().ok_or_else(|| anyhow!("container stderr not set"))?;
        let stderr_read = dup(stderr_read).context("dup container stderr for pump")?;
        let stderr_write = dup(host_stdio.stderr).context("dup host stderr for pump")?;
        let err_stop = stop;
        let err_cfg = PumpConfig {
            tty_eof: false,
            pipe_eof: true,
            select_timeout,
        };
        let err_handle = thread::spawn(move || {
            if let Err(e) = pump(stderr_read, stderr_write, err_stop, err_cfg) {
                log::debug!("stderr pump stopped: {}", e);
            }
        });
        container.track_thread(err_handle);

        Ok(())
    }

    /// Invokes `start` and requires the runtime report `running` afterward.
    pub fn start_container(&self, container: &mut Container) -> Result<()> {
        self.runtime.start_container(&self.state_root(container), container.name())?;
        let state = self.runtime.state(&self.state_root(container), container.name())?;
        if !state.is_running() {
            return Err(DarkwingError::ChildProtocol {
                name: container.name().to_string(),
                reason: format!("expected status \"running\" after start, got \"{}\"", state.status()),
            }
            .into());
        }
        container.set_status(Status::Running);
        log::info!("container \"{}\" running (pid {})", container.name(), state.pid());
        Ok(())
    }

    /// Sends `SIGTERM` directly to the container's pid. Resolves the specification's open
    /// question of whether `stop_container` should be a real API surface (rather than
    /// `NotImplementedError`): an embedding program driving this crate as a library has no signal
    /// of its own to forward, so it needs a direct way to ask a container to stop.
    pub fn stop_container(&self, container: &Container) -> Result<()> {
        if let Some(pid) = container.pid() {
            kill(Pid::from_raw(pid), Signal::SIGTERM).context("send SIGTERM to container")?;
        }
        Ok(())
    }

    /// Requires the runtime report `stopped`, invokes `delete`, removes the pidfile and lockfile,
    /// drops the container from the registry, and marks it removed.
    pub fn remove_container(&self, container: &mut Container) -> Result<()> {
        let state = self.runtime.state(&self.state_root(container), container.name())?;
        if !state.is_stopped() {
            return Err(DarkwingError::ChildProtocol {
                name: container.name().to_string(),
                reason: format!("expected status \"stopped\" before remove, got \"{}\"", state.status()),
            }
            .into());
        }

        self.runtime.delete_container(&self.state_root(container), container.name())?;

        lock::remove(&container.rundir().pidfile())?;
        lock::remove(&container.rundir().lockfile())?;

        container.set_status(Status::Removed);
        Ok(())
    }

    /// Reserved: exec-in-running-container is not part of the single-lifecycle core.
    pub fn exec_in_container(&self, _container: &Container, _cmd: &[String]) -> Result<()> {
        Err(anyhow!("exec_in_container is reserved and not yet implemented"))
    }

    /// Reserved: one-shot create+start+wait+remove convenience, equivalent to composing the
    /// individually-callable operations; not implemented because `run_until_complete` already
    /// covers the only path this crate drives end to end.
    pub fn run_container(&self, _container: &Container) -> Result<i32> {
        Err(anyhow!("run_container is reserved and not yet implemented"))
    }

    /// Reads a container's current runtime state, optionally updating the handle's `pid` and
    /// `status` from it.
    pub fn get_container_state(&self, container: &mut Container, update: bool) -> Result<crate::oci::runtime::State> {
        let state = self.runtime.state(&self.state_root(container), container.name())?;
        if update {
            container.set_pid(state.pid());
            container.set_status(match state.status() {
                s if s == "creating" || s == "created" => Status::Created,
                s if s == "running" => Status::Running,
                s if s == "stopped" => Status::Stopped,
                _ => container.status(),
            });
        }
        Ok(state)
    }

    /// Reads the signal self-pipe until every container has exited. `CHLD` reaps; `WINCH`
    /// re-queries the host TTY size and propagates it; the forwarded set is delivered to every
    /// live container's pid; an escape-hatch signal (`SIGABRT`) unwinds the loop immediately.
    /// Exits once, after handling a batch, no container has `returncode() == None`.
    fn process_signals(&self, container: &mut Container, host_stdio: &HostStdio, self_pipe: &SelfPipe) -> Result<()> {
        let forwarded: Vec<u8> = signal::forwarded_signals().iter().map(|s| *s as i32 as u8).collect();
        let winch = Signal::SIGWINCH as i32 as u8;
        let chld = Signal::SIGCHLD as i32 as u8;

        loop {
            let bytes = self_pipe.recv()?;

            for &b in &bytes {
                if self_pipe.is_escape(b) {
                    log::warn!("escape-hatch signal {} received, unwinding the event loop", b);
                    return Ok(());
                }
                if b == chld {
                    self.reap(container);
                } else if b == winch {
                    self.propagate_winch(container, host_stdio);
                } else if forwarded.contains(&b) {
                    if let Some(pid) = container.pid() {
                        if let Ok(sig) = Signal::try_from(b as i32) {
                            let _ = kill(Pid::from_raw(pid), sig);
                        }
                    }
                }
            }

            if container.returncode().is_some() {
                break;
            }
        }
        Ok(())
    }

    /// Drains reapable children via `waitpid(-1, WNOHANG)`. A pid matching the supervised
    /// container sets its returncode (first writer wins); any other reaped pid is a "martian" and
    /// is logged, not acted on, since nothing in this single-container core registers side pids.
    fn reap(&self, container: &mut Container) {
        loop {
            match waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::StillAlive) => break,
                Ok(status) => {
                    let pid = status.pid().map(Pid::as_raw).unwrap_or(-1);
                    if Some(pid) == container.pid() {
                        if let Some(code) = crate::sys::proc::compute_returncode(status) {
                            log::debug!("reaped container pid {} with returncode {}", pid, code);
                            container.set_returncode_once(code);
                        }
                    } else {
                        log::warn!("reaped unknown child pid {} (martian)", pid);
                    }
                }
                Err(nix::Error::Sys(nix::errno::Errno::ECHILD)) => break,
                Err(e) => {
                    log::warn!("waitpid(-1, WNOHANG) failed: {}", e);
                    break;
                }
            }
        }
    }

    fn propagate_winch(&self, container: &Container, host_stdio: &HostStdio) {
        if let Some(tty_fd) = container.tty_fd() {
            if let Some(host_tty) = host_stdio.tty_candidate() {
                if let Ok(size) = tty::get_size(host_tty) {
                    let _ = tty::resize(tty_fd, size.columns, size.rows);
                }
            }
        }
    }
}

/// Polls `listener` for a connection until `timeout` elapses, returning `None` on timeout.
fn accept_with_timeout(listener: &UnixListener, timeout: Duration) -> Option<std::os::unix::net::UnixStream> {
    use std::os::unix::io::AsRawFd;
    let deadline = Instant::now() + timeout;
    loop {
        match listener.accept() {
            Ok((stream, _)) => return Some(stream),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return None;
                }
                let fd = listener.as_raw_fd();
                let mut fds = [PollFd::new(fd, PollFlags::POLLIN)];
                let _ = poll(&mut fds, remaining.as_millis() as i32);
            }
            Err(_) => return None,
        }
    }
}

/// Receives exactly one fd over `SCM_RIGHTS` on `stream`, per the console-socket protocol.
fn recv_fd(stream: &std::os::unix::net::UnixStream) -> Result<Option<RawFd>> {
    use std::os::unix::io::AsRawFd;
    let mut buf = [0u8; 8];
    let iov = [IoVec::from_mut_slice(&mut buf)];
    let mut cmsg_space = nix::cmsg_space!([RawFd; 1]);
    let msg = nix::sys::socket::recvmsg(stream.as_raw_fd(), &iov, Some(&mut cmsg_space), MsgFlags::empty())
        .context("recvmsg on console socket")?;

    for cmsg in msg.cmsgs() {
        if let ControlMessageOwned::ScmRights(fds) = cmsg {
            if let Some(&fd) = fds.first() {
                return Ok(Some(fd));
            }
        }
    }
    Ok(None)
}

/// Best-effort, non-blocking drain of `fd`'s currently-buffered bytes, used to recover the
/// runtime's error text when a non-tty `create` subprocess fails; the text was written to what is,
/// from the runtime's perspective, its own stderr.
fn drain_nonblocking(fd: RawFd) -> String {
    use nix::fcntl::{fcntl, FcntlArg, OFlag};
    let _ = fcntl(fd, FcntlArg::F_SETFL(OFlag::O_NONBLOCK));
    let mut out = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        match nix::unistd::read(fd, &mut buf) {
            Ok(0) => break,
            Ok(n) => out.extend_from_slice(&buf[..n]),
            Err(_) => break,
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        ConfigPathsBuilder, ContextBuilder, RuntimePathsBuilder, StoragePathsBuilder,
    };

    fn context(base: &Path) -> Context {
        ContextBuilder::default()
            .name("ctx")
            .base_path(base.to_path_buf())
            .configs(
                ConfigPathsBuilder::default()
                    .base(base.join("configs"))
                    .secrets(base.join("configs/secrets"))
                    .build()
                    .unwrap(),
            )
            .storage(
                StoragePathsBuilder::default()
                    .base(base.join("storage"))
                    .images(base.join("storage/images"))
                    .containers(base.join("storage/containers"))
                    .volumes(base.join("storage/volumes"))
                    .build()
                    .unwrap(),
            )
            .runtime(RuntimePathsBuilder::default().base(base.join("run")).build().unwrap())
            .uid(0u32)
            .gid(0u32)
            .rootless(false)
            .build()
            .unwrap()
    }

    #[test]
    fn executor_constructs_with_a_runtime_and_context() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = crate::oci::runtime::RuntimeBuilder::default()
            .binary(which::which("true").unwrap())
            .build()
            .unwrap();
        let _executor = Executor::new(runtime, context(dir.path()));
    }
}
