//! Blocking byte pump between two file descriptors.
//!
//! One pump runs per container stdio stream (stdin, stdout, stderr) on its own thread; the
//! executor joins all three on teardown. Grounded directly in the reference `iopump`: buffer
//! sized to half the default buffer (clamped to `PIPE_BUF` when the write end is a FIFO/socket),
//! `select`-driven with read-end EOF and write-end-closed detection, best-effort cleanup on every
//! exit path.

use crate::sys::tty::{is_tty, send_eof};
use anyhow::{anyhow, Result};
use nix::errno::Errno;
use nix::sys::select::{select, FdSet};
use nix::sys::stat::{fstat, SFlag};
use nix::sys::time::{TimeVal, TimeValLike};
use nix::unistd::{close, read, write};
use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_BUFFER_SIZE: usize = 8192;
const PIPE_BUF: usize = 4096;

/// Pump behavior flags and the `select` polling interval (also the stop-flag latency bound).
#[derive(Clone, Copy, Debug)]
pub struct PumpConfig {
    /// Send the write side's terminal VEOF character once the read side reaches EOF, instead of
    /// relying on fd closure to signal end-of-input (used for container stdin over a PTY).
    pub tty_eof: bool,
    /// Watch the write end for readability too, the trick that detects the peer closing its end
    /// of a pipe or socket before we'd otherwise notice.
    pub pipe_eof: bool,
    pub select_timeout: Duration,
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            tty_eof: false,
            pipe_eof: true,
            select_timeout: Duration::from_millis(200),
        }
    }
}

/// How a pump run ended.
#[derive(Debug, PartialEq, Eq)]
pub enum PumpExit {
    /// Read end reached EOF and the buffer fully drained.
    Eof,
    /// The stop flag was observed set.
    Stopped,
    /// The write end was detected closed before all buffered data could be flushed.
    BrokenPipe,
}

/// Shuttles bytes from `read_fd` to `write_fd` until EOF, a broken pipe, or `stop` is set. Closes
/// both fds (best-effort) on every exit path; if `tty_eof` resolved true, writes the VEOF
/// character to `write_fd` first.
pub fn pump(read_fd: RawFd, write_fd: RawFd, stop: Arc<AtomicBool>, mut config: PumpConfig) -> Result<PumpExit> {
    let mut bufsize = DEFAULT_BUFFER_SIZE / 2;

    if config.tty_eof {
        config.tty_eof = is_tty(write_fd);
        config.pipe_eof = false;
    } else if config.pipe_eof {
        let is_fifo_or_sock = fstat(write_fd)
            .map(|st| {
                let mode = SFlag::from_bits_truncate(st.st_mode as libc::mode_t);
                mode.contains(SFlag::S_IFIFO) || mode.contains(SFlag::S_IFSOCK)
            })
            .unwrap_or(false);
        config.pipe_eof = is_fifo_or_sock;
        if config.pipe_eof {
            bufsize = bufsize.min(PIPE_BUF);
        }
    }

    let mut buf: Vec<u8> = Vec::new();
    let mut read_open = true;
    let mut last_byte: Option<u8> = None;

    let exit = run(
        read_fd,
        write_fd,
        &stop,
        &config,
        bufsize,
        &mut buf,
        &mut read_open,
        &mut last_byte,
    );

    buf.clear();
    if read_open {
        let _ = close(read_fd);
    }
    if config.tty_eof {
        send_eof(write_fd);
    }
    let _ = close(write_fd);

    exit
}

#[allow(clippy::too_many_arguments)]
fn run(
    read_fd: RawFd,
    write_fd: RawFd,
    stop: &Arc<AtomicBool>,
    config: &PumpConfig,
    bufsize: usize,
    buf: &mut Vec<u8>,
    read_open: &mut bool,
    last_byte: &mut Option<u8>,
) -> Result<PumpExit> {
    loop {
        if !*read_open && buf.is_empty() {
            return Ok(PumpExit::Eof);
        }
        if stop.load(Ordering::SeqCst) {
            return Ok(PumpExit::Stopped);
        }

        let mut rset = FdSet::new();
        let mut wset = FdSet::new();
        if *read_open && buf.len() < bufsize {
            rset.insert(read_fd);
        }
        if !buf.is_empty() {
            wset.insert(write_fd);
        }
        if config.pipe_eof {
            rset.insert(write_fd);
        }

        let mut timeout = TimeVal::milliseconds(config.select_timeout.as_millis() as i64);
        match select(None, Some(&mut rset), Some(&mut wset), None, Some(&mut timeout)) {
            Ok(0) => continue,
            Ok(_) => {}
            Err(nix::Error::Sys(Errno::EINTR)) => continue,
            Err(e) => return Err(anyhow!(e)),
        }

        if config.pipe_eof && rset.contains(write_fd) {
            return Ok(PumpExit::BrokenPipe);
        }

        if *read_open && rset.contains(read_fd) {
            let mut chunk = vec![0u8; bufsize - buf.len()];
            match read(read_fd, &mut chunk) {
                Ok(0) => {
                    let _ = close(read_fd);
                    *read_open = false;
                }
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
                Err(nix::Error::Sys(Errno::EAGAIN)) | Err(nix::Error::Sys(Errno::EINTR)) => {}
                Err(nix::Error::Sys(Errno::EIO)) => {
                    let _ = close(read_fd);
                    *read_open = false;
                }
                Err(e) => return Err(anyhow!(e)),
            }
        }

        if !buf.is_empty() && wset.contains(write_fd) {
            match write(write_fd, buf) {
                Ok(sent) if sent > 0 => {
                    *last_byte = Some(buf[sent - 1]);
                    buf.drain(..sent);
                }
                Ok(_) => {}
                Err(nix::Error::Sys(Errno::EAGAIN)) | Err(nix::Error::Sys(Errno::EINTR)) => {}
                Err(e) => return Err(anyhow!(e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::unistd::pipe;
    use std::thread;

    #[test]
    fn pumps_bytes_until_eof() {
        let (read_src, write_src) = pipe().unwrap();
        let (read_dst, write_dst) = pipe().unwrap();

        let stop = Arc::new(AtomicBool::new(false));
        let handle = thread::spawn({
            let stop = stop.clone();
            move || pump(read_src, write_dst, stop, PumpConfig::default())
        });

        write(write_src, b"hello world").unwrap();
        close(write_src).unwrap();

        let exit = handle.join().unwrap().unwrap();
        assert_eq!(exit, PumpExit::Eof);

        let mut out = vec![0u8; 32];
        let n = read(read_dst, &mut out).unwrap();
        assert_eq!(&out[..n], b"hello world");
        close(read_dst).unwrap();
    }

    #[test]
    fn stop_flag_ends_the_pump() {
        let (read_src, write_src) = pipe().unwrap();
        let (read_dst, write_dst) = pipe().unwrap();

        let stop = Arc::new(AtomicBool::new(false));
        let handle = thread::spawn({
            let stop = stop.clone();
            let timeout = Duration::from_millis(20);
            move || {
                pump(
                    read_src,
                    write_dst,
                    stop,
                    PumpConfig {
                        select_timeout: timeout,
                        ..PumpConfig::default()
                    },
                )
            }
        });

        thread::sleep(Duration::from_millis(10));
        stop.store(true, Ordering::SeqCst);

        let exit = handle.join().unwrap().unwrap();
        assert_eq!(exit, PumpExit::Stopped);

        let _ = close(write_src);
        let _ = close(read_dst);
    }

    #[test]
    fn broken_pipe_detected_when_write_end_closes() {
        let (read_src, write_src) = pipe().unwrap();
        let (read_dst, write_dst) = pipe().unwrap();
        close(read_dst).unwrap();

        let stop = Arc::new(AtomicBool::new(false));
        let handle = thread::spawn({
            let stop = stop.clone();
            move || pump(read_src, write_dst, stop, PumpConfig::default())
        });

        write(write_src, b"x").unwrap();

        let exit = handle.join().unwrap().unwrap();
        assert_eq!(exit, PumpExit::BrokenPipe);
        let _ = close(write_src);
    }
}
