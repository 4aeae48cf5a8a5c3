//! Terminal raw-mode, size and EOF-character primitives.
//!
//! Grounded directly in the semantics a `runc`-driving supervisor needs: raw-mode save/restore
//! around a container's lifetime, `TIOCSWINSZ` propagation on `WINCH`, and writing the line
//! discipline's EOF character to end a pump cleanly instead of closing the fd out from under a
//! still-reading child.

use anyhow::{Context, Result};
use nix::sys::termios::{cfmakeraw, tcgetattr, tcsetattr, SetArg, SpecialCharacterIndices, Termios};
use nix::unistd::{isatty, ttyname};
use std::os::unix::io::RawFd;
use std::path::PathBuf;

/// A saved terminal size, `(columns, rows)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WinSize {
    pub columns: u16,
    pub rows: u16,
}

/// True if `fd` refers to a terminal.
pub fn is_tty(fd: RawFd) -> bool {
    isatty(fd).unwrap_or(false)
}

/// True if both fds are terminals and name the same controlling terminal, the exact test the
/// executor uses to decide whether stdout and stderr are "the same" TTY.
pub fn same_tty(a: RawFd, b: RawFd) -> bool {
    if !is_tty(a) || !is_tty(b) {
        return false;
    }
    match (ttyname(a), ttyname(b)) {
        (Ok(na), Ok(nb)) => na == nb,
        _ => false,
    }
}

/// Opens a dedicated control fd for the terminal named by `fd`, with `O_NOCTTY|O_CLOEXEC` so it
/// never becomes this process's controlling terminal and never leaks across exec.
pub fn open_control_fd(fd: RawFd) -> Result<std::fs::File> {
    let name: PathBuf = ttyname(fd).context("ttyname")?;
    let file = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .custom_flags(libc::O_NOCTTY | libc::O_CLOEXEC)
        .open(&name)
        .with_context(|| format!("open control fd for {}", name.display()))?;
    Ok(file)
}

/// Saves the current termios settings for `fd` and puts it into raw mode. Returns the prior
/// settings so the caller can restore them later.
pub fn set_raw(fd: RawFd) -> Result<Termios> {
    let saved = tcgetattr(fd).context("tcgetattr")?;
    let mut raw = saved.clone();
    cfmakeraw(&mut raw);
    tcsetattr(fd, SetArg::TCSANOW, &raw).context("tcsetattr (raw)")?;
    Ok(saved)
}

/// Restores previously saved termios settings.
pub fn restore(fd: RawFd, saved: &Termios) -> Result<()> {
    tcsetattr(fd, SetArg::TCSANOW, saved).context("tcsetattr (restore)")
}

/// Returns the terminal's current size via `TIOCGWINSZ`.
pub fn get_size(fd: RawFd) -> Result<WinSize> {
    let mut ws: libc::winsize = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::ioctl(fd, libc::TIOCGWINSZ, &mut ws as *mut _) };
    if rc != 0 {
        anyhow::bail!("TIOCGWINSZ failed: {}", std::io::Error::last_os_error());
    }
    Ok(WinSize {
        columns: ws.ws_col,
        rows: ws.ws_row,
    })
}

/// Pushes a new size to the terminal via `TIOCSWINSZ`, returning the size that was in effect
/// beforehand. Note the struct field order is rows-then-columns on the wire, per `struct
/// winsize`.
pub fn resize(fd: RawFd, columns: u16, rows: u16) -> Result<WinSize> {
    let old = get_size(fd)?;
    let ws = libc::winsize {
        ws_row: rows,
        ws_col: columns,
        ws_xpixel: 0,
        ws_ypixel: 0,
    };
    let rc = unsafe { libc::ioctl(fd, libc::TIOCSWINSZ, &ws as *const _) };
    if rc != 0 {
        anyhow::bail!("TIOCSWINSZ failed: {}", std::io::Error::last_os_error());
    }
    Ok(old)
}

/// Returns the terminal's current `VEOF` character (`Ctrl-D` by default).
pub fn veof_char(fd: RawFd) -> Result<u8> {
    let term = tcgetattr(fd).context("tcgetattr")?;
    Ok(term.control_chars[SpecialCharacterIndices::VEOF as usize])
}

/// Writes the terminal's `VEOF` character to `fd`, tolerating `EAGAIN`/`EINTR` as "nothing
/// written this time" rather than an error, matching the pump's best-effort close semantics.
/// Returns whether more than the EOF byte was actually written.
pub fn send_eof(fd: RawFd) -> bool {
    let eof = match veof_char(fd) {
        Ok(c) => c,
        Err(_) => return false,
    };
    match nix::unistd::write(fd, &[eof]) {
        Ok(n) => n > 0,
        Err(nix::Error::Sys(nix::errno::Errno::EAGAIN))
        | Err(nix::Error::Sys(nix::errno::Errno::EINTR)) => false,
        Err(_) => false,
    }
}

use std::os::unix::fs::OpenOptionsExt;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_tty_false_for_a_plain_file() {
        let f = tempfile::tempfile().unwrap();
        use std::os::unix::io::AsRawFd;
        assert!(!is_tty(f.as_raw_fd()));
    }

    #[test]
    fn same_tty_false_when_neither_is_a_tty() {
        let a = tempfile::tempfile().unwrap();
        let b = tempfile::tempfile().unwrap();
        use std::os::unix::io::AsRawFd;
        assert!(!same_tty(a.as_raw_fd(), b.as_raw_fd()));
    }
}
