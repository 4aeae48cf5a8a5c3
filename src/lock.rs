//! Pidfile / lockfile management: per-container files in the runtime dir that detect a stale or
//! live owner before a container is created.
//!
//! The **lockfile** holds the supervisor's own pid and grants exclusive use of a bundle; the
//! **pidfile** holds the init pid of the running container, written only once the runtime reports
//! `created`. Both are decimal ASCII integers, newline-optional.

use crate::error::DarkwingError;
use anyhow::{Context, Result};
use nix::sys::signal::kill;
use nix::unistd::{getpid, Pid};
use std::fs;
use std::path::Path;

/// True if `pid` names a process that is still alive, via `kill(pid, 0)`. `ESRCH` means gone;
/// `EPERM` means it exists but we can't signal it, which still counts as alive for conflict
/// detection.
pub fn is_alive(pid: i32) -> bool {
    kill(Pid::from_raw(pid), None).is_ok()
}

/// Reads a pid out of a pidfile/lockfile, tolerating a trailing newline. Returns `None` if the
/// file is absent.
pub fn read_pid(path: &Path) -> Result<Option<i32>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let pid: i32 = trimmed
        .parse()
        .with_context(|| format!("parse pid from {}", path.display()))?;
    Ok(Some(pid))
}

/// Writes `pid` to `path` as a decimal ASCII integer.
pub fn write_pid(path: &Path, pid: i32) -> Result<()> {
    fs::write(path, pid.to_string()).with_context(|| format!("write {}", path.display()))
}

/// Removes `path` if present, tolerating its absence.
pub fn remove(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("remove {}", path.display())),
    }
}

/// Acquires the lockfile at `path` for container `name`: if it names a live pid other than our
/// own, the bundle is in use and creation must be refused. If it names a dead pid, the lock is
/// stale and is silently replaced. On success, writes our own pid and returns.
pub fn acquire(path: &Path, name: &str) -> Result<()> {
    if let Some(owner) = read_pid(path)? {
        let us = getpid().as_raw();
        if owner != us && is_alive(owner) {
            return Err(DarkwingError::StateConflict {
                name: name.to_string(),
                pid: owner,
            }
            .into());
        }
        if owner != us {
            log::warn!(
                "removing stale lockfile for container \"{}\" (dead pid {})",
                name,
                owner
            );
        }
    }
    write_pid(path, getpid().as_raw())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn acquire_writes_own_pid_when_absent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lock");
        acquire(&path, "demo").unwrap();
        assert_eq!(read_pid(&path).unwrap(), Some(getpid().as_raw()));
    }

    #[test]
    fn acquire_replaces_a_stale_lock() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lock");
        // pid 999999 is essentially guaranteed not to be alive in a test sandbox.
        write_pid(&path, 999_999).unwrap();
        acquire(&path, "demo").unwrap();
        assert_eq!(read_pid(&path).unwrap(), Some(getpid().as_raw()));
    }

    #[test]
    fn acquire_conflicts_with_a_live_foreign_pid() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lock");
        // pid 1 is alive on any Linux host running this test.
        write_pid(&path, 1).unwrap();
        let err = acquire(&path, "demo").unwrap_err();
        assert!(err.to_string().contains("already in use"));
    }

    #[test]
    fn acquire_is_idempotent_for_self() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lock");
        acquire(&path, "demo").unwrap();
        acquire(&path, "demo").unwrap();
    }

    #[test]
    fn remove_tolerates_absence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing");
        remove(&path).unwrap();
    }
}
