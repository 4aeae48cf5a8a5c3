//! Directory/file creation with explicit mode and optional ownership, used by the runtime-dir
//! manager and (via the configuration collaborator, out of scope here) context/container config
//! setup.

use anyhow::{Context, Result};
use nix::unistd::{chown, Gid, Uid};
use std::fs::{self, OpenOptions};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Creates each directory in `dirs` (with parents) at the given mode if missing, optionally
/// chowning it. Returns the subset that was actually created, mirroring the source's
/// `ensure_dirs` so idempotent re-runs can tell what's new.
pub fn ensure_dirs(dirs: &[(&Path, u32)], owner: Option<(u32, u32)>) -> Result<Vec<PathBuf>> {
    let mut created = Vec::new();
    for (dir, mode) in dirs {
        if !dir.exists() {
            fs::create_dir_all(dir)
                .with_context(|| format!("create directory {}", dir.display()))?;
            fs::set_permissions(dir, fs::Permissions::from_mode(*mode))
                .with_context(|| format!("chmod {} to {:o}", dir.display(), mode))?;
            if let Some((uid, gid)) = owner {
                chown(*dir, Some(Uid::from_raw(uid)), Some(Gid::from_raw(gid)))
                    .with_context(|| format!("chown {}", dir.display()))?;
            }
            created.push(dir.to_path_buf());
        }
    }
    Ok(created)
}

/// Touches each file in `files` (creating parents) at the given mode if missing, optionally
/// chowning it.
pub fn ensure_files(files: &[(&Path, u32)], owner: Option<(u32, u32)>) -> Result<Vec<PathBuf>> {
    let mut created = Vec::new();
    for (file, mode) in files {
        if !file.exists() {
            if let Some(parent) = file.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create parent directory for {}", file.display()))?;
            }
            OpenOptions::new()
                .create(true)
                .write(true)
                .open(file)
                .with_context(|| format!("create file {}", file.display()))?;
            fs::set_permissions(file, fs::Permissions::from_mode(*mode))
                .with_context(|| format!("chmod {} to {:o}", file.display(), mode))?;
            if let Some((uid, gid)) = owner {
                chown(*file, Some(Uid::from_raw(uid)), Some(Gid::from_raw(gid)))
                    .with_context(|| format!("chown {}", file.display()))?;
            }
            created.push(file.to_path_buf());
        }
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn ensure_dirs_creates_missing_with_mode() {
        let tmp = tempdir().unwrap();
        let target = tmp.path().join("a/b/c");
        let created = ensure_dirs(&[(target.as_path(), 0o770)], None).unwrap();

        assert_eq!(created, vec![target.clone()]);
        assert!(target.is_dir());
        let mode = fs::metadata(&target).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o770);
    }

    #[test]
    fn ensure_dirs_is_idempotent() {
        let tmp = tempdir().unwrap();
        let target = tmp.path().join("x");
        ensure_dirs(&[(target.as_path(), 0o770)], None).unwrap();
        let created_again = ensure_dirs(&[(target.as_path(), 0o770)], None).unwrap();
        assert!(created_again.is_empty());
    }

    #[test]
    fn ensure_files_touches_missing_with_mode() {
        let tmp = tempdir().unwrap();
        let target = tmp.path().join("sub/hostname");
        let created = ensure_files(&[(target.as_path(), 0o644)], None).unwrap();

        assert_eq!(created, vec![target.clone()]);
        assert!(target.is_file());
        let mode = fs::metadata(&target).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o644);
    }
}
