//! Bundle/spec preparer: mutates a runtime-generated `config.json` from a declarative
//! [`ContainerConfig`], preserving a pristine copy (`config.orig.json`) so repeated overlays are
//! idempotent.

use crate::capability;
use crate::config::{ContainerConfig, VolumesConfig};
use crate::error::DarkwingError;
use crate::oci::spec::{Mount, MountBuilder, Spec};
use crate::rundir::Rundir;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// TTY policy: `force_tty` and `allow_tty` are mutually exclusive.
#[derive(Clone, Copy, Debug, Default)]
pub struct TtyPolicy {
    pub allow_tty: Option<bool>,
    pub force_tty: Option<bool>,
}

/// Reads `config.orig.json` if present; otherwise reads `config.json` and atomically copies it
/// to `config.orig.json`, then returns the pristine spec. Called on every overlay so that
/// applying the overlay twice yields a byte-identical `config.json` (the pristine source never
/// drifts).
pub fn load_pristine(bundle_path: &Path) -> Result<Spec> {
    let live_path = bundle_path.join("config.json");
    let orig_path = bundle_path.join("config.orig.json");

    if !orig_path.exists() {
        if !live_path.exists() {
            return Err(DarkwingError::Config(format!(
                "no spec found at {} to back up",
                live_path.display()
            ))
            .into());
        }
        std::fs::copy(&live_path, &orig_path).with_context(|| {
            format!(
                "copy {} to pristine {}",
                live_path.display(),
                orig_path.display()
            )
        })?;
    }

    Spec::load(&orig_path)
}

/// Applies the full configuration overlay to the pristine spec and writes the result to
/// `config.json`. `owner` is `(uid, gid)` of the process invoking the runtime, used for rootless
/// id-map rewriting. Returns the overlaid spec.
pub fn apply_overlay(
    bundle_path: &Path,
    config: &ContainerConfig,
    rundir: Option<&Rundir>,
    owner: Option<(u32, u32)>,
    tty: TtyPolicy,
) -> Result<Spec> {
    assert!(
        tty.allow_tty.is_none() || tty.force_tty.is_none(),
        "allow_tty and force_tty are mutually exclusive"
    );

    let mut spec = load_pristine(bundle_path)?;

    spec.set_hostname(Some(config.dns().hostname().to_string()));

    {
        let process = spec.process_mut();
        {
            let user = process.user_mut();
            user.set_uid(config.user().uid());
            user.set_gid(config.user().gid());
        }

        let mut terminal = config.exec().terminal();
        if let Some(allow) = tty.allow_tty {
            terminal = allow && terminal;
        }
        if let Some(force) = tty.force_tty {
            terminal = force;
        }
        process.set_terminal(Some(terminal));

        if let Some(dir) = config.exec().dir() {
            process.set_cwd(dir.display().to_string());
        }

        if let Some(cmd) = config.exec().cmd() {
            let mut args = vec![cmd.clone()];
            args.extend(shell_split(config.exec().args()));
            process.set_args(Some(args));
        } else if let Some(argstr) = config.exec().args() {
            let mut args = process.args().clone().unwrap_or_default();
            let head = if args.is_empty() { Vec::new() } else { vec![args.remove(0)] };
            let mut new_args = head;
            new_args.extend(shell_split(&Some(argstr.clone())));
            process.set_args(Some(new_args));
        }

        if !config.caps().add().is_empty() || !config.caps().drop().is_empty() {
            let mut caps = process.capabilities().clone().unwrap_or_default();
            let add = config.caps().add();
            let drop = config.caps().drop();
            caps.set_bounding(apply_cap_field(caps.bounding(), add, drop));
            caps.set_effective(apply_cap_field(caps.effective(), add, drop));
            caps.set_inheritable(apply_cap_field(caps.inheritable(), add, drop));
            caps.set_permitted(apply_cap_field(caps.permitted(), add, drop));
            caps.set_ambient(apply_cap_field(caps.ambient(), add, drop));
            process.set_capabilities(Some(caps));
        }

        let existing_env = process.env().clone().unwrap_or_default();
        let updated_env = update_environment(&existing_env, config.env().vars(), config.env().host());
        process.set_env(Some(updated_env));
    }

    let existing_mounts = spec.mounts().clone().unwrap_or_default();
    let updated_mounts = update_mounts(&existing_mounts, config.volumes(), rundir)?;
    spec.set_mounts(Some(updated_mounts));

    {
        let linux = spec.linux_mut();
        if let Some((ouid, _)) = owner {
            let existing = linux.uid_mappings().clone().unwrap_or_default();
            linux.set_uid_mappings(Some(update_id_maps(&existing, config.user().uid(), ouid)));
        }
        if let Some((_, ogid)) = owner {
            let existing = linux.gid_mappings().clone().unwrap_or_default();
            linux.set_gid_mappings(Some(update_id_maps(&existing, config.user().gid(), ogid)));
        }
    }

    let live_path = bundle_path.join("config.json");
    spec.save(&live_path)?;

    Ok(spec)
}

/// Ensures non-bind-mount volume directories exist, creating them at `mount.mode()` (default
/// 0770) and validates that bind-mount sources exist. Separate from [`apply_overlay`] because the
/// original schedules it conditionally (`ensure_mounts=true` by default, skippable for dry runs).
pub fn ensure_mounts(
    volumes: &VolumesConfig,
    rundir: Option<&Rundir>,
    owner: Option<(u32, u32)>,
) -> Result<()> {
    for mount in volumes.mounts() {
        let path = resolve_mount_source(mount.typ(), mount.source(), volumes, rundir)?;
        if mount.typ() == "bind" {
            if !path.exists() {
                return Err(DarkwingError::Config(format!(
                    "bind mount \"{}\" must exist",
                    path.display()
                ))
                .into());
            }
        } else {
            let mode = mount.mode().unwrap_or(0o770);
            crate::sys::fsutil::ensure_dirs(&[(path.as_path(), mode)], owner)?;
        }
    }
    Ok(())
}

fn resolve_mount_source(
    typ: &str,
    source: &Path,
    volumes: &VolumesConfig,
    rundir: Option<&Rundir>,
) -> Result<PathBuf> {
    let strip_leading_slash = |p: &Path| -> PathBuf {
        p.strip_prefix("/").map(|p| p.to_path_buf()).unwrap_or_else(|_| p.to_path_buf())
    };
    match typ {
        "bind" => {
            if !source.is_absolute() {
                return Err(DarkwingError::Config(format!(
                    "bind mount \"{}\" must be absolute",
                    source.display()
                ))
                .into());
            }
            Ok(source.to_path_buf())
        }
        "shared" => {
            let base = volumes.shared().as_ref().ok_or_else(|| {
                DarkwingError::Config("shared volume mount requested but no shared volume base configured".into())
            })?;
            Ok(base.join(strip_leading_slash(source)))
        }
        "private" => {
            let base = volumes.private().as_ref().ok_or_else(|| {
                DarkwingError::Config("private volume mount requested but no private volume base configured".into())
            })?;
            Ok(base.join(strip_leading_slash(source)))
        }
        "runtime" => {
            let rd = rundir.ok_or_else(|| {
                DarkwingError::Config(format!(
                    "runtime volume mount requested for \"{}\", but no runtime directory given",
                    source.display()
                ))
            })?;
            Ok(rd.volumes_path().join(strip_leading_slash(source)))
        }
        other => Err(DarkwingError::Config(format!("unknown mount type: \"{}\"", other)).into()),
    }
}

fn mount_options(readonly: bool, recursive: bool) -> Vec<String> {
    let mut options = vec!["nodev".to_string(), "nosuid".to_string()];
    options.push(if recursive { "rbind" } else { "bind" }.to_string());
    if readonly {
        options.push("ro".to_string());
    }
    options
}

fn update_mounts(
    orig: &[Mount],
    volumes: &VolumesConfig,
    rundir: Option<&Rundir>,
) -> Result<Vec<Mount>> {
    let mut ordered: Vec<(PathBuf, Mount)> = orig
        .iter()
        .map(|m| (m.destination().clone(), m.clone()))
        .collect();

    let upsert = |ordered: &mut Vec<(PathBuf, Mount)>, key: PathBuf, val: Mount| {
        if let Some(pos) = ordered.iter().position(|(k, _)| k == &key) {
            ordered[pos].1 = val;
        } else {
            ordered.push((key, val));
        }
    };

    for mount in volumes.mounts() {
        let source = resolve_mount_source(mount.typ(), mount.source(), volumes, rundir)?;
        let spec_mount = MountBuilder::default()
            .destination(mount.destination().clone())
            .typ("bind".to_string())
            .source(source)
            .options(mount_options(mount.readonly(), mount.recursive()))
            .build()?;
        upsert(&mut ordered, mount.destination().clone(), spec_mount);
    }

    if let Some(rd) = rundir {
        for m in rd.mounts() {
            let spec_mount = MountBuilder::default()
                .destination(m.destination().clone())
                .typ("bind".to_string())
                .source(m.source().clone())
                .options(mount_options(m.readonly(), false))
                .build()?;
            upsert(&mut ordered, m.destination().clone(), spec_mount);
        }
    }

    Ok(ordered.into_iter().map(|(_, m)| m).collect())
}

fn apply_cap_field(existing: &Option<Vec<String>>, add: &[String], drop: &[String]) -> Option<Vec<String>> {
    existing.as_ref().map(|v| capability::apply(v, add, drop))
}

/// Ordered key/value env list: `KEY=VAL` entries expanded into a map preserving first-occurrence
/// order (later assignments update the value in place, matching dict semantics), then overlaid
/// with `env.vars` and `env.host`, then re-flattened.
fn update_environment(existing: &[String], vars: &[String], host: &[String]) -> Vec<String> {
    let mut ordered: Vec<(String, String)> = Vec::new();

    let set = |ordered: &mut Vec<(String, String)>, key: String, val: String| {
        if let Some(pos) = ordered.iter().position(|(k, _)| k == &key) {
            ordered[pos].1 = val;
        } else {
            ordered.push((key, val));
        }
    };
    let unset = |ordered: &mut Vec<(String, String)>, key: &str| {
        ordered.retain(|(k, _)| k != key);
    };

    for var in existing {
        let (name, value) = split_kv(var);
        set(&mut ordered, name, value.unwrap_or_default());
    }

    for var in vars {
        let (name, value) = split_kv(var);
        match value {
            Some(v) => set(&mut ordered, name, v),
            None => unset(&mut ordered, &name),
        }
    }

    for var in host {
        let (name, default) = split_kv(var);
        match std::env::var(&name) {
            Ok(hostval) => set(&mut ordered, name, hostval),
            Err(_) => match default {
                Some(v) => set(&mut ordered, name, v),
                None => unset(&mut ordered, &name),
            },
        }
    }

    ordered.into_iter().map(|(k, v)| format!("{}={}", k, v)).collect()
}

/// Splits `KEY=VAL` into `(KEY, Some(VAL))`, or bare `KEY` into `(KEY, None)`.
fn split_kv(entry: &str) -> (String, Option<String>) {
    match entry.split_once('=') {
        Some((k, v)) => (k.to_string(), Some(v.to_string())),
        None => (entry.to_string(), None),
    }
}

fn update_id_maps(
    maps: &[crate::oci::spec::LinuxIdMapping],
    container_id: u32,
    host_id: u32,
) -> Vec<crate::oci::spec::LinuxIdMapping> {
    maps.iter()
        .map(|m| {
            let mut m = *m;
            if m.container_id() == container_id {
                m.set_host_id(host_id);
            }
            m
        })
        .collect()
}

/// A conservative POSIX-shell-like word split: supports single/double quoting and backslash
/// escapes, whitespace-separated otherwise. `None`/empty input yields no words.
fn shell_split(input: &Option<String>) -> Vec<String> {
    let s = match input {
        Some(s) if !s.is_empty() => s,
        _ => return Vec::new(),
    };

    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut chars = s.chars().peekable();
    let mut quote: Option<char> = None;

    while let Some(c) = chars.next() {
        match quote {
            Some(q) if c == q => quote = None,
            Some('\'') => current.push(c),
            Some('"') if c == '\\' => {
                if let Some(&next) = chars.peek() {
                    if next == '"' || next == '\\' {
                        current.push(next);
                        chars.next();
                    } else {
                        current.push(c);
                    }
                } else {
                    current.push(c);
                }
            }
            Some(_) => current.push(c),
            None => match c {
                '\'' | '"' => {
                    quote = Some(c);
                    in_word = true;
                }
                '\\' => {
                    if let Some(next) = chars.next() {
                        current.push(next);
                        in_word = true;
                    }
                }
                c if c.is_whitespace() => {
                    if in_word {
                        words.push(std::mem::take(&mut current));
                        in_word = false;
                    }
                }
                c => {
                    current.push(c);
                    in_word = true;
                }
            },
        }
    }
    if in_word || !current.is_empty() {
        words.push(current);
    }
    words
}
