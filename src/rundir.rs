//! Runtime directory manager: the per-container scratch area under the runtime base path.
//!
//! Grounded in the original implementation's `make_runtime_dir`: a `{base}/{secrets,volumes}`
//! tree, a copied `/etc/resolv.conf`, a `hostname` file written from config, and a canonical
//! mounts list the spec preparer mixes ahead of user-declared volumes.

use crate::config::{ContainerConfig, RundirMount};
use crate::sys::fsutil::{ensure_dirs, ensure_files};
use anyhow::{Context, Result};
use getset::Getters;
use std::fs;
use std::path::{Path, PathBuf};

/// Ephemeral per-run working area for one container.
#[derive(Clone, Debug, Getters)]
pub struct Rundir {
    #[getset(get = "pub")]
    path: PathBuf,
    #[getset(get = "pub")]
    secrets_path: PathBuf,
    #[getset(get = "pub")]
    volumes_path: PathBuf,
    #[getset(get = "pub")]
    resolvconf: PathBuf,
    #[getset(get = "pub")]
    hostname: PathBuf,
    #[getset(get = "pub")]
    mounts: Vec<RundirMount>,
}

impl Rundir {
    /// Path to the Unix-domain socket the executor binds for the console-socket handshake.
    pub fn tty_sock(&self) -> PathBuf {
        self.path.join("tty.sock")
    }

    /// Path to the pidfile holding the container init's pid.
    pub fn pidfile(&self) -> PathBuf {
        self.path.join("pid")
    }

    /// Path to the lockfile holding the owning supervisor's pid.
    pub fn lockfile(&self) -> PathBuf {
        self.path.join("lock")
    }

    /// Path to pass as `--root` to the OCI runtime: its own private state directory.
    pub fn runtime_state_dir(&self) -> PathBuf {
        self.path.join(".runc")
    }

    /// Recursively removes the runtime directory tree.
    pub fn remove(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_dir_all(&self.path)
                .with_context(|| format!("remove runtime dir {}", self.path.display()))?;
        }
        Ok(())
    }
}

/// Creates `{runtime_base}/{context}/{container}` with the secrets/volumes subtree, copies
/// `/etc/resolv.conf`, writes `hostname` from `config.dns.hostname`, and returns the populated
/// [`Rundir`] record including its canonical mounts list (secrets ro, resolv.conf ro, hostname
/// rw). If `recreate` is set, any prior tree is removed first.
pub fn make_rundir(
    runtime_base: &Path,
    context: &str,
    config: &ContainerConfig,
    recreate: bool,
) -> Result<Rundir> {
    let path = runtime_base.join(context).join(config.name());

    if recreate && path.exists() {
        fs::remove_dir_all(&path)
            .with_context(|| format!("remove existing runtime dir {}", path.display()))?;
    }

    let secrets_path = path.join("secrets");
    let volumes_path = path.join("volumes");
    ensure_dirs(
        &[
            (path.as_path(), 0o770),
            (secrets_path.as_path(), 0o700),
            (volumes_path.as_path(), 0o770),
        ],
        None,
    )?;

    let resolvconf = path.join("resolv.conf");
    let hostname = path.join("hostname");
    ensure_files(
        &[(resolvconf.as_path(), 0o644), (hostname.as_path(), 0o644)],
        None,
    )?;

    let host_resolvconf =
        fs::read("/etc/resolv.conf").context("read host /etc/resolv.conf")?;
    fs::write(&resolvconf, host_resolvconf)
        .with_context(|| format!("populate {}", resolvconf.display()))?;

    fs::write(&hostname, format!("{}\n", config.dns().hostname()))
        .with_context(|| format!("populate {}", hostname.display()))?;

    let mounts = vec![
        RundirMount {
            destination: PathBuf::from("/run/secrets"),
            source: secrets_path.clone(),
            readonly: true,
        },
        RundirMount {
            destination: PathBuf::from("/etc/resolv.conf"),
            source: resolvconf.clone(),
            readonly: true,
        },
        RundirMount {
            destination: PathBuf::from("/etc/hostname"),
            source: hostname.clone(),
            readonly: false,
        },
    ];

    Ok(Rundir {
        path,
        secrets_path,
        volumes_path,
        resolvconf,
        hostname,
        mounts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        ContainerConfigBuilder, DnsConfigBuilder, ExecConfigBuilder, ImageConfigBuilder,
        UserConfigBuilder,
    };
    use tempfile::tempdir;

    fn config() -> ContainerConfig {
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
                    .terminal(false)
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

    #[test]
    fn make_rundir_creates_tree_and_mounts() {
        let base = tempdir().unwrap();
        let cfg = config();
        let rd = make_rundir(base.path(), "ctx", &cfg, false).unwrap();

        assert!(rd.path().is_dir());
        assert!(rd.secrets_path().is_dir());
        assert!(rd.volumes_path().is_dir());
        assert!(rd.resolvconf().is_file());
        assert_eq!(
            fs::read_to_string(rd.hostname()).unwrap(),
            "demo\n"
        );
        assert_eq!(rd.mounts().len(), 3);
        assert!(rd.mounts()[0].readonly());
        assert!(!rd.mounts()[2].readonly());
    }

    #[test]
    fn recreate_wipes_prior_tree() {
        let base = tempdir().unwrap();
        let cfg = config();
        let rd = make_rundir(base.path(), "ctx", &cfg, false).unwrap();
        fs::write(rd.path().join("stale-marker"), b"x").unwrap();

        let rd2 = make_rundir(base.path(), "ctx", &cfg, true).unwrap();
        assert!(!rd2.path().join("stale-marker").exists());
    }

    #[test]
    fn remove_deletes_the_tree() {
        let base = tempdir().unwrap();
        let cfg = config();
        let rd = make_rundir(base.path(), "ctx", &cfg, false).unwrap();
        rd.remove().unwrap();
        assert!(!rd.path().exists());
    }
}
