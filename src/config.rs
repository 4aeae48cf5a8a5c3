//! Passive configuration records consumed by the spec preparer, runtime-dir manager and executor.
//!
//! These types carry no parsing logic of their own: loading them from TOML, deriving default
//! paths from the environment, and CLI argument handling are all external collaborators. What
//! lives here is the concrete, testable shape the rest of this crate compiles against, built with
//! the same owned-builder/`getset` idiom used throughout this crate family.

use derive_builder::Builder;
use getset::{CopyGetters, Getters};
use std::{collections::HashMap, path::PathBuf};

/// A named namespace grouping containers. Immutable after load.
#[derive(Clone, Debug, Builder, Getters, CopyGetters)]
#[builder(pattern = "owned", setter(into, strip_option))]
pub struct Context {
    #[getset(get = "pub")]
    name: String,

    #[getset(get = "pub")]
    base_path: PathBuf,

    #[getset(get = "pub")]
    configs: ConfigPaths,

    #[getset(get = "pub")]
    storage: StoragePaths,

    #[getset(get = "pub")]
    runtime: RuntimePaths,

    #[getset(get_copy = "pub")]
    uid: u32,

    #[getset(get_copy = "pub")]
    gid: u32,

    #[getset(get_copy = "pub")]
    rootless: bool,
}

#[derive(Clone, Debug, Builder, Getters)]
#[builder(pattern = "owned", setter(into, strip_option))]
pub struct ConfigPaths {
    #[getset(get = "pub")]
    base: PathBuf,
    #[getset(get = "pub")]
    secrets: PathBuf,
}

#[derive(Clone, Debug, Builder, Getters)]
#[builder(pattern = "owned", setter(into, strip_option))]
pub struct StoragePaths {
    #[getset(get = "pub")]
    base: PathBuf,
    #[getset(get = "pub")]
    images: PathBuf,
    #[getset(get = "pub")]
    containers: PathBuf,
    #[getset(get = "pub")]
    volumes: PathBuf,
}

#[derive(Clone, Debug, Builder, Getters)]
#[builder(pattern = "owned", setter(into, strip_option))]
pub struct RuntimePaths {
    #[getset(get = "pub")]
    base: PathBuf,
}

/// Declarative spec for one container. Immutable except for `exec.terminal`, which the executor
/// may clear if the host lacks a TTY (see [`ExecConfig::clear_terminal`]).
#[derive(Clone, Debug, Builder, Getters)]
#[builder(pattern = "owned", setter(into, strip_option))]
pub struct ContainerConfig {
    #[getset(get = "pub")]
    name: String,

    #[getset(get = "pub")]
    image: ImageConfig,

    /// Bundle directory (`storage.container` in the data model).
    #[getset(get = "pub")]
    bundle_path: PathBuf,

    #[getset(get = "pub")]
    exec: ExecConfig,

    #[getset(get = "pub")]
    #[builder(default)]
    env: EnvConfig,

    #[getset(get = "pub")]
    user: UserConfig,

    #[getset(get = "pub")]
    #[builder(default)]
    caps: CapsConfig,

    #[getset(get = "pub")]
    dns: DnsConfig,

    #[getset(get = "pub")]
    #[builder(default)]
    network: NetworkConfig,

    #[getset(get = "pub")]
    #[builder(default)]
    secrets: SecretsConfig,

    #[getset(get = "pub")]
    #[builder(default)]
    volumes: VolumesConfig,
}

#[derive(Clone, Debug, Builder, Getters)]
#[builder(pattern = "owned", setter(into, strip_option))]
pub struct ImageConfig {
    #[getset(get = "pub")]
    typ: String,
    #[getset(get = "pub")]
    path: String,
    #[getset(get = "pub")]
    tag: String,
}

/// Execution parameters. `terminal` is the one field in [`ContainerConfig`] the executor is
/// allowed to mutate, via [`ExecConfig::clear_terminal`], when the host has no TTY to back a
/// container's request for one.
#[derive(Clone, Debug, Builder, Getters, CopyGetters)]
#[builder(pattern = "owned", setter(into, strip_option))]
pub struct ExecConfig {
    #[getset(get = "pub")]
    #[builder(default)]
    dir: Option<PathBuf>,

    #[getset(get = "pub")]
    #[builder(default)]
    cmd: Option<String>,

    #[getset(get = "pub")]
    #[builder(default)]
    args: Option<String>,

    #[getset(get_copy = "pub")]
    terminal: bool,
}

impl ExecConfig {
    /// Clears the terminal request. Invoked by the executor's TTY detection step when the
    /// container asked for a TTY but the host has none to offer.
    pub fn clear_terminal(&mut self) {
        self.terminal = false;
    }
}

impl ContainerConfig {
    /// Mutable access to `exec`, the one section of an otherwise-immutable config the executor
    /// is allowed to touch (see [`ExecConfig::clear_terminal`]).
    pub fn exec_mut(&mut self) -> &mut ExecConfig {
        &mut self.exec
    }
}

#[derive(Clone, Debug, Default, Builder, Getters)]
#[builder(default, pattern = "owned", setter(into, strip_option))]
pub struct EnvConfig {
    /// `KEY=VAL` sets, bare `KEY` unsets.
    #[getset(get = "pub")]
    vars: Vec<String>,

    /// `KEY=DEFAULT` entries: set to the host value if present, else DEFAULT, else unset.
    #[getset(get = "pub")]
    host: Vec<String>,

    #[getset(get = "pub")]
    files: Vec<PathBuf>,
}

#[derive(Clone, Debug, Builder, CopyGetters)]
#[builder(pattern = "owned", setter(into, strip_option))]
pub struct UserConfig {
    #[getset(get_copy = "pub")]
    uid: u32,
    #[getset(get_copy = "pub")]
    gid: u32,
}

#[derive(Clone, Debug, Default, Builder, Getters)]
#[builder(default, pattern = "owned", setter(into, strip_option))]
pub struct CapsConfig {
    #[getset(get = "pub")]
    add: Vec<String>,
    #[getset(get = "pub")]
    drop: Vec<String>,
}

#[derive(Clone, Debug, Builder, Getters)]
#[builder(pattern = "owned", setter(into, strip_option))]
pub struct DnsConfig {
    #[getset(get = "pub")]
    hostname: String,
    #[getset(get = "pub")]
    domain: String,
}

/// Opaque for now: networking is an external future collaborator (see the spec preparer's
/// non-goals). Only the declarative `type` survives into this record.
#[derive(Clone, Debug, Default, Builder, Getters)]
#[builder(default, pattern = "owned", setter(into, strip_option))]
pub struct NetworkConfig {
    #[getset(get = "pub")]
    typ: String,
}

#[derive(Clone, Debug, Default, Builder, Getters)]
#[builder(default, pattern = "owned", setter(into, strip_option))]
pub struct SecretsConfig {
    #[getset(get = "pub")]
    target: Option<PathBuf>,
    #[getset(get = "pub")]
    sources: Vec<SecretSource>,
}

#[derive(Clone, Debug, Builder, Getters, CopyGetters)]
#[builder(pattern = "owned", setter(into, strip_option))]
pub struct SecretSource {
    #[getset(get = "pub")]
    path: PathBuf,
    #[getset(get_copy = "pub")]
    copy: bool,
}

#[derive(Clone, Debug, Default, Builder, Getters)]
#[builder(default, pattern = "owned", setter(into, strip_option))]
pub struct VolumesConfig {
    #[getset(get = "pub")]
    shared: Option<PathBuf>,
    #[getset(get = "pub")]
    private: Option<PathBuf>,
    #[getset(get = "pub")]
    mounts: Vec<VolumeMount>,
}

/// One user-declared volume mount, resolved against `type` by the spec preparer.
#[derive(Clone, Debug, Builder, Getters, CopyGetters)]
#[builder(pattern = "owned", setter(into, strip_option))]
pub struct VolumeMount {
    #[getset(get = "pub")]
    destination: PathBuf,

    /// One of `bind`, `shared`, `private`, `runtime`.
    #[getset(get = "pub")]
    typ: String,

    /// Absolute host path when `typ == "bind"`; otherwise a name relative to the resolved base.
    #[getset(get = "pub")]
    source: PathBuf,

    #[getset(get_copy = "pub")]
    readonly: bool,

    /// Use `rbind` instead of `bind` when true.
    #[getset(get_copy = "pub")]
    #[builder(default)]
    recursive: bool,

    #[getset(get_copy = "pub")]
    #[builder(default)]
    mode: Option<u32>,
}

/// A destination/source/type tuple the runtime-dir manager mixes into a container's mount list
/// (secrets, resolv.conf, hostname) ahead of the user-declared ones.
#[derive(Clone, Debug, Getters, CopyGetters)]
pub struct RundirMount {
    #[getset(get = "pub")]
    pub(crate) destination: PathBuf,
    #[getset(get = "pub")]
    pub(crate) source: PathBuf,
    #[getset(get_copy = "pub")]
    pub(crate) readonly: bool,
}

pub type EnvMap = HashMap<String, String>;

#[cfg(test)]
pub mod tests {
    use super::*;

    fn user() -> UserConfig {
        UserConfigBuilder::default().uid(1000u32).gid(1000u32).build().unwrap()
    }

    #[test]
    fn build_minimal_container_config() {
        let cfg = ContainerConfigBuilder::default()
            .name("demo")
            .image(
                ImageConfigBuilder::default()
                    .typ("oci")
                    .path("busybox")
                    .tag("latest")
                    .build()
                    .unwrap(),
            )
            .bundle_path("/var/lib/darkwing/containers/demo")
            .exec(
                ExecConfigBuilder::default()
                    .cmd("/bin/echo".to_string())
                    .args("hello".to_string())
                    .terminal(false)
                    .build()
                    .unwrap(),
            )
            .user(user())
            .dns(
                DnsConfigBuilder::default()
                    .hostname("demo")
                    .domain("darkwing.local")
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap();

        assert_eq!(cfg.name(), "demo");
        assert!(!cfg.exec().terminal());
        assert!(cfg.caps().add().is_empty());
    }

    #[test]
    fn clear_terminal_mutates_only_that_field() {
        let mut exec = ExecConfigBuilder::default()
            .cmd("/bin/cat".to_string())
            .terminal(true)
            .build()
            .unwrap();
        exec.clear_terminal();
        assert!(!exec.terminal());
    }
}
