//! OCI runtime spec (`config.json`).
//!
//! Models the fields the spec preparer and executor actually read or mutate; everything else in
//! a real `config.json` (resources, seccomp, Solaris/Windows/VM sections, and any future additions
//! to the runtime spec) round-trips losslessly through `extra`, since the preparer must never
//! drop fields it doesn't understand.

use anyhow::{Context, Result};
use derive_builder::Builder;
use getset::{CopyGetters, Getters, Setters};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{
    collections::HashMap,
    fs::File,
    path::{Path, PathBuf},
};

#[derive(PartialEq, Serialize, Deserialize, Debug, Clone, Builder, Getters, Setters)]
#[builder(default, pattern = "owned", setter(into, strip_option))]
/// The base configuration for the container, i.e. `config.json`.
pub struct Spec {
    #[getset(get = "pub", set = "pub")]
    #[serde(rename = "ociVersion")]
    version: String,

    #[getset(get = "pub", set = "pub")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    process: Option<Process>,

    #[getset(get = "pub", set = "pub")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    root: Option<Root>,

    #[getset(get = "pub", set = "pub")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    hostname: Option<String>,

    #[getset(get = "pub", set = "pub")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mounts: Option<Vec<Mount>>,

    #[getset(get = "pub", set = "pub")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    annotations: Option<HashMap<String, String>>,

    #[getset(get = "pub", set = "pub")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    linux: Option<Linux>,

    /// Every field of the runtime spec this crate does not model (cgroups resources, seccomp,
    /// Solaris/Windows/VM sections, ...), preserved verbatim across load/save.
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl Default for Spec {
    fn default() -> Self {
        Self {
            version: "1.0.0".into(),
            process: None,
            root: None,
            hostname: None,
            mounts: None,
            annotations: None,
            linux: None,
            extra: Map::new(),
        }
    }
}

impl Spec {
    /// Loads a spec from the provided file path.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("open file {}", path.display()))?;
        serde_json::from_reader(file)
            .with_context(|| format!("deserialize OCI spec from file {}", path.display()))
    }

    /// Serializes the spec to `path` as tab-indented JSON, matching the format the original
    /// image unpacker and reference runtimes emit.
    pub fn save(&self, path: &Path) -> Result<()> {
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
        let file = File::create(path).with_context(|| format!("create file {}", path.display()))?;
        let mut ser = serde_json::Serializer::with_formatter(file, formatter);
        self.serialize(&mut ser)
            .with_context(|| format!("serialize OCI spec to file {}", path.display()))
    }

    /// Mutable access to `process`, initializing it if absent.
    pub fn process_mut(&mut self) -> &mut Process {
        self.process.get_or_insert_with(Process::default)
    }

    /// Mutable access to `linux`, initializing it if absent.
    pub fn linux_mut(&mut self) -> &mut Linux {
        self.linux.get_or_insert_with(Linux::default)
    }
}

#[derive(PartialEq, Serialize, Deserialize, Debug, Clone, Default, Builder, Getters, Setters)]
#[builder(default, pattern = "owned", setter(into, strip_option))]
/// Information to start the application inside the container.
pub struct Process {
    #[getset(get = "pub", set = "pub")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    terminal: Option<bool>,

    #[getset(get = "pub", set = "pub")]
    user: User,

    #[getset(get = "pub", set = "pub")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    args: Option<Vec<String>>,

    #[getset(get = "pub", set = "pub")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    env: Option<Vec<String>>,

    #[getset(get = "pub", set = "pub")]
    #[serde(default)]
    cwd: String,

    #[getset(get = "pub", set = "pub")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    capabilities: Option<LinuxCapabilities>,

    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl Process {
    /// Mutable access to `user`.
    pub fn user_mut(&mut self) -> &mut User {
        &mut self.user
    }
}

#[derive(PartialEq, Serialize, Deserialize, Debug, Clone, Default, Builder, CopyGetters, Setters)]
#[builder(default, pattern = "owned", setter(into, strip_option))]
pub struct User {
    #[getset(get_copy = "pub", set = "pub")]
    #[serde(default)]
    uid: u32,
    #[getset(get_copy = "pub", set = "pub")]
    #[serde(default)]
    gid: u32,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

#[derive(PartialEq, Eq, Serialize, Deserialize, Debug, Clone, Default, Builder, Getters, Setters)]
#[builder(default, pattern = "owned", setter(into, strip_option))]
/// Kept-capability sets for the process, one list per capability kind.
/// http://man7.org/linux/man-pages/man7/capabilities.7.html
pub struct LinuxCapabilities {
    #[getset(get = "pub", set = "pub")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bounding: Option<Vec<String>>,

    #[getset(get = "pub", set = "pub")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    effective: Option<Vec<String>>,

    #[getset(get = "pub", set = "pub")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inheritable: Option<Vec<String>>,

    #[getset(get = "pub", set = "pub")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    permitted: Option<Vec<String>>,

    #[getset(get = "pub", set = "pub")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ambient: Option<Vec<String>>,
}

#[derive(PartialEq, Eq, Serialize, Deserialize, Debug, Clone, Builder, Getters)]
#[builder(pattern = "owned", setter(into, strip_option))]
pub struct Root {
    #[getset(get = "pub")]
    path: PathBuf,
    #[getset(get = "pub")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    readonly: Option<bool>,
}

#[derive(PartialEq, Eq, Serialize, Deserialize, Debug, Clone, Builder, Getters)]
#[builder(pattern = "owned", setter(into, strip_option))]
/// A mount for a container. Emitted by the spec preparer with `typ = Some("bind")`.
pub struct Mount {
    #[getset(get = "pub")]
    destination: PathBuf,
    #[getset(get = "pub")]
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "type")]
    typ: Option<String>,
    #[getset(get = "pub")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source: Option<PathBuf>,
    #[getset(get = "pub")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    options: Option<Vec<String>>,
}

#[derive(PartialEq, Serialize, Deserialize, Debug, Clone, Default, Builder, Getters, Setters)]
#[builder(default, pattern = "owned", setter(into, strip_option))]
/// Platform-specific configuration for Linux based containers.
pub struct Linux {
    #[getset(get = "pub", set = "pub")]
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "uidMappings")]
    uid_mappings: Option<Vec<LinuxIdMapping>>,

    #[getset(get = "pub", set = "pub")]
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "gidMappings")]
    gid_mappings: Option<Vec<LinuxIdMapping>>,

    #[serde(flatten)]
    extra: Map<String, Value>,
}

#[derive(PartialEq, Eq, Serialize, Deserialize, Debug, Clone, Copy, Builder, CopyGetters, Setters)]
#[builder(pattern = "owned", setter(into, strip_option))]
/// A UID/GID mapping entry: `size` ids starting at `container_id` map to ids starting at
/// `host_id`.
pub struct LinuxIdMapping {
    #[getset(get_copy = "pub", set = "pub")]
    #[serde(rename = "containerID")]
    container_id: u32,
    #[getset(get_copy = "pub", set = "pub")]
    #[serde(rename = "hostID")]
    host_id: u32,
    #[getset(get_copy = "pub", set = "pub")]
    size: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample() -> Spec {
        SpecBuilder::default()
            .version("1.0.0")
            .hostname("demo".to_string())
            .process(
                ProcessBuilder::default()
                    .user(User::default())
                    .cwd("/".to_string())
                    .args(vec!["/bin/sh".to_string()])
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let spec = sample();
        spec.save(&path).unwrap();

        let loaded = Spec::load(&path).unwrap();
        assert_eq!(loaded.hostname().as_deref(), Some("demo"));
        assert_eq!(loaded.process().as_ref().unwrap().cwd(), "/");
    }

    #[test]
    fn unknown_fields_round_trip_through_extra() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"ociVersion":"1.0.0","hostname":"h","linux":{"seccomp":{"defaultAction":"SCMP_ACT_ALLOW"}}}"#,
        )
        .unwrap();

        let spec = Spec::load(&path).unwrap();
        let out = dir.path().join("out.json");
        spec.save(&out).unwrap();

        let raw: Value = serde_json::from_slice(&std::fs::read(&out).unwrap()).unwrap();
        assert_eq!(
            raw["linux"]["seccomp"]["defaultAction"],
            Value::String("SCMP_ACT_ALLOW".to_string())
        );
    }

    #[test]
    fn save_is_tab_indented() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        sample().save(&path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\n\t\""));
    }
}
