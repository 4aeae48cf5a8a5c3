//! Synchronous interface to the low-level OCI runtime binary (e.g. `runc`) this crate drives
//! through `create`/`start`/`state`/`delete`.
//!
//! The executor's main loop is a blocking `select`/`waitpid` design, so subcommand invocation
//! blocks the calling thread rather than going through an async runtime.

use crate::error::DarkwingError;
use anyhow::{Context, Result};
use derive_builder::Builder;
use dyn_clone::{clone_trait_object, DynClone};
use getset::{CopyGetters, Getters, Setters};
use serde::Deserialize;
use std::{
    fmt::{self, Debug},
    path::{Path, PathBuf},
    process::{Command, Output},
    string::ToString,
};
use strum::{AsRefStr, Display};

#[derive(Builder, Debug, Getters, Setters)]
#[builder(pattern = "owned", setter(into))]
pub struct Runtime {
    #[getset(get, set)]
    #[builder(private, default = "Box::new(DefaultExecCommand)")]
    exec: Box<dyn ExecCommand>,

    #[getset(get = "pub")]
    /// Path to the runtime binary (e.g. `/usr/bin/runc`).
    binary: PathBuf,
}

impl Runtime {
    /// Runs `subcommand` with `global_args` and returns the raw process output. A non-zero exit
    /// is still `Ok`; callers inspect `output.status` and map to a runtime error themselves.
    pub fn run(&self, subcommand: &Subcommand, global_args: &[GlobalArgs]) -> Result<Output> {
        self.exec()
            .run_output(self.binary(), &subcommand.build_cmd()[..], global_args)
    }

    /// Runs `subcommand` and maps a non-zero exit to [`DarkwingError::Runc`], with stderr read as
    /// UTF-8 (lossily, since the runtime's error text is not guaranteed valid UTF-8) and surfaced
    /// verbatim.
    fn run_checked(
        &self,
        name: &str,
        subcommand: &Subcommand,
        global_args: &[GlobalArgs],
    ) -> Result<Output> {
        let output = self.run(subcommand, global_args)?;
        if !output.status.success() {
            return Err(DarkwingError::Runc {
                name: name.to_string(),
                code: output.status.code().unwrap_or(1),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            }
            .into());
        }
        Ok(output)
    }

    /// Invokes `create --bundle BUNDLE --pid-file PIDFILE [--console-socket SOCK] NAME`. On
    /// success the runtime has left a detached init process behind, with the PTY master fd (if
    /// `console_socket` was given) already sent to that socket via `SCM_RIGHTS`.
    pub fn create_container(
        &self,
        state_root: &Path,
        name: &str,
        bundle: &Path,
        pidfile: &Path,
        console_socket: Option<&Path>,
    ) -> Result<()> {
        let mut args = vec![CreateArgs::Bundle(bundle.to_path_buf()), CreateArgs::PidFile(pidfile.to_path_buf())];
        if let Some(sock) = console_socket {
            args.push(CreateArgs::ConsoleSocket(sock.to_path_buf()));
        }
        self.run_checked(
            name,
            &Subcommand::Create((name.to_string(), args)),
            &[GlobalArgs::Root(state_root.to_path_buf())],
        )?;
        Ok(())
    }

    /// Builds a ready-to-spawn [`Command`] for `subcommand`, without running it. The non-tty
    /// container-creation path needs this instead of [`Runtime::create_container`]: it must wire
    /// the `create` subprocess's own stdio directly to socketpair fds (the mechanism by which a
    /// runtime with no console-socket hands stdio to the detached init it execs), which `output()`
    /// cannot express.
    pub fn command(&self, subcommand: &Subcommand, global_args: &[GlobalArgs]) -> Command {
        let mut cmd = Command::new(self.binary());
        cmd.args(subcommand.build_cmd());
        cmd.args(global_args.iter().map(ToString::to_string));
        cmd
    }

    /// Invokes `start NAME`.
    pub fn start_container(&self, state_root: &Path, name: &str) -> Result<()> {
        self.run_checked(
            name,
            &Subcommand::Start(name.to_string()),
            &[GlobalArgs::Root(state_root.to_path_buf())],
        )?;
        Ok(())
    }

    /// Invokes `delete NAME`.
    pub fn delete_container(&self, state_root: &Path, name: &str) -> Result<()> {
        self.run_checked(
            name,
            &Subcommand::Delete(name.to_string()),
            &[GlobalArgs::Root(state_root.to_path_buf())],
        )?;
        Ok(())
    }

    /// Invokes `state NAME` and parses the JSON it prints on stdout.
    pub fn state(&self, state_root: &Path, name: &str) -> Result<State> {
        let output = self.run_checked(
            name,
            &Subcommand::State(name.to_string()),
            &[GlobalArgs::Root(state_root.to_path_buf())],
        )?;
        serde_json::from_slice(&output.stdout)
            .with_context(|| format!("parse state output for container \"{}\"", name))
    }
}

/// The subset of `runtime state`'s JSON output this crate cares about: the lifecycle status and
/// init pid. Other fields (`id`, `bundle`, `annotations`, ...) are not modeled since nothing here
/// reads them.
#[derive(Deserialize, Clone, Debug, Getters, CopyGetters)]
pub struct State {
    #[getset(get = "pub")]
    status: String,
    #[getset(get_copy = "pub")]
    #[serde(default)]
    pid: i32,
}

impl State {
    /// True if the runtime reports this container as `running`.
    pub fn is_running(&self) -> bool {
        self.status == "running"
    }

    /// True if the runtime reports this container as `created`.
    pub fn is_created(&self) -> bool {
        self.status == "created"
    }

    /// True if the runtime reports this container as `stopped`.
    pub fn is_stopped(&self) -> bool {
        self.status == "stopped"
    }
}

#[derive(Clone, Default, Debug)]
struct DefaultExecCommand;

impl ExecCommand for DefaultExecCommand {}

trait ExecCommand: Debug + DynClone + Send + Sync {
    fn run_output(
        &self,
        binary: &std::path::Path,
        cmd: &[String],
        global_args: &[GlobalArgs],
    ) -> Result<Output> {
        Command::new(binary)
            .args(cmd)
            .args(global_args.iter().map(ToString::to_string))
            .output()
            .context("run OCI runtime")
    }
}

clone_trait_object!(ExecCommand);

type ContainerId = String;

#[derive(AsRefStr, Clone, Debug, Hash, Eq, PartialEq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Subcommand {
    /// Create a container
    Create((ContainerId, Vec<CreateArgs>)),
    /// Execute the process inside an already-created container
    Start(ContainerId),
    /// Output the state of a container as JSON on stdout
    State(ContainerId),
    /// Delete any resources held by the container
    Delete(ContainerId),
}

impl Subcommand {
    fn build_cmd(&self) -> Vec<String> {
        use Subcommand::*;
        match self {
            Create((container_id, args)) => self.build_cmd_vec(
                args.iter().map(ToString::to_string).collect(),
                Some(container_id.clone()),
            ),
            Start(container_id) => self.build_cmd_vec(Vec::new(), Some(container_id.clone())),
            State(container_id) => self.build_cmd_vec(Vec::new(), Some(container_id.clone())),
            Delete(container_id) => self.build_cmd_vec(Vec::new(), Some(container_id.clone())),
        }
    }

    fn build_cmd_vec(&self, args: Vec<String>, container_id: Option<String>) -> Vec<String> {
        let mut res = vec![self.to_string()]
            .into_iter()
            .chain(args)
            .collect::<Vec<_>>();
        if let Some(id) = container_id {
            res.push(id);
        }
        res
    }
}

fn write_kv<K, V>(f: &mut fmt::Formatter<'_>, key: K, value: V) -> fmt::Result
where
    K: AsRef<str>,
    V: fmt::Display,
{
    write!(f, "{}={}", key.as_ref(), value)
}

#[derive(AsRefStr, Clone, Debug, Hash, Eq, PartialEq)]
#[strum(serialize_all = "kebab_case")]
/// Global flags valid for any subcommand.
pub enum GlobalArgs {
    /// Enable debug output for logging
    Debug,
    /// Root directory for storage of container state (this should be tmpfs)
    Root(PathBuf),
}

impl fmt::Display for GlobalArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use GlobalArgs::*;
        write!(f, "--")?;
        match self {
            Root(path) => write_kv(f, self, path.display()),
            _ => write!(f, "{}", self.as_ref()),
        }
    }
}

#[derive(AsRefStr, Clone, Debug, Hash, Eq, PartialEq)]
#[strum(serialize_all = "kebab_case")]
/// Arguments for 'create'.
pub enum CreateArgs {
    /// Path to the root of the bundle directory
    Bundle(PathBuf),
    /// Path to an AF_UNIX socket which will receive the PTY master fd via SCM_RIGHTS
    ConsoleSocket(PathBuf),
    /// Specify the file to write the process id to
    PidFile(PathBuf),
    /// Do not use pivot_root
    NoPivot,
    /// Do not create a new session keyring for the container
    NoNewKeyring,
}

impl fmt::Display for CreateArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use CreateArgs::*;
        write!(f, "--")?;
        match self {
            Bundle(path) => write_kv(f, self, path.display()),
            ConsoleSocket(path) => write_kv(f, self, path.display()),
            PidFile(path) => write_kv(f, self, path.display()),
            _ => write!(f, "{}", self.as_ref()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug)]
    struct MockExecCommand(Output);

    impl ExecCommand for MockExecCommand {
        fn run_output(
            &self,
            _binary: &std::path::Path,
            _cmd: &[String],
            _global_args: &[GlobalArgs],
        ) -> Result<Output> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn run_success_create() -> Result<()> {
        let runtime = RuntimeBuilder::default().binary(which::which("echo")?).build()?;
        let sc = Subcommand::Create(("id".to_string(), vec![CreateArgs::NoPivot]));
        let output = runtime.run(&sc, &[GlobalArgs::Debug])?;
        assert!(output.status.success());
        assert_eq!(
            String::from_utf8(output.stdout)?,
            "create --no-pivot id --debug\n"
        );
        Ok(())
    }

    #[test]
    fn run_success_start() -> Result<()> {
        let runtime = RuntimeBuilder::default().binary(which::which("echo")?).build()?;
        let sc = Subcommand::Start("id".to_string());
        let output = runtime.run(&sc, &[GlobalArgs::Root(PathBuf::from("/run/darkwing/ctx"))])?;
        assert_eq!(
            String::from_utf8(output.stdout)?,
            "start id --root=/run/darkwing/ctx\n"
        );
        Ok(())
    }

    #[test]
    fn build_cmd_state_and_delete() {
        assert_eq!(
            Subcommand::State("id".to_string()).build_cmd(),
            vec!["state".to_string(), "id".to_string()]
        );
        assert_eq!(
            Subcommand::Delete("id".to_string()).build_cmd(),
            vec!["delete".to_string(), "id".to_string()]
        );
    }

    #[test]
    fn failure_no_binary() {
        assert!(RuntimeBuilder::default().build().is_err());
    }

    #[test]
    fn arg_display() {
        assert_eq!(&GlobalArgs::Debug.to_string(), "--debug");
        assert_eq!(
            &CreateArgs::Bundle("test".into()).to_string(),
            "--bundle=test"
        );
        assert_eq!(&CreateArgs::NoPivot.to_string(), "--no-pivot");
    }

    #[test]
    fn mock_exec_returns_configured_output() -> Result<()> {
        use std::os::unix::process::ExitStatusExt;
        let runtime = RuntimeBuilder::default()
            .binary(PathBuf::from("/usr/bin/runc"))
            .exec(Box::new(MockExecCommand(Output {
                status: std::process::ExitStatus::from_raw(0),
                stdout: b"{\"status\":\"created\",\"pid\":42}".to_vec(),
                stderr: Vec::new(),
            })) as Box<dyn ExecCommand>)
            .build()?;
        let output = runtime.run(&Subcommand::State("id".to_string()), &[])?;
        assert!(String::from_utf8(output.stdout)?.contains("created"));
        Ok(())
    }

    fn mock_runtime(output: Output) -> Runtime {
        RuntimeBuilder::default()
            .binary(PathBuf::from("/usr/bin/runc"))
            .exec(Box::new(MockExecCommand(output)) as Box<dyn ExecCommand>)
            .build()
            .unwrap()
    }

    #[test]
    fn state_parses_status_and_pid() -> Result<()> {
        use std::os::unix::process::ExitStatusExt;
        let runtime = mock_runtime(Output {
            status: std::process::ExitStatus::from_raw(0),
            stdout: br#"{"status":"running","pid":4242}"#.to_vec(),
            stderr: Vec::new(),
        });
        let state = runtime.state(Path::new("/run/darkwing/ctx"), "demo")?;
        assert!(state.is_running());
        assert_eq!(state.pid(), 4242);
        Ok(())
    }

    #[test]
    fn checked_subcommand_maps_nonzero_exit_to_runc_error() {
        use std::os::unix::process::ExitStatusExt;
        let runtime = mock_runtime(Output {
            status: std::process::ExitStatus::from_raw(1 << 8),
            stdout: Vec::new(),
            stderr: b"exec format error".to_vec(),
        });
        let err = runtime
            .start_container(Path::new("/run/darkwing/ctx"), "demo")
            .unwrap_err();
        let downcast = err.downcast_ref::<DarkwingError>().expect("typed error");
        match downcast {
            DarkwingError::Runc { name, code, stderr } => {
                assert_eq!(name, "demo");
                assert_eq!(*code, 1);
                assert!(stderr.contains("exec format error"));
            }
            other => panic!("unexpected error variant: {:?}", other),
        }
    }
}
