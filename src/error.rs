//! Error handling helpers and primitives.
//!
//! Plumbing code (spec overlay, runtime-dir setup, subcommand argument building) threads
//! `anyhow::Result` the way the rest of this crate does. The executor's lifecycle, whose return
//! code a caller needs to match on, uses the typed taxonomy below instead.

use anyhow::Error;
use thiserror::Error as ThisError;

/// Chain creates a string from an error stack, used for the single-line
/// `Error for container "NAME": MESSAGE` report on fatal errors.
pub fn chain(res: Error) -> String {
    res.chain()
        .map(|x| x.to_string())
        .collect::<Vec<_>>()
        .join(": ")
}

pub type Result<T> = std::result::Result<T, DarkwingError>;

/// Typed error taxonomy for conditions the executor must distinguish when mapping a failed
/// lifecycle onto a process return code.
#[derive(ThisError, Debug)]
pub enum DarkwingError {
    /// Malformed user configuration, raised before any child process exists.
    #[error("configuration error: {0}")]
    Config(String),

    /// Non-zero exit from the OCI runtime subcommand.
    #[error("runtime invocation for container \"{name}\" failed: {stderr}")]
    Runc {
        name: String,
        code: i32,
        stderr: String,
    },

    /// A live lockfile or pidfile indicates the bundle is already in use.
    #[error("container \"{name}\" already in use by pid {pid}")]
    StateConflict { name: String, pid: i32 },

    /// Console-socket delivered zero fds, or an unexpected runtime-reported status.
    #[error("unexpected child protocol for container \"{name}\": {reason}")]
    ChildProtocol { name: String, reason: String },

    /// `create_container` attempted after the executor's `_closing` flag is set.
    #[error("executor is shutting down, refusing to create container \"{0}\"")]
    ShutdownRace(String),

    #[error("uninitialized field: {0}")]
    Builder(#[from] derive_builder::UninitializedFieldError),
}

impl DarkwingError {
    /// Returns the exit code an embedding binary should propagate for this error, per the error
    /// handling design: a runtime invocation error carries its own code; anything else is 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            DarkwingError::Runc { code, .. } => *code,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn chain() {
        let first = anyhow!("error 1");
        let second = anyhow!("error 2");

        let res = super::chain(first.context(second));

        assert_eq!(res, "error 2: error 1");
    }

    #[test]
    fn exit_code_runc_uses_runtime_code() {
        let e = DarkwingError::Runc {
            name: "c1".into(),
            code: 137,
            stderr: "oom".into(),
        };
        assert_eq!(e.exit_code(), 137);
    }

    #[test]
    fn exit_code_other_collapses_to_one() {
        let e = DarkwingError::ShutdownRace("c1".into());
        assert_eq!(e.exit_code(), 1);
    }
}
