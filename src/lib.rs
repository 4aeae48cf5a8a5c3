//! `darkwing`: a host-side supervisor for OCI containers.
//!
//! Prepares a container's bundle and `config.json`, manages its runtime directory (lockfile,
//! pidfile, console socket), and drives a low-level OCI runtime binary (`runc` or compatible)
//! through `create` → `start` → run → `delete` while bridging host/container I/O and signals.
//! See [`Executor`] for the entry point.

pub mod capability;
pub mod config;
pub mod container;
pub mod error;
pub mod executor;
pub mod io_pump;
pub mod lock;
pub mod oci;
pub mod rundir;
pub mod signal;
pub mod sys;

pub use config::{Context, ContainerConfig};
pub use container::{Container, Status};
pub use error::DarkwingError;
pub use executor::Executor;
pub use oci::runtime::{Runtime, State};
