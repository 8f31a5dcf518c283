// src/exec/mod.rs

//! External task adapters.
//!
//! A task performs its real-world effect (a remote script, a bulk load, an
//! infrastructure teardown) through a [`TaskAdapter`]. The engine never
//! looks inside; it only sees success or an [`AdapterError`].
//!
//! - [`command`] provides [`CommandAdapter`], which runs a shell command
//!   with the task's parameters in its environment.

pub mod command;

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::AdapterError;
use crate::task::Params;
use crate::types::BoxFuture;

pub use command::CommandAdapter;

/// Boundary through which a task performs its effect.
///
/// Timeouts, if any, are the adapter's business.
pub trait TaskAdapter: Send + Sync + Debug {
    fn execute<'a>(&'a self, params: &'a Params) -> BoxFuture<'a, Result<(), AdapterError>>;
}

/// Settings handed to an adapter at construction time.
///
/// Credentials and other environment travel here explicitly rather than
/// being read from process-wide configuration.
#[derive(Debug, Clone, Default)]
pub struct AdapterConfig {
    /// Extra environment variables for the child process.
    pub env: BTreeMap<String, String>,
    pub working_dir: Option<PathBuf>,
    /// Kill the command if it runs longer than this.
    pub timeout: Option<Duration>,
}
