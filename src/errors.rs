// src/errors.rs

//! Crate-wide error types.
//!
//! - [`PipelineError`] is what resolution and execution return.
//! - [`StoreError`], [`TaskError`] and [`AdapterError`] come from the
//!   completion store, the task descriptor and the external adapter.
//! - [`ConfigError`] covers loading and validating a pipeline definition.

use std::fmt;
use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::task::{Marker, TaskId};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("cyclic dependency: {}", CyclePath(path))]
    CyclicDependency { path: Vec<TaskId> },

    #[error("completion check for marker '{marker}' failed: {source}")]
    CompletionCheck {
        marker: Marker,
        #[source]
        source: StoreError,
    },

    #[error("task {task} failed: {source}")]
    TaskExecution {
        task: TaskId,
        #[source]
        source: TaskError,
    },

    #[error("writing marker '{marker}' for task {task} failed: {source}")]
    MarkerWrite {
        task: TaskId,
        marker: Marker,
        #[source]
        source: StoreError,
    },

    #[error("task {task} succeeded but marker '{marker}' does not exist")]
    MarkerMissing { task: TaskId, marker: Marker },

    #[error("worker running task {task} aborted: {message}")]
    Worker { task: TaskId, message: String },
}

impl PipelineError {
    /// Identity of the task the error is attributed to, if any.
    pub fn task(&self) -> Option<&TaskId> {
        match self {
            PipelineError::TaskExecution { task, .. }
            | PipelineError::MarkerWrite { task, .. }
            | PipelineError::MarkerMissing { task, .. }
            | PipelineError::Worker { task, .. } => Some(task),
            PipelineError::CyclicDependency { path } => path.first(),
            PipelineError::CompletionCheck { .. } => None,
        }
    }
}

struct CyclePath<'a>(&'a [TaskId]);

impl fmt::Display for CyclePath<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, id) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" -> ")?;
            }
            write!(f, "{id}")?;
        }
        Ok(())
    }
}

/// Failure reported by a completion store backend.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backing medium could not answer (network, permissions, IO).
    /// The marker's state is unknown, not absent.
    #[error("transient store failure: {0}")]
    Transient(#[from] io::Error),

    #[error("invalid marker '{marker}': {reason}")]
    InvalidMarker { marker: String, reason: String },
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

/// Failure of a task's `run()`.
#[derive(Error, Debug)]
pub enum TaskError {
    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error("{0}")]
    Failed(String),
}

/// Failure reported by an external task adapter.
#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("failed to spawn command: {0}")]
    Spawn(#[source] io::Error),

    #[error("command exited with status {0}")]
    ExitStatus(i32),

    #[error("command timed out after {0:?}")]
    TimedOut(Duration),

    #[error("IO error while running command: {0}")]
    Io(#[source] io::Error),

    #[error("could not render command: {0}")]
    Template(String),
}

/// Problems with a pipeline definition file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Invalid(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Cycle detected in pipeline: {0}")]
    DagCycle(String),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
