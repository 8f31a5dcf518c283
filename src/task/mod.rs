// src/task/mod.rs

//! Task descriptors.
//!
//! A task declares its identity ([`TaskId`]), its prerequisites, the
//! [`Marker`]s that prove its output exists, and a `run` step that performs
//! the real effect through an external adapter.
//!
//! - [`id`] holds the structural identity and parameter mapping.
//! - [`marker`] holds the marker newtype.
//! - [`ExternalTask`] is the general-purpose descriptor that delegates `run`
//!   to a [`TaskAdapter`].

pub mod id;
pub mod marker;

use std::fmt::Debug;
use std::sync::Arc;

use tracing::debug;

use crate::errors::TaskError;
use crate::exec::TaskAdapter;
use crate::types::BoxFuture;

pub use id::{Params, TaskId};
pub use marker::Marker;

/// Shared handle to a task. Dependency lists hold these.
pub type TaskRef = Arc<dyn Task>;

/// A unit of work in a pipeline.
///
/// Implementations are value objects: build them fresh for every resolution
/// pass and keep `id()` deterministic so completion lookups stay consistent.
pub trait Task: Send + Sync + Debug {
    fn id(&self) -> TaskId;

    /// Prerequisites, in declaration order.
    fn dependencies(&self) -> Vec<TaskRef> {
        Vec::new()
    }

    /// Markers whose joint existence means this task is complete.
    ///
    /// A task without markers is never considered complete.
    fn markers(&self) -> Vec<Marker>;

    /// Perform the task's effect.
    ///
    /// Must be safe to invoke again after a previous attempt died part-way.
    /// No retries happen in here.
    fn run(&self) -> BoxFuture<'_, Result<(), TaskError>>;
}

/// Task whose effect is performed by a [`TaskAdapter`], receiving the task's
/// parameters.
#[derive(Debug, Clone)]
pub struct ExternalTask {
    id: TaskId,
    deps: Vec<TaskRef>,
    markers: Vec<Marker>,
    adapter: Arc<dyn TaskAdapter>,
}

impl ExternalTask {
    pub fn new(id: TaskId, adapter: Arc<dyn TaskAdapter>) -> Self {
        Self {
            id,
            deps: Vec::new(),
            markers: Vec::new(),
            adapter,
        }
    }

    pub fn with_dependency(mut self, dep: TaskRef) -> Self {
        self.deps.push(dep);
        self
    }

    pub fn with_marker(mut self, marker: impl Into<Marker>) -> Self {
        self.markers.push(marker.into());
        self
    }
}

impl Task for ExternalTask {
    fn id(&self) -> TaskId {
        self.id.clone()
    }

    fn dependencies(&self) -> Vec<TaskRef> {
        self.deps.clone()
    }

    fn markers(&self) -> Vec<Marker> {
        self.markers.clone()
    }

    fn run(&self) -> BoxFuture<'_, Result<(), TaskError>> {
        Box::pin(async move {
            debug!(task = %self.id, "invoking external adapter");
            self.adapter.execute(self.id.params()).await?;
            Ok(())
        })
    }
}
