// src/engine/mod.rs

//! Execution engine.
//!
//! - [`executor`] runs a resolved plan, sequentially or with a bounded
//!   worker pool, writing and verifying markers after each task.
//! - [`report`] records per-task states for a run.
//! - [`pipeline`] combines the resolver and the executor behind one call.

pub mod executor;
pub mod pipeline;
pub mod report;

pub use executor::{Executor, ExecutorOptions};
pub use pipeline::Pipeline;
pub use report::{RunReport, TaskRecord};
pub use crate::types::TaskState;
