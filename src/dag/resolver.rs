// src/dag/resolver.rs

//! Backward resolution from a goal task.
//!
//! Depth-first walk with an explicit stack of enter/exit frames:
//!
//! - entering a task that is still open on the current path is a cycle;
//! - a task whose markers all exist is recorded as skipped and its
//!   dependencies are not examined;
//! - otherwise its dependencies are walked first (in declaration order) and
//!   the task is appended to the plan when its exit frame pops.
//!
//! Every task is scheduled at most once, by [`TaskId`] equality.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::dag::Plan;
use crate::errors::{PipelineError, Result};
use crate::store::{CheckPolicy, CompletionStore, check};
use crate::task::{TaskId, TaskRef};

enum Frame {
    Enter(TaskRef),
    Exit(TaskRef),
}

#[derive(Debug, Clone)]
pub struct Resolver {
    store: Arc<dyn CompletionStore>,
    policy: CheckPolicy,
}

impl Resolver {
    pub fn new(store: Arc<dyn CompletionStore>, policy: CheckPolicy) -> Self {
        Self { store, policy }
    }

    /// Compute the tasks that must run for `goal` to become complete.
    ///
    /// Fails with [`PipelineError::CyclicDependency`] on a cycle and with
    /// [`PipelineError::CompletionCheck`] if a marker cannot be checked; in
    /// both cases nothing has been executed.
    pub async fn resolve(&self, goal: TaskRef) -> Result<Plan> {
        let goal_id = goal.id();
        let mut plan = Plan::new(goal_id.clone());

        // Tasks on the current DFS path, in order, and the same as a set.
        let mut path: Vec<TaskId> = Vec::new();
        let mut visiting: HashSet<TaskId> = HashSet::new();
        // Tasks already scheduled or found complete.
        let mut finished: HashSet<TaskId> = HashSet::new();

        let mut stack = vec![Frame::Enter(goal)];

        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Enter(task) => {
                    let id = task.id();

                    if visiting.contains(&id) {
                        let start = path.iter().position(|p| p == &id).unwrap_or(0);
                        let mut cycle = path[start..].to_vec();
                        cycle.push(id);
                        error!(goal = %goal_id, cycle_len = cycle.len(), "dependency cycle detected");
                        return Err(PipelineError::CyclicDependency { path: cycle });
                    }

                    if finished.contains(&id) {
                        continue;
                    }

                    let markers = task.markers();
                    if check::is_complete(self.store.as_ref(), &markers, &self.policy).await? {
                        debug!(task = %id, "all markers present; not descending");
                        finished.insert(id.clone());
                        plan.skip(id);
                        continue;
                    }

                    visiting.insert(id.clone());
                    path.push(id);

                    let deps = task.dependencies();
                    stack.push(Frame::Exit(task));
                    for dep in deps.into_iter().rev() {
                        stack.push(Frame::Enter(dep));
                    }
                }
                Frame::Exit(task) => {
                    let id = task.id();
                    visiting.remove(&id);
                    path.pop();

                    let deps: Vec<TaskId> = task.dependencies().iter().map(|d| d.id()).collect();
                    debug!(task = %id, position = plan.len(), "scheduled");
                    finished.insert(id);
                    plan.push(task, &deps);
                }
            }
        }

        info!(
            goal = %goal_id,
            scheduled = plan.len(),
            skipped = plan.skipped().len(),
            "resolved pipeline"
        );

        Ok(plan)
    }
}
