// src/engine/report.rs

//! Per-run bookkeeping returned by the executor.

use std::time::Duration;

use crate::dag::Plan;
use crate::task::TaskId;
use crate::types::TaskState;

/// Final state of one scheduled task.
#[derive(Debug, Clone)]
pub struct TaskRecord {
    pub id: TaskId,
    pub state: TaskState,
    /// Wall time spent in `run()` plus marker writes, when the task ran.
    pub elapsed: Option<Duration>,
}

/// Summary of a pipeline run.
#[derive(Debug, Clone)]
pub struct RunReport {
    goal: TaskId,
    /// Scheduled tasks in plan order.
    records: Vec<TaskRecord>,
    /// Tasks in the order they reached `Complete`.
    executed: Vec<TaskId>,
    skipped: Vec<TaskId>,
}

impl RunReport {
    pub(crate) fn new(plan: &Plan) -> Self {
        Self {
            goal: plan.goal().clone(),
            records: plan
                .ids()
                .into_iter()
                .map(|id| TaskRecord {
                    id,
                    state: TaskState::Pending,
                    elapsed: None,
                })
                .collect(),
            executed: Vec::new(),
            skipped: plan.skipped().to_vec(),
        }
    }

    pub(crate) fn set_state(&mut self, position: usize, state: TaskState) {
        if let Some(record) = self.records.get_mut(position) {
            record.state = state;
        }
    }

    pub(crate) fn complete(&mut self, position: usize, elapsed: Option<Duration>) {
        if let Some(record) = self.records.get_mut(position) {
            record.state = TaskState::Complete;
            record.elapsed = elapsed;
            self.executed.push(record.id.clone());
        }
    }

    pub fn goal(&self) -> &TaskId {
        &self.goal
    }

    pub fn records(&self) -> &[TaskRecord] {
        &self.records
    }

    /// Tasks completed by this run, in completion order.
    pub fn executed(&self) -> &[TaskId] {
        &self.executed
    }

    /// Tasks found complete during resolution.
    pub fn skipped(&self) -> &[TaskId] {
        &self.skipped
    }

    /// `Skipped` for resolver-pruned tasks, `None` for unknown ids.
    pub fn state_of(&self, id: &TaskId) -> Option<TaskState> {
        if let Some(record) = self.records.iter().find(|r| &r.id == id) {
            return Some(record.state);
        }
        self.skipped
            .contains(id)
            .then_some(TaskState::Skipped)
    }

    pub fn is_success(&self) -> bool {
        self.records
            .iter()
            .all(|r| r.state == TaskState::Complete)
    }
}
