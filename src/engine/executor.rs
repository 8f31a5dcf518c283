// src/engine/executor.rs

//! Runs a resolved [`Plan`].
//!
//! With one worker (the default) tasks run strictly in plan order. With more
//! workers, a task is dispatched as soon as all of its scheduled
//! dependencies are complete, with at most `workers` tasks in flight.
//!
//! Either way the semantics are all-or-nothing: the first failure stops any
//! further dispatch, in-flight tasks are allowed to finish (there is no
//! mid-task cancellation), and the error is returned with the failing task's
//! identity. Markers written before the failure stay, so the next run
//! resumes from the incomplete suffix.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::dag::Plan;
use crate::engine::RunReport;
use crate::errors::{PipelineError, Result};
use crate::store::{CheckPolicy, CompletionStore, MarkerLocks, check};
use crate::task::TaskRef;
use crate::types::TaskState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorOptions {
    /// Maximum number of tasks running at once. `1` means sequential.
    pub workers: usize,
    /// Retry policy for marker checks performed around each task.
    pub check_policy: CheckPolicy,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            workers: 1,
            check_policy: CheckPolicy::default(),
        }
    }
}

/// What happened to a single dispatched task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskOutcome {
    Ran(Duration),
    /// All markers appeared between resolution and dispatch.
    AlreadyComplete,
}

#[derive(Debug, Clone)]
pub struct Executor {
    store: Arc<dyn CompletionStore>,
    locks: MarkerLocks,
    options: ExecutorOptions,
}

impl Executor {
    pub fn new(store: Arc<dyn CompletionStore>, options: ExecutorOptions) -> Self {
        Self {
            store,
            locks: MarkerLocks::new(),
            options,
        }
    }

    pub fn options(&self) -> &ExecutorOptions {
        &self.options
    }

    /// Execute every task in `plan`.
    pub async fn execute(&self, plan: &Plan) -> Result<RunReport> {
        let mut report = RunReport::new(plan);

        if plan.is_empty() {
            info!(goal = %plan.goal(), "goal already complete; nothing to run");
            return Ok(report);
        }

        info!(
            goal = %plan.goal(),
            tasks = plan.len(),
            skipped = plan.skipped().len(),
            workers = self.options.workers,
            "executing pipeline"
        );

        let result = if self.options.workers <= 1 {
            self.execute_sequential(plan, &mut report).await
        } else {
            self.execute_concurrent(plan, &mut report).await
        };

        match result {
            Ok(()) => {
                info!(
                    goal = %plan.goal(),
                    executed = report.executed().len(),
                    "pipeline complete"
                );
                Ok(report)
            }
            Err(err) => {
                let pending = report
                    .records()
                    .iter()
                    .filter(|r| r.state == TaskState::Pending)
                    .count();
                error!(
                    goal = %plan.goal(),
                    error = %err,
                    completed = report.executed().len(),
                    never_started = pending,
                    "pipeline aborted"
                );
                Err(err)
            }
        }
    }

    async fn execute_sequential(&self, plan: &Plan, report: &mut RunReport) -> Result<()> {
        for (position, task) in plan.tasks().iter().enumerate() {
            report.set_state(position, TaskState::Running);

            let outcome = run_task(
                Arc::clone(task),
                Arc::clone(&self.store),
                self.locks.clone(),
                self.options.check_policy,
            )
            .await;

            match outcome {
                Ok(TaskOutcome::Ran(elapsed)) => report.complete(position, Some(elapsed)),
                Ok(TaskOutcome::AlreadyComplete) => report.complete(position, None),
                Err(err) => {
                    report.set_state(position, TaskState::Failed);
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    async fn execute_concurrent(&self, plan: &Plan, report: &mut RunReport) -> Result<()> {
        let tasks = plan.tasks();
        let mut waiting_on = plan.dependency_counts();
        let mut ready: VecDeque<usize> = waiting_on
            .iter()
            .enumerate()
            .filter(|(_, count)| **count == 0)
            .map(|(position, _)| position)
            .collect();

        let mut in_flight: JoinSet<(usize, Result<TaskOutcome>)> = JoinSet::new();
        let mut spawned: HashMap<tokio::task::Id, usize> = HashMap::new();
        let mut first_error: Option<PipelineError> = None;

        loop {
            while first_error.is_none() && in_flight.len() < self.options.workers {
                let Some(position) = ready.pop_front() else {
                    break;
                };
                let task = Arc::clone(&tasks[position]);
                debug!(task = %task.id(), in_flight = in_flight.len(), "dispatching");
                report.set_state(position, TaskState::Running);

                let store = Arc::clone(&self.store);
                let locks = self.locks.clone();
                let policy = self.options.check_policy;
                let handle = in_flight.spawn(async move {
                    (position, run_task(task, store, locks, policy).await)
                });
                spawned.insert(handle.id(), position);
            }

            let Some(joined) = in_flight.join_next().await else {
                break;
            };

            match joined {
                Ok((position, Ok(outcome))) => {
                    let elapsed = match outcome {
                        TaskOutcome::Ran(elapsed) => Some(elapsed),
                        TaskOutcome::AlreadyComplete => None,
                    };
                    report.complete(position, elapsed);
                    for dependent in plan.dependent_positions(position) {
                        waiting_on[dependent] -= 1;
                        if waiting_on[dependent] == 0 {
                            ready.push_back(dependent);
                        }
                    }
                }
                Ok((position, Err(err))) => {
                    report.set_state(position, TaskState::Failed);
                    record_failure(&mut first_error, err);
                }
                Err(join_err) => {
                    let Some(&position) = spawned.get(&join_err.id()) else {
                        warn!(error = %join_err, "unknown worker aborted");
                        continue;
                    };
                    report.set_state(position, TaskState::Failed);
                    record_failure(
                        &mut first_error,
                        PipelineError::Worker {
                            task: tasks[position].id(),
                            message: join_err.to_string(),
                        },
                    );
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn record_failure(first_error: &mut Option<PipelineError>, err: PipelineError) {
    if first_error.is_none() {
        info!("failure observed; no further tasks will be dispatched");
        *first_error = Some(err);
    } else {
        warn!(error = %err, "additional task failure while draining in-flight tasks");
    }
}

/// Run one task under its marker locks: re-check, run, write missing
/// markers, verify.
async fn run_task(
    task: TaskRef,
    store: Arc<dyn CompletionStore>,
    locks: MarkerLocks,
    policy: CheckPolicy,
) -> Result<TaskOutcome> {
    let id = task.id();
    let markers = task.markers();
    let _guard = locks.acquire(&markers).await;

    if check::is_complete(store.as_ref(), &markers, &policy).await? {
        info!(task = %id, "markers appeared since resolution; not running");
        return Ok(TaskOutcome::AlreadyComplete);
    }

    info!(task = %id, markers = markers.len(), "running task");
    let started = Instant::now();

    if let Err(source) = task.run().await {
        error!(task = %id, error = %source, "task failed");
        return Err(PipelineError::TaskExecution { task: id, source });
    }

    let contents = format!("{id}\n");
    for marker in check::missing_markers(store.as_ref(), &markers, &policy).await? {
        debug!(task = %id, marker = %marker, "recording marker");
        store
            .record(&marker, &contents)
            .await
            .map_err(|source| PipelineError::MarkerWrite {
                task: id.clone(),
                marker: marker.clone(),
                source,
            })?;
    }

    if let Some(marker) = check::missing_markers(store.as_ref(), &markers, &policy)
        .await?
        .into_iter()
        .next()
    {
        error!(task = %id, marker = %marker, "marker missing after successful run");
        return Err(PipelineError::MarkerMissing { task: id, marker });
    }

    let elapsed = started.elapsed();
    info!(
        task = %id,
        elapsed_ms = elapsed.as_millis() as u64,
        "task complete"
    );
    Ok(TaskOutcome::Ran(elapsed))
}
