use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use pipedag::errors::TaskError;
use pipedag::task::{Marker, Task, TaskId, TaskRef};
use pipedag::types::BoxFuture;
use tracing::info;

#[derive(Debug, Clone, Default)]
struct Declaration {
    deps: Vec<String>,
    markers: Vec<Marker>,
}

#[derive(Debug, Default)]
struct GraphState {
    declared: HashMap<String, Declaration>,
    failing: HashSet<String>,
    delays: HashMap<String, Duration>,
    runs: Vec<String>,
    running: usize,
    max_running: usize,
}

/// A set of in-memory tasks that refer to each other by name.
///
/// Dependencies are looked up when `dependencies()` is called, so graphs may
/// be declared in any order and may contain cycles (which the resolver is
/// expected to reject). Every `run()` is logged and can be made to fail or
/// to take a while.
#[derive(Debug, Clone, Default)]
pub struct FakeGraph {
    state: Arc<Mutex<GraphState>>,
}

impl FakeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, GraphState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Declare (or redeclare) task `name`.
    pub fn add(&self, name: &str, deps: &[&str], markers: &[&str]) -> TaskRef {
        let declaration = Declaration {
            deps: deps.iter().map(|d| d.to_string()).collect(),
            markers: markers.iter().map(|m| Marker::from(*m)).collect(),
        };
        self.lock().declared.insert(name.to_string(), declaration);
        self.get(name)
    }

    /// Handle to task `name`. The task need not be declared yet.
    pub fn get(&self, name: &str) -> TaskRef {
        Arc::new(FakeTask {
            name: name.to_string(),
            graph: self.clone(),
        })
    }

    /// Make every subsequent run of `name` fail.
    pub fn fail(&self, name: &str) {
        self.lock().failing.insert(name.to_string());
    }

    pub fn heal(&self, name: &str) {
        self.lock().failing.remove(name);
    }

    pub fn set_delay(&self, name: &str, delay: Duration) {
        self.lock().delays.insert(name.to_string(), delay);
    }

    /// Names of the tasks whose `run()` was invoked, in invocation order.
    pub fn runs(&self) -> Vec<String> {
        self.lock().runs.clone()
    }

    pub fn run_count(&self, name: &str) -> usize {
        self.lock().runs.iter().filter(|r| *r == name).count()
    }

    pub fn clear_runs(&self) {
        self.lock().runs.clear();
    }

    /// Highest number of tasks observed inside `run()` at the same time.
    pub fn max_concurrency(&self) -> usize {
        self.lock().max_running
    }
}

/// Task handle produced by [`FakeGraph`]. Its identity is just its name.
pub struct FakeTask {
    name: String,
    graph: FakeGraph,
}

impl fmt::Debug for FakeTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FakeTask").field("name", &self.name).finish()
    }
}

impl FakeTask {
    fn declaration(&self) -> Declaration {
        self.graph
            .lock()
            .declared
            .get(&self.name)
            .cloned()
            .unwrap_or_default()
    }
}

impl Task for FakeTask {
    fn id(&self) -> TaskId {
        TaskId::new(self.name.clone())
    }

    fn dependencies(&self) -> Vec<TaskRef> {
        self.declaration()
            .deps
            .iter()
            .map(|dep| self.graph.get(dep))
            .collect()
    }

    fn markers(&self) -> Vec<Marker> {
        self.declaration().markers
    }

    fn run(&self) -> BoxFuture<'_, Result<(), TaskError>> {
        Box::pin(async move {
            let (delay, fails) = {
                let mut state = self.graph.lock();
                state.runs.push(self.name.clone());
                state.running += 1;
                state.max_running = state.max_running.max(state.running);
                (
                    state.delays.get(&self.name).copied(),
                    state.failing.contains(&self.name),
                )
            };
            info!(task = %self.name, "fake task running");

            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            self.graph.lock().running -= 1;

            if fails {
                Err(TaskError::Failed(format!("{} was told to fail", self.name)))
            } else {
                Ok(())
            }
        })
    }
}
