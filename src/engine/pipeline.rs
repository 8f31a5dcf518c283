use std::sync::Arc;

use crate::dag::{Plan, Resolver};
use crate::engine::{Executor, ExecutorOptions, RunReport};
use crate::errors::Result;
use crate::store::CompletionStore;
use crate::task::TaskRef;

/// Resolve-then-execute facade over one completion store.
///
/// Calling [`Pipeline::run`] again after a failure re-resolves from scratch,
/// so only the tasks whose markers are still missing run.
#[derive(Debug, Clone)]
pub struct Pipeline {
    resolver: Resolver,
    executor: Executor,
}

impl Pipeline {
    pub fn new(store: Arc<dyn CompletionStore>, options: ExecutorOptions) -> Self {
        Self {
            resolver: Resolver::new(Arc::clone(&store), options.check_policy),
            executor: Executor::new(store, options),
        }
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    /// Resolve only; nothing runs.
    pub async fn plan(&self, goal: TaskRef) -> Result<Plan> {
        self.resolver.resolve(goal).await
    }

    pub async fn run(&self, goal: TaskRef) -> Result<RunReport> {
        let plan = self.resolver.resolve(goal).await?;
        self.executor.execute(&plan).await
    }
}
