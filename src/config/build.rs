// src/config/build.rs

//! Turn a validated [`PipelineFile`] into a graph of tasks.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::config::model::PipelineFile;
use crate::errors::ConfigError;
use crate::exec::{AdapterConfig, CommandAdapter};
use crate::task::{ExternalTask, Marker, Params, TaskId, TaskRef};
use crate::template;
use crate::types::parse_duration;

/// Build the task named `goal` and, transitively, its dependencies.
///
/// `overrides` replace global parameter values (e.g. from `--param`); keys
/// that are not declared in `[params]` are rejected. Tasks reachable through
/// several paths are built once and shared.
pub fn build_goal(
    cfg: &PipelineFile,
    goal: &str,
    overrides: &Params,
) -> Result<TaskRef, ConfigError> {
    let mut factory = TaskFactory::new(cfg, overrides)?;
    factory.build(goal)
}

/// Global parameters with `overrides` applied.
pub fn effective_params(cfg: &PipelineFile, overrides: &Params) -> Result<Params, ConfigError> {
    let mut params = cfg.params().clone();
    for (key, value) in overrides {
        match params.get_mut(key) {
            Some(slot) => *slot = value.clone(),
            None => {
                return Err(ConfigError::Invalid(format!(
                    "unknown parameter '{}' (declare it under [params])",
                    key
                )));
            }
        }
    }
    Ok(params)
}

struct TaskFactory<'a> {
    cfg: &'a PipelineFile,
    params: Params,
    built: HashMap<String, TaskRef>,
}

impl<'a> TaskFactory<'a> {
    fn new(cfg: &'a PipelineFile, overrides: &Params) -> Result<Self, ConfigError> {
        Ok(Self {
            cfg,
            params: effective_params(cfg, overrides)?,
            built: HashMap::new(),
        })
    }

    // Recursion depth is bounded by the longest dependency chain; the config
    // was checked for cycles during validation.
    fn build(&mut self, name: &str) -> Result<TaskRef, ConfigError> {
        if let Some(task) = self.built.get(name) {
            return Ok(Arc::clone(task));
        }

        let cfg = self.cfg;
        let task_cfg = cfg
            .task(name)
            .ok_or_else(|| ConfigError::TaskNotFound(name.to_string()))?;

        let mut deps = Vec::with_capacity(task_cfg.after.len());
        for dep in &task_cfg.after {
            deps.push(self.build(dep)?);
        }

        let mut params = Params::new();
        for key in task_cfg.effective_params(cfg.params()) {
            let value = self.params.get(key).ok_or_else(|| {
                ConfigError::Invalid(format!("task '{}' uses unknown parameter '{}'", name, key))
            })?;
            params.insert(key.to_string(), value.clone());
        }
        let id = TaskId::from_params(name, params);

        let markers = match &task_cfg.markers {
            Some(templates) => templates
                .iter()
                .map(|tpl| {
                    template::render(tpl, id.params())
                        .map(Marker::from)
                        .map_err(|e| ConfigError::Invalid(e.to_string()))
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => vec![Marker::from(id.token_name())],
        };

        let timeout = task_cfg
            .timeout
            .as_deref()
            .map(parse_duration)
            .transpose()
            .map_err(|e| ConfigError::Invalid(format!("task '{}': {}", name, e)))?;

        let adapter = CommandAdapter::new(
            task_cfg.cmd.clone(),
            AdapterConfig {
                env: cfg.env().clone(),
                working_dir: task_cfg.working_dir.clone(),
                timeout,
            },
        );

        debug!(task = %id, markers = ?markers, "built task from config");

        let mut task = ExternalTask::new(id, Arc::new(adapter));
        for dep in deps {
            task = task.with_dependency(dep);
        }
        for marker in markers {
            task = task.with_marker(marker);
        }

        let task: TaskRef = Arc::new(task);
        self.built.insert(name.to_string(), Arc::clone(&task));
        Ok(task)
    }
}
