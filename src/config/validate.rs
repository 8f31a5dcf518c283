// src/config/validate.rs

use std::collections::BTreeSet;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{PipelineFile, RawPipelineFile, TaskConfig};
use crate::errors::ConfigError;
use crate::template;
use crate::types::parse_duration;

type Result<T> = std::result::Result<T, ConfigError>;

impl TryFrom<RawPipelineFile> for PipelineFile {
    type Error = ConfigError;

    fn try_from(raw: RawPipelineFile) -> Result<Self> {
        validate_raw_config(&raw)?;
        Ok(PipelineFile::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawPipelineFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_global_config(cfg)?;
    validate_task_dependencies(cfg)?;
    validate_task_templates(cfg)?;
    validate_dag(cfg)?;
    Ok(())
}

fn ensure_has_tasks(cfg: &RawPipelineFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(ConfigError::Invalid(
            "pipeline must contain at least one [task.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawPipelineFile) -> Result<()> {
    if cfg.config.workers == 0 {
        return Err(ConfigError::Invalid(
            "[config].workers must be >= 1 (got 0)".to_string(),
        ));
    }

    if cfg.config.check_attempts == 0 {
        return Err(ConfigError::Invalid(
            "[config].check_attempts must be >= 1 (got 0)".to_string(),
        ));
    }

    if let Some(goal) = &cfg.config.goal {
        if !cfg.task.contains_key(goal) {
            return Err(ConfigError::TaskNotFound(format!(
                "[config].goal refers to unknown task '{}'",
                goal
            )));
        }
    }

    Ok(())
}

fn validate_task_dependencies(cfg: &RawPipelineFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        for dep in task.after.iter() {
            if !cfg.task.contains_key(dep) {
                return Err(ConfigError::Invalid(format!(
                    "task '{}' has unknown dependency '{}' in `after`",
                    name, dep
                )));
            }
            if dep == name {
                return Err(ConfigError::Invalid(format!(
                    "task '{}' cannot depend on itself in `after`",
                    name
                )));
            }
        }
    }
    Ok(())
}

fn validate_task_templates(cfg: &RawPipelineFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        let available = task_param_names(cfg, name, task)?;

        let mut templates = vec![task.cmd.as_str()];
        if let Some(markers) = &task.markers {
            if markers.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "task '{}' has an empty `markers` list; omit it to use a token marker",
                    name
                )));
            }
            templates.extend(markers.iter().map(String::as_str));
        }

        for tpl in templates {
            for placeholder in template::placeholders(tpl) {
                if !available.contains(placeholder.as_str()) {
                    return Err(ConfigError::Invalid(format!(
                        "task '{}' references '{{{}}}' which is not one of its parameters",
                        name, placeholder
                    )));
                }
            }
        }

        if let Some(timeout) = &task.timeout {
            parse_duration(timeout).map_err(|e| {
                ConfigError::Invalid(format!("task '{}' has invalid timeout: {}", name, e))
            })?;
        }
    }
    Ok(())
}

fn task_param_names<'a>(
    cfg: &'a RawPipelineFile,
    name: &str,
    task: &'a TaskConfig,
) -> Result<BTreeSet<&'a str>> {
    match &task.params {
        None => Ok(cfg.params.keys().map(String::as_str).collect()),
        Some(names) => {
            for param in names {
                if !cfg.params.contains_key(param) {
                    return Err(ConfigError::Invalid(format!(
                        "task '{}' lists unknown parameter '{}' in `params`",
                        name, param
                    )));
                }
            }
            Ok(names.iter().map(String::as_str).collect())
        }
    }
}

fn validate_dag(cfg: &RawPipelineFile) -> Result<()> {
    // Edge direction: dep -> task
    // For:
    //   [task.B]
    //   after = ["A"]
    // we add edge A -> B.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.task.keys() {
        graph.add_node(name.as_str());
    }

    for (name, task) in cfg.task.iter() {
        for dep in task.after.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    // A topological sort will fail if there is a cycle.
    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => {
            let node = cycle.node_id();
            Err(ConfigError::DagCycle(format!(
                "cycle detected in pipeline involving task '{}'",
                node
            )))
        }
    }
}
