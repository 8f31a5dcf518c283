use std::collections::BTreeMap;

use pipedag::config::{
    ConfigSection, ParamValue, PipelineFile, RawPipelineFile, StoreSection, TaskConfig,
};

/// Builder for `PipelineFile` to simplify test setup.
pub struct PipelineFileBuilder {
    config: RawPipelineFile,
}

impl PipelineFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawPipelineFile {
                config: ConfigSection::default(),
                store: StoreSection::default(),
                params: BTreeMap::new(),
                env: BTreeMap::new(),
                task: BTreeMap::new(),
            },
        }
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.config.task.insert(name.to_string(), task);
        self
    }

    pub fn with_param(mut self, key: &str, value: &str) -> Self {
        self.config
            .params
            .insert(key.to_string(), ParamValue::Text(value.to_string()));
        self
    }

    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.config.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_goal(mut self, goal: &str) -> Self {
        self.config.config.goal = Some(goal.to_string());
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.config.config.workers = workers;
        self
    }

    pub fn raw(self) -> RawPipelineFile {
        self.config
    }

    pub fn build(self) -> PipelineFile {
        PipelineFile::try_from(self.config).expect("Failed to build valid pipeline from builder")
    }
}

impl Default for PipelineFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new(cmd: &str) -> Self {
        Self {
            task: TaskConfig {
                cmd: cmd.to_string(),
                after: vec![],
                params: None,
                markers: None,
                timeout: None,
                working_dir: None,
            },
        }
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.task.after.push(dep.to_string());
        self
    }

    pub fn param(mut self, name: &str) -> Self {
        self.task
            .params
            .get_or_insert_with(Vec::new)
            .push(name.to_string());
        self
    }

    pub fn no_params(mut self) -> Self {
        self.task.params = Some(vec![]);
        self
    }

    pub fn marker(mut self, template: &str) -> Self {
        self.task
            .markers
            .get_or_insert_with(Vec::new)
            .push(template.to_string());
        self
    }

    pub fn timeout(mut self, duration: &str) -> Self {
        self.task.timeout = Some(duration.to_string());
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}
