// src/config/model.rs

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::engine::ExecutorOptions;
use crate::store::CheckPolicy;
use crate::task::Params;

/// Pipeline definition as read from a TOML file, before validation.
///
/// ```toml
/// [config]
/// goal = "shutdown"
/// workers = 1
///
/// [store]
/// root = ".pipedag/markers"
///
/// [params]
/// output_base_path = "s3://my-bucket/wiki"
///
/// [task.extract]
/// cmd = "run-extract {output_base_path}"
/// markers = ["{output_base_path}/extract"]
///
/// [task.transform]
/// cmd = "run-transform {output_base_path}"
/// after = ["extract"]
/// ```
///
/// All sections except `[task.*]` are optional.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPipelineFile {
    #[serde(default)]
    pub config: ConfigSection,

    #[serde(default)]
    pub store: StoreSection,

    /// Global parameters; tasks pick the ones that form their identity.
    #[serde(default)]
    pub params: BTreeMap<String, ParamValue>,

    /// Extra environment for every command (credentials, endpoints).
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// All tasks from `[task.<name>]`, keyed by task name.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// Validated pipeline definition. Built via `TryFrom<RawPipelineFile>`.
#[derive(Debug, Clone)]
pub struct PipelineFile {
    config: ConfigSection,
    store: StoreSection,
    params: Params,
    env: BTreeMap<String, String>,
    task: BTreeMap<String, TaskConfig>,
}

impl PipelineFile {
    pub(crate) fn new_unchecked(raw: RawPipelineFile) -> Self {
        Self {
            config: raw.config,
            store: raw.store,
            params: raw
                .params
                .into_iter()
                .map(|(key, value)| (key, value.to_string()))
                .collect(),
            env: raw.env,
            task: raw.task,
        }
    }

    pub fn config(&self) -> &ConfigSection {
        &self.config
    }

    pub fn store(&self) -> &StoreSection {
        &self.store
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    pub fn tasks(&self) -> &BTreeMap<String, TaskConfig> {
        &self.task
    }

    pub fn task(&self, name: &str) -> Option<&TaskConfig> {
        self.task.get(name)
    }

    pub fn check_policy(&self) -> CheckPolicy {
        CheckPolicy {
            attempts: self.config.check_attempts,
            backoff: Duration::from_millis(self.config.check_backoff_ms),
        }
    }

    pub fn executor_options(&self) -> ExecutorOptions {
        ExecutorOptions {
            workers: self.config.workers,
            check_policy: self.check_policy(),
        }
    }

    /// Store root, resolved against `base` when relative.
    pub fn store_root(&self, base: &Path) -> PathBuf {
        if self.store.root.is_absolute() {
            self.store.root.clone()
        } else {
            base.join(&self.store.root)
        }
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Goal task used when none is given on the command line.
    #[serde(default)]
    pub goal: Option<String>,

    /// Maximum concurrently running tasks; 1 runs strictly in order.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Attempts per marker check when the store reports a transient failure.
    #[serde(default = "default_check_attempts")]
    pub check_attempts: u32,

    #[serde(default = "default_check_backoff_ms")]
    pub check_backoff_ms: u64,
}

fn default_workers() -> usize {
    1
}

fn default_check_attempts() -> u32 {
    3
}

fn default_check_backoff_ms() -> u64 {
    200
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            goal: None,
            workers: default_workers(),
            check_attempts: default_check_attempts(),
            check_backoff_ms: default_check_backoff_ms(),
        }
    }
}

/// `[store]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreSection {
    /// Directory holding marker files. Relative paths are resolved against
    /// the directory of the pipeline file.
    #[serde(default = "default_store_root")]
    pub root: PathBuf,
}

fn default_store_root() -> PathBuf {
    PathBuf::from(".pipedag/markers")
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            root: default_store_root(),
        }
    }
}

/// A parameter value. Numbers and booleans are accepted for convenience and
/// stringified.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Text(s) => f.write_str(s),
            ParamValue::Int(n) => write!(f, "{n}"),
            ParamValue::Float(n) => write!(f, "{n}"),
            ParamValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// `[task.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    /// Command to run; may reference `{param}` placeholders. Shell `${VAR}`
    /// expansions pass through unchanged; `{{` and `}}` are literal braces.
    pub cmd: String,

    /// Tasks that must be complete before this one runs.
    #[serde(default)]
    pub after: Vec<String>,

    /// Global parameters that form this task's identity and are passed to
    /// the command. `None` means all of them.
    #[serde(default)]
    pub params: Option<Vec<String>>,

    /// Marker templates. `None` gives a single token marker named after the
    /// task and its parameter fingerprint.
    #[serde(default)]
    pub markers: Option<Vec<String>>,

    /// Duration string such as `"30m"`.
    #[serde(default)]
    pub timeout: Option<String>,

    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

impl TaskConfig {
    /// Names of the global parameters this task uses.
    pub fn effective_params<'a>(&'a self, globals: &'a Params) -> Vec<&'a str> {
        match &self.params {
            Some(names) => names.iter().map(String::as_str).collect(),
            None => globals.keys().map(String::as_str).collect(),
        }
    }
}
