// src/exec/command.rs

//! Shell command adapter.

use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::errors::AdapterError;
use crate::exec::{AdapterConfig, TaskAdapter};
use crate::task::Params;
use crate::template;
use crate::types::BoxFuture;

/// Prefix for the environment variables carrying task parameters.
pub const PARAM_ENV_PREFIX: &str = "PIPEDAG_PARAM_";

/// Runs a command through the platform shell.
///
/// Before spawning, `{name}` placeholders in the command are replaced with
/// the task's parameters, and every parameter is exported as
/// `PIPEDAG_PARAM_<NAME>` (upper-cased, non-alphanumerics mapped to `_`).
/// A zero exit status is success.
#[derive(Debug, Clone)]
pub struct CommandAdapter {
    cmd: String,
    config: AdapterConfig,
}

impl CommandAdapter {
    pub fn new(cmd: impl Into<String>, config: AdapterConfig) -> Self {
        Self {
            cmd: cmd.into(),
            config,
        }
    }

    pub fn command(&self) -> &str {
        &self.cmd
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    async fn run(&self, params: &Params) -> Result<(), AdapterError> {
        let rendered = template::render(&self.cmd, params)
            .map_err(|e| AdapterError::Template(e.to_string()))?;

        // Build a shell command appropriate for the platform.
        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&rendered);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&rendered);
            c
        };

        cmd.envs(&self.config.env);
        for (key, value) in params {
            cmd.env(param_env_var(key), value);
        }
        if let Some(dir) = &self.config.working_dir {
            cmd.current_dir(dir);
        }

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        info!(cmd = %rendered, "starting command");
        let mut child = cmd.spawn().map_err(AdapterError::Spawn)?;

        // Always consume output so pipe buffers don't fill; log at debug.
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, "stdout"));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr, "stderr"));
        }

        let status = match self.config.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(waited) => waited.map_err(AdapterError::Io)?,
                Err(_elapsed) => {
                    warn!(cmd = %rendered, ?limit, "command timed out; killing");
                    if let Err(e) = child.kill().await {
                        warn!(error = %e, "failed to kill timed-out command");
                    }
                    return Err(AdapterError::TimedOut(limit));
                }
            },
            None => child.wait().await.map_err(AdapterError::Io)?,
        };

        let code = status.code().unwrap_or(-1);
        info!(
            cmd = %rendered,
            exit_code = code,
            success = status.success(),
            "command exited"
        );

        if status.success() {
            Ok(())
        } else {
            Err(AdapterError::ExitStatus(code))
        }
    }
}

impl TaskAdapter for CommandAdapter {
    fn execute<'a>(&'a self, params: &'a Params) -> BoxFuture<'a, Result<(), AdapterError>> {
        Box::pin(self.run(params))
    }
}

/// Environment variable name for a task parameter.
pub fn param_env_var(key: &str) -> String {
    let suffix: String = key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("{PARAM_ENV_PREFIX}{suffix}")
}

async fn forward_lines<R>(reader: R, stream: &'static str)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(stream, "{}", line);
    }
}
