// tests/command_adapter.rs

#![cfg(unix)]

use std::collections::BTreeMap;
use std::error::Error;
use std::fs;
use std::sync::Arc;
use std::time::{Duration, Instant};

use pipedag::errors::{AdapterError, TaskError};
use pipedag::exec::command::param_env_var;
use pipedag::exec::{AdapterConfig, CommandAdapter, TaskAdapter};
use pipedag::task::{ExternalTask, Params, Task, TaskId};
use pipedag::template;
use pipedag_test_utils::init_tracing;

type TestResult = Result<(), Box<dyn Error>>;

fn params(pairs: &[(&str, &str)]) -> Params {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[tokio::test]
async fn zero_exit_is_success() -> TestResult {
    init_tracing();
    let adapter = CommandAdapter::new("true", AdapterConfig::default());
    adapter.execute(&Params::new()).await?;
    Ok(())
}

#[tokio::test]
async fn non_zero_exit_reports_status() {
    init_tracing();
    let adapter = CommandAdapter::new("echo oops >&2; exit 7", AdapterConfig::default());

    let err = adapter.execute(&Params::new()).await.expect_err("exit 7");
    assert!(matches!(err, AdapterError::ExitStatus(7)));
}

#[tokio::test]
async fn placeholders_env_and_working_dir_reach_the_command() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let mut env = BTreeMap::new();
    env.insert("WAREHOUSE_HOST".to_string(), "db.internal".to_string());

    let adapter = CommandAdapter::new(
        "echo \"{table} $PIPEDAG_PARAM_RUN_DATE $WAREHOUSE_HOST\" > out.txt",
        AdapterConfig {
            env,
            working_dir: Some(dir.path().to_path_buf()),
            timeout: None,
        },
    );

    adapter
        .execute(&params(&[("table", "pageviews"), ("run-date", "2024-05-01")]))
        .await?;

    let written = fs::read_to_string(dir.path().join("out.txt"))?;
    assert_eq!(written, "pageviews 2024-05-01 db.internal\n");
    Ok(())
}

#[tokio::test]
async fn timeout_kills_long_running_command() {
    init_tracing();
    let adapter = CommandAdapter::new(
        "sleep 10",
        AdapterConfig {
            timeout: Some(Duration::from_millis(100)),
            ..AdapterConfig::default()
        },
    );

    let started = Instant::now();
    let err = adapter.execute(&Params::new()).await.expect_err("timeout");

    assert!(matches!(err, AdapterError::TimedOut(_)));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn unknown_placeholder_fails_before_spawning() {
    let adapter = CommandAdapter::new("echo {missing}", AdapterConfig::default());

    let err = adapter.execute(&Params::new()).await.expect_err("render");
    assert!(matches!(err, AdapterError::Template(_)));
}

#[tokio::test]
async fn external_task_passes_its_parameters_to_the_adapter() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let adapter = CommandAdapter::new(
        "printf %s {date} > stamp",
        AdapterConfig {
            working_dir: Some(dir.path().to_path_buf()),
            ..AdapterConfig::default()
        },
    );
    let task = ExternalTask::new(
        TaskId::new("stamp").with_param("date", "2024-05-01"),
        Arc::new(adapter),
    )
    .with_marker("stamp/2024-05-01");

    task.run().await?;

    assert_eq!(fs::read_to_string(dir.path().join("stamp"))?, "2024-05-01");
    assert_eq!(task.markers().len(), 1);
    Ok(())
}

#[tokio::test]
async fn external_task_wraps_adapter_failure() {
    let task = ExternalTask::new(
        TaskId::new("broken"),
        Arc::new(CommandAdapter::new("exit 2", AdapterConfig::default())),
    );

    let err = task.run().await.expect_err("exit 2");
    assert!(matches!(err, TaskError::Adapter(AdapterError::ExitStatus(2))));
}

#[test]
fn parameter_names_map_to_env_vars() {
    assert_eq!(param_env_var("table"), "PIPEDAG_PARAM_TABLE");
    assert_eq!(param_env_var("run-date"), "PIPEDAG_PARAM_RUN_DATE");
    assert_eq!(param_env_var("a.b"), "PIPEDAG_PARAM_A_B");
}

#[test]
fn templates_render_and_escape_braces() {
    let p = params(&[("base", "s3://b/wiki"), ("n", "3")]);

    assert_eq!(
        template::render("{base}/part-{n}", &p).as_deref(),
        Ok("s3://b/wiki/part-3")
    );
    assert_eq!(
        template::render("awk '{{print}}' {base}", &p).as_deref(),
        Ok("awk '{print}' s3://b/wiki")
    );
    assert_eq!(
        template::placeholders("{a} {b} {a} {{c}}"),
        vec!["a".to_string(), "b".to_string()]
    );

    let err = template::render("{nope}", &p).expect_err("unknown");
    assert_eq!(err.name, "nope");
}

#[test]
fn shell_expansions_are_not_placeholders() {
    let p = params(&[("table", "pageviews")]);

    assert!(template::placeholders("echo ${HOME} {table}") == vec!["table".to_string()]);
    assert_eq!(
        template::render("load {table} to ${WAREHOUSE_HOST}:$PORT", &p).as_deref(),
        Ok("load pageviews to ${WAREHOUSE_HOST}:$PORT")
    );
    // An escaped brace after `$` still renders as a literal brace.
    assert_eq!(
        template::render("echo ${{table}}", &p).as_deref(),
        Ok("echo ${table}")
    );
}

#[tokio::test]
async fn braced_shell_variables_reach_the_shell() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let mut env = BTreeMap::new();
    env.insert("WAREHOUSE_HOST".to_string(), "db.internal".to_string());

    let adapter = CommandAdapter::new(
        "printf '%s@%s' {table} ${WAREHOUSE_HOST} > target",
        AdapterConfig {
            env,
            working_dir: Some(dir.path().to_path_buf()),
            timeout: None,
        },
    );
    adapter.execute(&params(&[("table", "pageviews")])).await?;

    assert_eq!(
        fs::read_to_string(dir.path().join("target"))?,
        "pageviews@db.internal"
    );
    Ok(())
}
