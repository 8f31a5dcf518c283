// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod store;
pub mod task;
pub mod template;
pub mod types;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{PipelineFile, build_goal, effective_params, load_and_validate};
use crate::dag::Plan;
use crate::engine::Pipeline;
use crate::store::{CompletionStore, FsCompletionStore};
use crate::task::Params;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - pipeline file loading and parameter overrides
/// - task graph construction for the goal
/// - the file-backed completion store
/// - resolution and execution (or a dry-run print of the plan)
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)
        .with_context(|| format!("loading pipeline file {:?}", config_path))?;

    let overrides = args.param_overrides();
    let goal_name = args
        .goal
        .clone()
        .or_else(|| cfg.config().goal.clone())
        .ok_or_else(|| anyhow!("no goal task: pass --goal or set [config].goal"))?;

    let goal = build_goal(&cfg, &goal_name, &overrides)
        .with_context(|| format!("building task graph for goal '{goal_name}'"))?;

    let store_root = cfg.store_root(&config_root_dir(&config_path));
    info!(goal = %goal.id(), store = ?store_root, "pipeline loaded");
    let store: Arc<dyn CompletionStore> = Arc::new(FsCompletionStore::new(store_root));

    let mut options = cfg.executor_options();
    if let Some(workers) = args.workers {
        options.workers = usize::from(workers);
    }

    let pipeline = Pipeline::new(store, options);

    if args.dry_run {
        let plan = pipeline.plan(goal).await?;
        print_dry_run(&cfg, &effective_params(&cfg, &overrides)?, &plan, options.workers);
        return Ok(());
    }

    let report = pipeline.run(goal).await?;
    info!(
        goal = %report.goal(),
        executed = report.executed().len(),
        skipped = report.skipped().len(),
        "goal complete"
    );
    Ok(())
}

/// Directory that relative store roots are resolved against.
///
/// - If the config path has a non-empty parent (e.g. "pipelines/Pipedag.toml"),
///   we use that directory.
/// - If it's just a bare filename like "Pipedag.toml" (parent = ""),
///   we fall back to the current working directory "."
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// Dry-run output: effective parameters, tasks to run, tasks already complete.
fn print_dry_run(cfg: &PipelineFile, params: &Params, plan: &Plan, workers: usize) {
    println!("pipedag dry-run");
    println!("  goal = {}", plan.goal());
    println!("  workers = {workers}");
    for (key, value) in params {
        println!("  param {key} = {value}");
    }
    println!();

    println!("would run ({}):", plan.len());
    for (i, task) in plan.tasks().iter().enumerate() {
        let id = task.id();
        println!("  {}. {}", i + 1, id);
        if let Some(task_cfg) = cfg.task(id.kind()) {
            println!("      cmd: {}", task_cfg.cmd);
        }
        let deps = plan.dependencies_of(&id);
        if !deps.is_empty() {
            let names: Vec<String> = deps.iter().map(|d| d.to_string()).collect();
            println!("      after: {}", names.join(", "));
        }
        for marker in task.markers() {
            println!("      marker: {marker}");
        }
    }

    if !plan.skipped().is_empty() {
        println!();
        println!("already complete ({}):", plan.skipped().len());
        for id in plan.skipped() {
            println!("  - {id}");
        }
    }

    debug!("dry-run complete (no execution)");
}
