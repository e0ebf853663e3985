//! Subcommand handlers.

use std::path::{Path, PathBuf};

use anyhow::Result;
use changed_core::{Orchestrator, RunOutcome, RunReport, TaskStatus};
use tracing::info;

use crate::runner::ShellRunner;
use crate::tasks_file::TasksFile;

fn orchestrator_for(tasks: &TasksFile, cache: Option<PathBuf>) -> Orchestrator {
    let mut options = tasks.options.clone();
    if let Some(dir) = cache {
        options.cache = dir;
    }
    Orchestrator::new(options)
}

fn log_report(report: &RunReport) {
    let RunReport {
        task,
        target,
        outcome,
    } = report;
    match outcome {
        RunOutcome::Unchanged => info!("{task}:{target} is up to date"),
        RunOutcome::Completed { status, commit } => {
            let verdict = match status {
                TaskStatus::Succeeded => "succeeded",
                TaskStatus::Failed(_) => "failed",
            };
            info!(
                "{task}:{target} {verdict}, committed {} file(s)",
                commit.committed.len()
            );
        }
    }
}

/// Run one target, or every runnable target of `task`.
///
/// # Errors
/// Returns an error if the tasks file is invalid, filtering fails, or the
/// command fails without `force`.
pub async fn handle_run(
    file: &Path,
    cache: Option<PathBuf>,
    task: &str,
    target: Option<&str>,
    force: bool,
    args: &[String],
) -> Result<()> {
    let mut tasks = TasksFile::load(file)?;
    let orchestrator = orchestrator_for(&tasks, cache);
    let runner = ShellRunner::new(force);

    let reports = match target {
        Some(name) => vec![
            orchestrator
                .run(&mut tasks.store, &runner, task, name, args)
                .await?,
        ],
        None => {
            orchestrator
                .run_all(&mut tasks.store, &runner, task, args)
                .await?
        }
    };
    reports.iter().for_each(log_report);

    Ok(())
}

/// List the files the next run of `task:target` would process.
///
/// # Errors
/// Returns an error if the tasks file is invalid or a source cannot be hashed.
pub async fn handle_status(
    file: &Path,
    cache: Option<PathBuf>,
    task: &str,
    target: &str,
) -> Result<()> {
    let tasks = TasksFile::load(file)?;
    let orchestrator = orchestrator_for(&tasks, cache);

    let changed = orchestrator
        .changed_groups(&tasks.store, task, target)
        .await?;
    let paths: Vec<&String> = changed.iter().flat_map(|group| group.src.iter()).collect();

    if paths.is_empty() {
        info!("No changed files");
    }
    for path in paths {
        info!("{path}");
    }

    Ok(())
}

/// Delete cached hashes.
///
/// # Errors
/// Returns an error for a target without a task or if removal fails.
pub async fn handle_clean(
    file: &Path,
    cache: Option<PathBuf>,
    task: Option<&str>,
    target: Option<&str>,
) -> Result<()> {
    let tasks = TasksFile::load_or_default(file)?;
    let orchestrator = orchestrator_for(&tasks, cache);

    if !orchestrator.clean(task, target).await? {
        info!("Nothing to clean");
    }

    Ok(())
}
