//! Runs a target's `command` as a child process.

use async_trait::async_trait;
use changed_core::{Error, Result, TargetFiles, TaskRunner, TaskStatus};
use serde_json::Value;
use tokio::process::Command;
use tracing::{debug, info};

/// Executes `command` with trailing arguments and the target's files appended.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellRunner {
    force: bool,
}

impl ShellRunner {
    /// With `force`, a non-zero exit is reported as a non-fatal failure.
    pub fn new(force: bool) -> Self {
        Self { force }
    }
}

/// Program and arguments from a target's `command`, either an argv list or a
/// whitespace-separated string.
fn command_line(task: &str, target: &str, config: &Value) -> Result<Vec<String>> {
    let argv: Vec<String> = match config.get("command") {
        Some(Value::String(line)) => line.split_whitespace().map(ToOwned::to_owned).collect(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str().map(ToOwned::to_owned).ok_or_else(|| {
                    Error::Config(format!(
                        "{task}:{target}: `command` entries must be strings, found {item}"
                    ))
                })
            })
            .collect::<Result<_>>()?,
        _ => Vec::new(),
    };

    if argv.is_empty() {
        return Err(Error::Config(format!("{task}:{target} has no `command`")));
    }
    Ok(argv)
}

#[async_trait]
impl TaskRunner for ShellRunner {
    async fn run_task(
        &self,
        task: &str,
        target: &str,
        config: &Value,
        args: &[String],
    ) -> Result<TaskStatus> {
        let argv = command_line(task, target, config)?;
        let files = TargetFiles::from_config(config)?.sources();
        let Some((program, fixed)) = argv.split_first() else {
            return Err(Error::Config(format!("{task}:{target} has no `command`")));
        };

        info!("Running {task}:{target}");
        debug!("{program} {fixed:?} {args:?} {files:?}");
        let status = Command::new(program)
            .args(fixed)
            .args(args)
            .args(&files)
            .status()
            .await
            .map_err(|error| Error::io(program, error))?;

        if status.success() {
            return Ok(TaskStatus::Succeeded);
        }
        let reason = format!("`{program}` exited with {status}");
        if self.force {
            Ok(TaskStatus::Failed(reason))
        } else {
            Err(Error::TaskFailed {
                task: task.to_owned(),
                target: target.to_owned(),
                reason,
            })
        }
    }
}
