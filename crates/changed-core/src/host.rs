//! Narrow interfaces to the host that owns task configuration and runs tasks.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Live configuration of tasks and their targets.
pub trait ConfigStore: Send + Sync {
    /// Names of every configured key under `task`, in configuration order.
    ///
    /// # Errors
    /// Returns [`Error::TaskNotFound`] if the task is not configured.
    fn target_names(&self, task: &str) -> Result<Vec<String>>;

    /// Current configuration of `task:target`.
    ///
    /// # Errors
    /// Returns [`Error::TaskNotFound`] or [`Error::TargetNotFound`].
    fn get(&self, task: &str, target: &str) -> Result<Value>;

    /// Replace the configuration of `task:target`.
    ///
    /// # Errors
    /// Returns [`Error::TaskNotFound`] if the task is not configured.
    fn set(&mut self, task: &str, target: &str, config: Value) -> Result<()>;
}

/// How the wrapped task ended when it did not fail fatally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    /// The task completed.
    Succeeded,
    /// The task reported a failure the host chose to continue past.
    Failed(String),
}

/// Executes the wrapped task under its (already mutated) configuration.
#[async_trait]
pub trait TaskRunner: Send + Sync {
    /// Run `task:target` with `config` and trailing `args`.
    ///
    /// # Errors
    /// An error is a fatal failure: the post-run step is skipped and the
    /// target is left with its mutated configuration.
    async fn run_task(
        &self,
        task: &str,
        target: &str,
        config: &Value,
        args: &[String],
    ) -> Result<TaskStatus>;
}

/// Configuration store backed by a JSON object of `{task: {target: config}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryConfigStore {
    tasks: Map<String, Value>,
}

impl MemoryConfigStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store initialised from a `{task: {target: config}}` object.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if `tasks` or any task entry is not an object.
    pub fn from_value(tasks: Value) -> Result<Self> {
        let Value::Object(tasks) = tasks else {
            return Err(Error::Config(format!(
                "task configuration must be an object, found {tasks}"
            )));
        };
        if let Some((name, _)) = tasks.iter().find(|(_, targets)| !targets.is_object()) {
            return Err(Error::Config(format!("task `{name}` must be a table of targets")));
        }
        Ok(Self { tasks })
    }

    /// Add or replace a whole task.
    pub fn insert_task(&mut self, task: impl Into<String>, targets: Map<String, Value>) {
        self.tasks.insert(task.into(), Value::Object(targets));
    }

    fn targets(&self, task: &str) -> Result<&Map<String, Value>> {
        self.tasks
            .get(task)
            .and_then(Value::as_object)
            .ok_or_else(|| Error::TaskNotFound(task.to_owned()))
    }
}

impl ConfigStore for MemoryConfigStore {
    fn target_names(&self, task: &str) -> Result<Vec<String>> {
        Ok(self.targets(task)?.keys().cloned().collect())
    }

    fn get(&self, task: &str, target: &str) -> Result<Value> {
        self.targets(task)?
            .get(target)
            .cloned()
            .ok_or_else(|| Error::TargetNotFound {
                task: task.to_owned(),
                target: target.to_owned(),
            })
    }

    fn set(&mut self, task: &str, target: &str, config: Value) -> Result<()> {
        let targets = self
            .tasks
            .get_mut(task)
            .and_then(Value::as_object_mut)
            .ok_or_else(|| Error::TaskNotFound(task.to_owned()))?;
        targets.insert(target.to_owned(), config);
        Ok(())
    }
}
