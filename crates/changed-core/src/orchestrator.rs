//! The changed-run protocol: filter, swap configuration, run, restore and commit.

use std::sync::{Arc, Mutex};

use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::config::ChangedOptions;
use crate::error::Result;
use crate::files::{FileGroup, TargetFiles};
use crate::filter::ChangeFilter;
use crate::hash_store::{self, HashStore};
use crate::host::{ConfigStore, TaskRunner, TaskStatus};
use crate::override_hook::{AlwaysInclude, ChangeOverride, NoOverride};
use crate::snapshot::{SnapshotRegistry, Ticket};
use crate::sync::LockUnpoisoned as _;

/// Target names that configure a task rather than describe a runnable target.
fn is_runnable_target(name: &str) -> bool {
    !name.starts_with('_') && name != "options"
}

/// Handle for one in-flight changed run, consumed by [`Orchestrator::finish`].
#[derive(Debug)]
#[must_use = "a pending session must be finished to restore the target configuration"]
pub struct Session {
    ticket: Ticket,
    task: String,
    target: String,
    changed: Vec<FileGroup>,
}

impl Session {
    /// Ticket of the saved snapshot.
    pub fn ticket(&self) -> Ticket {
        self.ticket
    }

    /// Task being run.
    pub fn task(&self) -> &str {
        &self.task
    }

    /// Target being run.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Groups the target was restricted to.
    pub fn changed(&self) -> &[FileGroup] {
        &self.changed
    }
}

/// Result of [`Orchestrator::prepare`].
#[derive(Debug)]
pub enum Prepared {
    /// Nothing changed; configuration was left untouched.
    Unchanged,
    /// Configuration was rewritten and must be restored with [`Orchestrator::finish`].
    Pending(Session),
}

/// Outcome of the post-run step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReport {
    /// Source paths whose hashes were committed, in order.
    pub committed: Vec<String>,
}

/// What a full changed run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// No changed files; the task was not run.
    Unchanged,
    /// The task ran and post-run completed.
    Completed {
        /// How the task ended.
        status: TaskStatus,
        /// Commit performed by post-run.
        commit: CommitReport,
    },
}

/// Summary of a changed run of one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Task name.
    pub task: String,
    /// Target name.
    pub target: String,
    /// What happened.
    pub outcome: RunOutcome,
}

/// Drives changed runs for any number of task targets.
pub struct Orchestrator {
    options: ChangedOptions,
    override_hook: Arc<dyn ChangeOverride>,
    permits: Arc<Semaphore>,
    registry: Mutex<SnapshotRegistry>,
}

impl Orchestrator {
    /// Create an orchestrator. Files listed in `options.always` are force-included.
    pub fn new(options: ChangedOptions) -> Self {
        let override_hook: Arc<dyn ChangeOverride> = if options.always.is_empty() {
            Arc::new(NoOverride)
        } else {
            Arc::new(AlwaysInclude::new(options.always.iter().cloned()))
        };
        let permits = Arc::new(Semaphore::new(options.max_open_files.max(1)));

        Self {
            options,
            override_hook,
            permits,
            registry: Mutex::new(SnapshotRegistry::new()),
        }
    }

    /// Replace the override hook.
    #[must_use]
    pub fn with_override(mut self, override_hook: Arc<dyn ChangeOverride>) -> Self {
        self.override_hook = override_hook;
        self
    }

    /// Options in effect.
    pub fn options(&self) -> &ChangedOptions {
        &self.options
    }

    /// Number of sessions prepared but not yet finished.
    pub fn outstanding(&self) -> usize {
        self.registry.lock_unpoisoned().outstanding()
    }

    fn filter_for(&self, task: &str, target: &str, hook: Arc<dyn ChangeOverride>) -> ChangeFilter {
        let store = HashStore::new(&self.options.cache, task, target, Arc::clone(&self.permits));
        ChangeFilter::new(store, hook, self.options.max_open_files)
    }

    /// Runnable targets of `task`, skipping `options` and `_`-prefixed entries.
    ///
    /// # Errors
    /// Returns an error if the task is not configured.
    pub fn targets(store: &dyn ConfigStore, task: &str) -> Result<Vec<String>> {
        Ok(store
            .target_names(task)?
            .into_iter()
            .filter(|name| is_runnable_target(name))
            .collect())
    }

    /// Changed groups of `task:target` without touching configuration or hashes.
    ///
    /// # Errors
    /// Returns an error if the target is unknown, malformed, or a file cannot be hashed.
    pub async fn changed_groups(
        &self,
        store: &dyn ConfigStore,
        task: &str,
        target: &str,
    ) -> Result<Vec<FileGroup>> {
        let config = store.get(task, target)?;
        let files = TargetFiles::from_config(&config)?;
        self.filter_for(task, target, Arc::clone(&self.override_hook))
            .filter_groups(&files.groups)
            .await
    }

    /// Filter `task:target` and, if anything changed, rewrite its live
    /// configuration to the changed files and save the original.
    ///
    /// # Errors
    /// Returns an error if the target is unknown, malformed, or a file cannot
    /// be hashed. Configuration is untouched in every error case.
    pub async fn prepare(
        &self,
        store: &mut dyn ConfigStore,
        task: &str,
        target: &str,
    ) -> Result<Prepared> {
        let original = store.get(task, target)?;
        let files = TargetFiles::from_config(&original)?;
        let changed = self
            .filter_for(task, target, Arc::clone(&self.override_hook))
            .filter_groups(&files.groups)
            .await?;

        if changed.is_empty() {
            info!("No changed files to process.");
            return Ok(Prepared::Unchanged);
        }

        let mutated = files.rewrite(&original, &changed)?;
        store.set(task, target, mutated)?;

        let ticket = self.registry.lock_unpoisoned().take(
            original,
            changed.clone(),
            Arc::clone(&self.override_hook),
        );
        info!(
            "Running {task}:{target} on {} changed file(s)",
            changed.iter().map(|group| group.src.len()).sum::<usize>()
        );

        Ok(Prepared::Pending(Session {
            ticket,
            task: task.to_owned(),
            target: target.to_owned(),
            changed,
        }))
    }

    /// Post-run step: commit hashes for the changed files, then put the
    /// original configuration back.
    ///
    /// The original configuration is restored even when committing fails, so
    /// the next run sees the full target again and reprocesses the files
    /// whose hashes were not written.
    ///
    /// # Errors
    /// Returns [`crate::Error::UnknownTicket`] if the session's snapshot is
    /// gone, or an I/O error if committing fails.
    pub async fn finish(
        &self,
        store: &mut dyn ConfigStore,
        session: Session,
    ) -> Result<CommitReport> {
        let Session {
            ticket,
            task,
            target,
            ..
        } = session;
        let snapshot = self.registry.lock_unpoisoned().restore(ticket)?;

        let written = self
            .filter_for(&task, &target, snapshot.override_hook)
            .write_hashes(&snapshot.changed_groups)
            .await;
        store.set(&task, &target, snapshot.original_config)?;

        Ok(CommitReport {
            committed: written?,
        })
    }

    /// Give up on a session without committing any hash: the original
    /// configuration is put back and the snapshot is released.
    ///
    /// # Errors
    /// Returns [`crate::Error::UnknownTicket`] if the session's snapshot is
    /// gone, or the store's error if the configuration cannot be written.
    pub fn abandon(&self, store: &mut dyn ConfigStore, session: Session) -> Result<()> {
        let Session {
            ticket,
            task,
            target,
            ..
        } = session;
        let snapshot = self.registry.lock_unpoisoned().restore(ticket)?;
        store.set(&task, &target, snapshot.original_config)?;
        warn!("Abandoned {task}:{target}, no hashes committed");
        Ok(())
    }

    /// Full changed run of one target: prepare, run the task, finish.
    ///
    /// A [`TaskStatus::Failed`] result still goes through post-run. A runner
    /// error skips post-run: the session is abandoned and the error propagates.
    ///
    /// # Errors
    /// Returns the first error from filtering, the runner, or post-run.
    pub async fn run(
        &self,
        store: &mut dyn ConfigStore,
        runner: &dyn TaskRunner,
        task: &str,
        target: &str,
        args: &[String],
    ) -> Result<RunReport> {
        let outcome = match self.prepare(store, task, target).await? {
            Prepared::Unchanged => RunOutcome::Unchanged,
            Prepared::Pending(session) => {
                let attempt = match store.get(task, target) {
                    Ok(config) => runner.run_task(task, target, &config, args).await,
                    Err(error) => Err(error),
                };
                let status = match attempt {
                    Ok(status) => status,
                    Err(error) => {
                        if let Err(restore_error) = self.abandon(store, session) {
                            warn!("Failed to restore {task}:{target}: {restore_error}");
                        }
                        return Err(error);
                    }
                };
                if let TaskStatus::Failed(reason) = &status {
                    warn!("{task}:{target} failed, continuing: {reason}");
                }
                let commit = self.finish(store, session).await?;
                RunOutcome::Completed { status, commit }
            }
        };

        Ok(RunReport {
            task: task.to_owned(),
            target: target.to_owned(),
            outcome,
        })
    }

    /// Run every runnable target of `task` in configuration order.
    ///
    /// # Errors
    /// Stops at the first failing target.
    pub async fn run_all(
        &self,
        store: &mut dyn ConfigStore,
        runner: &dyn TaskRunner,
        task: &str,
        args: &[String],
    ) -> Result<Vec<RunReport>> {
        let mut reports = Vec::new();
        for target in Self::targets(store, task)? {
            reports.push(self.run(store, runner, task, &target, args).await?);
        }
        Ok(reports)
    }

    /// Delete cached hashes for a target, a task, or everything.
    ///
    /// # Errors
    /// See [`hash_store::clean`].
    pub async fn clean(&self, task: Option<&str>, target: Option<&str>) -> Result<bool> {
        hash_store::clean(&self.options.cache, task, target).await
    }
}
