//! Incremental task execution.
//!
//! Wraps a host task so that it only sees the source files whose content
//! changed since the last successful run. Content hashes are stored under a
//! cache directory per task target, the target's configuration is rewritten to
//! the changed files for the duration of the run, and a post-run step commits
//! the new hashes and restores the original configuration.
#![cfg_attr(
    test,
    allow(
        dead_code,
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::missing_panics_doc,
        clippy::missing_errors_doc,
        clippy::print_stdout,
        clippy::print_stderr,
        reason = "Allow for tests"
    )
)]

/// Options loaded from a tasks or options file.
pub mod config;
/// Error types and result definitions.
pub mod error;
/// File groups and configuration shapes.
pub mod files;
/// Change detection over paths and groups.
pub mod filter;
/// Persistent per-file hash storage.
pub mod hash_store;
/// Interfaces to the host configuration store and task runner.
pub mod host;
/// The run protocol tying everything together.
pub mod orchestrator;
/// Hooks forcing unchanged files into a run.
pub mod override_hook;
/// Saved configurations awaiting restore.
pub mod snapshot;
/// Poison-tolerant locking.
pub mod sync;

pub use config::ChangedOptions;
pub use error::{Error, Result};
pub use files::{FileGroup, FilesShape, TargetFiles};
pub use filter::{ChangeFilter, reduce_group};
pub use hash_store::{HashStore, clean};
pub use host::{ConfigStore, MemoryConfigStore, TaskRunner, TaskStatus};
pub use orchestrator::{CommitReport, Orchestrator, Prepared, RunOutcome, RunReport, Session};
pub use override_hook::{AlwaysInclude, ChangeOverride, FnOverride, NoOverride, OverrideDetails};
pub use snapshot::{Snapshot, SnapshotRegistry, Ticket};
