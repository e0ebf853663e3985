use core::result::Result as CoreResult;
use std::io::Error as IoError;
use std::path::PathBuf;

use thiserror::Error;
use toml::de::Error as TomlError;

use crate::snapshot::Ticket;

/// Result type for change-detection operations.
pub type Result<T> = CoreResult<T, Error>;

/// Errors that can occur while filtering, running or committing a changed run.
#[derive(Debug, Error)]
pub enum Error {
    /// Reading or writing a source file or a cached hash failed.
    #[error("IO error on {}: {source}", path.display())]
    Io {
        /// Path that was being accessed.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: IoError,
    },

    /// A target configuration or options file is malformed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The host configuration store has no such task.
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    /// The host configuration store has no such target for the task.
    #[error("Target not found: {task}:{target}")]
    TargetNotFound {
        /// Task name.
        task: String,
        /// Target name.
        target: String,
    },

    /// A snapshot ticket was restored twice or never issued.
    #[error("Failed to find ticket {0} in snapshot registry")]
    UnknownTicket(Ticket),

    /// The wrapped task failed in a way the host considers fatal.
    #[error("Task {task}:{target} failed: {reason}")]
    TaskFailed {
        /// Task name.
        task: String,
        /// Target name.
        target: String,
        /// Host-supplied failure description.
        reason: String,
    },

    /// TOML deserialization of an options file failed.
    #[error("TOML deserialization error: {0}")]
    Toml(#[from] TomlError),
}

impl Error {
    /// Wraps an I/O error together with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: IoError) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error comes from caller misuse rather than the filesystem.
    ///
    /// Configuration errors abort a run the same way I/O errors do, but they
    /// point at a broken task setup or a broken run/post-run pairing.
    pub fn is_fatal_config(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::TaskNotFound(_)
                | Self::TargetNotFound { .. }
                | Self::UnknownTicket(_)
                | Self::Toml(_)
        )
    }
}
