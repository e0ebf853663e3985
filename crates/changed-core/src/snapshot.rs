//! In-memory bookkeeping of target configurations swapped out for a changed run.

use core::fmt;
use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{Error, Result};
use crate::files::FileGroup;
use crate::override_hook::ChangeOverride;

/// Opaque handle to one outstanding snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticket(u64);

impl Ticket {
    /// Numeric value of the ticket, as shown to hosts that schedule post-run steps.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Ticket {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Configuration state captured before a target was rewritten.
#[derive(Clone)]
pub struct Snapshot {
    /// Target configuration exactly as it was before mutation.
    pub original_config: Value,
    /// Groups the wrapped task was restricted to.
    pub changed_groups: Vec<FileGroup>,
    /// Override hook in effect for the run.
    pub override_hook: Arc<dyn ChangeOverride>,
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Snapshot")
            .field("original_config", &self.original_config)
            .field("changed_groups", &self.changed_groups)
            .finish_non_exhaustive()
    }
}

/// Maps tickets to snapshots. Each snapshot can be restored exactly once.
#[derive(Debug)]
pub struct SnapshotRegistry {
    last_ticket: u64,
    entries: HashMap<Ticket, Snapshot>,
}

impl Default for SnapshotRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotRegistry {
    /// Create an empty registry. The first ticket issued is `1`.
    pub fn new() -> Self {
        Self {
            last_ticket: 0,
            entries: HashMap::new(),
        }
    }

    /// Store a snapshot under a freshly minted ticket.
    pub fn take(
        &mut self,
        original_config: Value,
        changed_groups: Vec<FileGroup>,
        override_hook: Arc<dyn ChangeOverride>,
    ) -> Ticket {
        self.last_ticket += 1;
        let ticket = Ticket(self.last_ticket);
        self.entries.insert(
            ticket,
            Snapshot {
                original_config,
                changed_groups,
                override_hook,
            },
        );
        ticket
    }

    /// Remove and return the snapshot for `ticket`.
    ///
    /// # Errors
    /// Returns [`Error::UnknownTicket`] if the ticket was already restored or never issued.
    pub fn restore(&mut self, ticket: Ticket) -> Result<Snapshot> {
        self.entries
            .remove(&ticket)
            .ok_or(Error::UnknownTicket(ticket))
    }

    /// Number of snapshots awaiting restore.
    pub fn outstanding(&self) -> usize {
        self.entries.len()
    }
}
