//! Hash comparison over paths and file groups.

use std::collections::HashSet;
use std::sync::Arc;

use futures::{StreamExt as _, TryStreamExt as _, stream};
use tokio::fs as async_fs;
use tracing::debug;

use crate::error::{Error, Result};
use crate::files::FileGroup;
use crate::hash_store::HashStore;
use crate::override_hook::{ChangeOverride, OverrideDetails};

/// Decides which source files of one task target changed since the last commit.
pub struct ChangeFilter {
    store: HashStore,
    override_hook: Arc<dyn ChangeOverride>,
    concurrency: usize,
}

impl ChangeFilter {
    /// Create a filter reading committed hashes from `store`.
    ///
    /// `concurrency` bounds how many paths (and groups) are examined at once;
    /// the store's semaphore separately bounds open file handles.
    pub fn new(
        store: HashStore,
        override_hook: Arc<dyn ChangeOverride>,
        concurrency: usize,
    ) -> Self {
        Self {
            store,
            override_hook,
            concurrency: concurrency.max(1),
        }
    }

    /// Underlying hash store.
    pub fn store(&self) -> &HashStore {
        &self.store
    }

    /// Whether `path` differs from its committed hash, or the override hook
    /// asks for it anyway.
    ///
    /// # Errors
    /// Returns an error if either hash cannot be obtained or the hook fails.
    pub async fn is_changed(&self, path: &str) -> Result<bool> {
        let (previous, current) =
            tokio::try_join!(self.store.get(path), self.store.content_hash(path))?;

        if previous.as_deref() != Some(current.as_str()) {
            debug!("{path}: changed");
            return Ok(true);
        }

        let details = OverrideDetails::new(path, &self.store);
        let forced = self.override_hook.include(&details).await?;
        if forced {
            debug!("{path}: unchanged, included by override");
        } else {
            debug!("{path}: unchanged");
        }
        Ok(forced)
    }

    /// The subset of `paths` that changed, in input order.
    ///
    /// # Errors
    /// The first failure aborts the whole operation; no partial result is returned.
    pub async fn filter_paths(&self, paths: &[String]) -> Result<Vec<String>> {
        let decisions: Vec<bool> = stream::iter(paths)
            .map(|path| self.is_changed(path))
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        Ok(paths
            .iter()
            .zip(decisions)
            .filter(|&(_, changed)| changed)
            .map(|(path, _)| path.clone())
            .collect())
    }

    /// Filter every group and reduce it with [`reduce_group`], keeping group order.
    ///
    /// # Errors
    /// The first failure in any group aborts the whole operation.
    pub async fn filter_groups(&self, groups: &[FileGroup]) -> Result<Vec<FileGroup>> {
        let reduced: Vec<Option<FileGroup>> = stream::iter(groups)
            .map(|group| self.filter_group(group))
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        Ok(reduced.into_iter().flatten().collect())
    }

    async fn filter_group(&self, group: &FileGroup) -> Result<Option<FileGroup>> {
        let changed = self.filter_paths(&group.src).await?;
        let dest_exists = match &group.dest {
            Some(dest) => async_fs::try_exists(dest)
                .await
                .map_err(|error| Error::io(dest, error))?,
            None => true,
        };
        Ok(reduce_group(group, changed, dest_exists))
    }

    /// Compute and commit the current hash of every source path in `groups`.
    ///
    /// Returns the committed paths in order, each once.
    ///
    /// # Errors
    /// The first read or write failure aborts the commit.
    pub async fn write_hashes(&self, groups: &[FileGroup]) -> Result<Vec<String>> {
        let mut seen = HashSet::new();
        let paths: Vec<&String> = groups
            .iter()
            .flat_map(|group| group.src.iter())
            .filter(|path| seen.insert(path.as_str()))
            .collect();

        stream::iter(paths)
            .map(|path| async move {
                let hash = self.store.content_hash(path).await?;
                self.store.put(path, &hash).await?;
                debug!("{path}: committed {hash}");
                Ok::<_, Error>(path.clone())
            })
            .buffered(self.concurrency)
            .try_collect()
            .await
    }
}

/// Decide what remains of `group` given its changed sources.
///
/// - A declared destination that does not exist keeps the whole group.
/// - Otherwise, if any source changed, a fan-in group is kept whole and an
///   in-place group shrinks to the changed sources.
/// - Otherwise the group is dropped.
pub fn reduce_group(group: &FileGroup, changed: Vec<String>, dest_exists: bool) -> Option<FileGroup> {
    if group.dest.is_some() && !dest_exists {
        Some(group.clone())
    } else if changed.is_empty() {
        None
    } else if group.is_fan_in() {
        Some(group.clone())
    } else {
        Some(group.with_src(changed))
    }
}
