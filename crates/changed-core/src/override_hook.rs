//! Caller-supplied hooks that can force an unchanged file into a run.
//!
//! A hook is only consulted for files whose content hash matches the committed
//! one. It can add such a file to the changed set but never remove a file whose
//! hash differs.

use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;
use crate::hash_store::HashStore;

/// What a hook gets to look at for one file.
#[derive(Debug, Clone, Copy)]
pub struct OverrideDetails<'store> {
    /// Path of the file under consideration.
    pub path: &'store str,
    store: &'store HashStore,
}

impl<'store> OverrideDetails<'store> {
    /// Details for `path`, answering hash queries through `store`.
    pub fn new(path: &'store str, store: &'store HashStore) -> Self {
        Self { path, store }
    }

    /// Task being run.
    pub fn task(&self) -> &str {
        self.store.task()
    }

    /// Target being run.
    pub fn target(&self) -> &str {
        self.store.target()
    }

    /// Re-read the committed hash for this file.
    ///
    /// # Errors
    /// Returns an error if the hash file exists but cannot be read.
    pub async fn previous_hash(&self) -> Result<Option<String>> {
        self.store.get(self.path).await
    }

    /// Recompute the content hash of this file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read.
    pub async fn current_hash(&self) -> Result<String> {
        self.store.content_hash(self.path).await
    }
}

/// Decides whether an unchanged file should be included anyway.
#[async_trait]
pub trait ChangeOverride: Send + Sync {
    /// Return `true` to include the file in the changed set.
    ///
    /// # Errors
    /// An error aborts the whole filter operation.
    async fn include(&self, details: &OverrideDetails<'_>) -> Result<bool>;
}

/// Default hook: equal hashes always mean unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOverride;

#[async_trait]
impl ChangeOverride for NoOverride {
    async fn include(&self, _details: &OverrideDetails<'_>) -> Result<bool> {
        Ok(false)
    }
}

/// Always includes the listed files, matched by full path or by file name.
#[derive(Debug, Clone, Default)]
pub struct AlwaysInclude {
    entries: HashSet<String>,
}

impl AlwaysInclude {
    /// Hook forcing the given paths or file names.
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: entries.into_iter().map(Into::into).collect(),
        }
    }

    fn matches(&self, path: &str) -> bool {
        self.entries.contains(path)
            || Path::new(path)
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| self.entries.contains(name))
    }
}

#[async_trait]
impl ChangeOverride for AlwaysInclude {
    async fn include(&self, details: &OverrideDetails<'_>) -> Result<bool> {
        Ok(self.matches(details.path))
    }
}

/// Adapts a synchronous closure into a hook.
pub struct FnOverride<F>(F);

impl<F> FnOverride<F>
where
    F: Fn(&OverrideDetails<'_>) -> bool + Send + Sync,
{
    /// Wrap `decide` as a hook.
    pub fn new(decide: F) -> Self {
        Self(decide)
    }
}

#[async_trait]
impl<F> ChangeOverride for FnOverride<F>
where
    F: Fn(&OverrideDetails<'_>) -> bool + Send + Sync,
{
    async fn include(&self, details: &OverrideDetails<'_>) -> Result<bool> {
        Ok((self.0)(details))
    }
}
