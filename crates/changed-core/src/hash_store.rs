//! Filesystem-backed storage of committed content hashes.
//!
//! Layout: `<cache>/<task>/<target>/hashes/<digest of path string>`, one file
//! per tracked source path holding the hex digest of its last committed content.

use std::io::{Error as IoError, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest as _, Sha256};
use tokio::fs::{self as async_fs, File};
use tokio::io::AsyncReadExt as _;
use tokio::sync::{OnceCell, Semaphore, SemaphorePermit};
use tracing::info;

use crate::error::{Error, Result};

const HASHES_DIR: &str = "hashes";
const READ_CHUNK: usize = 64 * 1024;

/// Directory holding the hash files for one task target.
pub fn hash_dir(cache_dir: &Path, task: &str, target: &str) -> PathBuf {
    cache_dir.join(task).join(target).join(HASHES_DIR)
}

/// Deterministic location of the stored hash for `file_path`.
///
/// The file name is a digest of the path string itself, so separators and
/// other awkward characters never reach the filesystem.
pub fn hash_path(cache_dir: &Path, task: &str, target: &str, file_path: &str) -> PathBuf {
    hash_dir(cache_dir, task, target).join(hex::encode(Sha256::digest(file_path.as_bytes())))
}

/// Hash storage scoped to one `(task, target)` pair.
#[derive(Debug)]
pub struct HashStore {
    cache_dir: PathBuf,
    task: String,
    target: String,
    dir_ready: OnceCell<()>,
    permits: Arc<Semaphore>,
}

impl HashStore {
    /// Create a store for `task:target` under `cache_dir`.
    ///
    /// `permits` caps the number of files this store (and anything sharing the
    /// semaphore) keeps open at once.
    pub fn new(
        cache_dir: impl Into<PathBuf>,
        task: impl Into<String>,
        target: impl Into<String>,
        permits: Arc<Semaphore>,
    ) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            task: task.into(),
            target: target.into(),
            dir_ready: OnceCell::new(),
            permits,
        }
    }

    /// Task name this store is scoped to.
    pub fn task(&self) -> &str {
        &self.task
    }

    /// Target name this store is scoped to.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Location of the stored hash for `file_path`, creating the hash
    /// directory on first use.
    ///
    /// # Errors
    /// Returns an error if the hash directory cannot be created.
    pub async fn locate(&self, file_path: &str) -> Result<PathBuf> {
        let dir = hash_dir(&self.cache_dir, &self.task, &self.target);
        self.dir_ready
            .get_or_try_init(|| async {
                async_fs::create_dir_all(&dir)
                    .await
                    .map_err(|error| Error::io(&dir, error))
            })
            .await?;
        Ok(hash_path(&self.cache_dir, &self.task, &self.target, file_path))
    }

    /// Previously committed hash for `file_path`, or `None` if it was never committed.
    ///
    /// # Errors
    /// Returns an error if the hash file exists but cannot be read.
    pub async fn get(&self, file_path: &str) -> Result<Option<String>> {
        let location = self.locate(file_path).await?;
        let _permit = self.permit(&location).await?;
        match async_fs::read(&location).await {
            Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
            Err(error) => Err(Error::io(location, error)),
        }
    }

    /// Commit `hash` for `file_path`, replacing any previous value.
    ///
    /// # Errors
    /// Returns an error if the hash file cannot be written.
    pub async fn put(&self, file_path: &str, hash: &str) -> Result<()> {
        let location = self.locate(file_path).await?;
        let _permit = self.permit(&location).await?;
        async_fs::write(&location, hash.as_bytes())
            .await
            .map_err(|error| Error::io(location, error))
    }

    /// Hex digest of the current contents of `file_path`, streamed in chunks.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or a read fails midway.
    pub async fn content_hash(&self, file_path: &str) -> Result<String> {
        let _permit = self.permit(Path::new(file_path)).await?;
        let mut file = File::open(file_path)
            .await
            .map_err(|error| Error::io(file_path, error))?;

        let mut hasher = Sha256::new();
        let mut buffer = vec![0_u8; READ_CHUNK];
        loop {
            let read = file
                .read(&mut buffer)
                .await
                .map_err(|error| Error::io(file_path, error))?;
            if read == 0 {
                break;
            }
            hasher.update(buffer.get(..read).unwrap_or_default());
        }

        Ok(hex::encode(hasher.finalize()))
    }

    async fn permit(&self, path: &Path) -> Result<SemaphorePermit<'_>> {
        self.permits
            .acquire()
            .await
            .map_err(|error| Error::io(path, IoError::other(error)))
    }
}

/// Delete cached hashes.
///
/// With a task and target only that target's subtree goes; with a task only,
/// the task's subtree; with neither, the whole cache directory. Returns
/// `false` when there was nothing to delete.
///
/// # Errors
/// Returns [`Error::Config`] for a target without a task, or an I/O error if
/// removal fails.
pub async fn clean(cache_dir: &Path, task: Option<&str>, target: Option<&str>) -> Result<bool> {
    let dir = match (task, target) {
        (Some(task_name), Some(target_name)) => cache_dir.join(task_name).join(target_name),
        (Some(task_name), None) => cache_dir.join(task_name),
        (None, None) => cache_dir.to_path_buf(),
        (None, Some(target_name)) => {
            return Err(Error::Config(format!(
                "cannot clean target `{target_name}` without a task"
            )));
        }
    };

    match async_fs::remove_dir_all(&dir).await {
        Ok(()) => {
            info!("Cleaning {}", dir.display());
            Ok(true)
        }
        Err(error) if error.kind() == ErrorKind::NotFound => Ok(false),
        Err(error) => Err(Error::io(dir, error)),
    }
}
