//! Options controlling where hashes are cached and how hard the filesystem is hit.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default cache directory, relative to the working directory.
pub const DEFAULT_CACHE_DIR: &str = ".cache";

/// Default cap on simultaneously open files.
pub const DEFAULT_MAX_OPEN_FILES: usize = 64;

/// Options for changed runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangedOptions {
    /// Directory holding the per-task hash trees
    pub cache: PathBuf,
    /// Maximum number of files read or written concurrently
    pub max_open_files: usize,
    /// Paths or file names always treated as changed
    pub always: Vec<String>,
}

impl Default for ChangedOptions {
    fn default() -> Self {
        Self {
            cache: PathBuf::from(DEFAULT_CACHE_DIR),
            max_open_files: DEFAULT_MAX_OPEN_FILES,
            always: Vec::new(),
        }
    }
}

impl ChangedOptions {
    /// Load options from a TOML file. Missing keys take their defaults.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, is not valid TOML, or
    /// fails [`Self::validate`].
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|error| Error::io(path, error))?;
        let options: Self = toml::from_str(&contents)?;
        options.validate()?;
        Ok(options)
    }

    /// Check option values.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if `max_open_files` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.max_open_files == 0 {
            return Err(Error::Config(
                "max_open_files must be at least 1".to_owned(),
            ));
        }
        Ok(())
    }
}
