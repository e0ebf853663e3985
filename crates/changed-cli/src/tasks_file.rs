//! Loading `changed.toml`: options plus `[tasks.<task>.<target>]` tables.
//!
//! Source patterns are expanded with `glob` at load time so the core only ever
//! sees concrete paths. Patterns that match nothing disappear; literal paths
//! are kept as written so a missing file surfaces as an error during the run.

use std::fs;
use std::path::Path;

use anyhow::{Context as _, Result};
use changed_core::{ChangedOptions, MemoryConfigStore};
use glob::glob;
use serde::Deserialize;
use serde_json::{Map, Value};

const GLOB_CHARS: [char; 3] = ['*', '?', '['];

#[derive(Debug, Default, Deserialize)]
struct RawTasksFile {
    #[serde(default)]
    options: ChangedOptions,
    #[serde(default)]
    tasks: toml::Table,
}

/// Parsed tasks file.
#[derive(Debug)]
pub struct TasksFile {
    /// Options from the `[options]` table.
    pub options: ChangedOptions,
    /// Target configurations, with sources expanded.
    pub store: MemoryConfigStore,
}

impl TasksFile {
    /// Read and parse `path`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, options are
    /// invalid, or a glob pattern is malformed.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read tasks file {}", path.display()))?;
        Self::parse(&contents)
            .with_context(|| format!("Invalid tasks file {}", path.display()))
    }

    /// Load `path` if it exists, otherwise an empty tasks file with default options.
    ///
    /// # Errors
    /// See [`Self::load`].
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self {
                options: ChangedOptions::default(),
                store: MemoryConfigStore::new(),
            })
        }
    }

    fn parse(contents: &str) -> Result<Self> {
        let raw: RawTasksFile = toml::from_str(contents)?;
        raw.options.validate()?;

        let mut tasks = Map::new();
        for (task, targets) in raw.tasks {
            let mut targets = serde_json::to_value(targets)?;
            let Some(table) = targets.as_object_mut() else {
                anyhow::bail!("task `{task}` must be a table of targets");
            };
            for (target, config) in table {
                if let Some(object) = config.as_object_mut() {
                    expand_sources(object)
                        .with_context(|| format!("Failed to expand sources of {task}:{target}"))?;
                }
            }
            tasks.insert(task, targets);
        }

        Ok(Self {
            options: raw.options,
            store: MemoryConfigStore::from_value(Value::Object(tasks))?,
        })
    }
}

/// Expand glob patterns in every source position of a target configuration.
fn expand_sources(config: &mut Map<String, Value>) -> Result<()> {
    if let Some(src) = config.get_mut("src") {
        expand_value(src)?;
    }
    match config.get_mut("files") {
        Some(Value::Array(items)) if items.iter().all(Value::is_object) => {
            for group in items.iter_mut().filter_map(Value::as_object_mut) {
                if let Some(src) = group.get_mut("src") {
                    expand_value(src)?;
                }
            }
        }
        Some(Value::Object(mapping)) => {
            for src in mapping.values_mut() {
                expand_value(src)?;
            }
        }
        Some(files) => expand_value(files)?,
        None => {}
    }
    Ok(())
}

/// Replace a string or list of entries with its expansion, as a list.
///
/// Entries that are not strings are kept in place for the core to reject.
fn expand_value(value: &mut Value) -> Result<()> {
    let items: Vec<Value> = match value {
        Value::String(_) => vec![value.clone()],
        Value::Array(items) => items.clone(),
        _ => return Ok(()),
    };
    let has_pattern = items
        .iter()
        .filter_map(Value::as_str)
        .any(|pattern| pattern.contains(GLOB_CHARS));
    if !has_pattern {
        return Ok(());
    }

    let mut expanded = Vec::with_capacity(items.len());
    for item in items {
        match item.as_str() {
            Some(pattern) => {
                expanded.extend(expand_pattern(pattern)?.into_iter().map(Value::String));
            }
            None => expanded.push(item),
        }
    }
    *value = Value::Array(expanded);
    Ok(())
}

fn expand_pattern(pattern: &str) -> Result<Vec<String>> {
    if !pattern.contains(GLOB_CHARS) {
        return Ok(vec![pattern.to_owned()]);
    }

    let mut matches = Vec::new();
    for entry in glob(pattern).with_context(|| format!("Invalid glob pattern `{pattern}`"))? {
        let path = entry?;
        if path.is_file() {
            let display = path
                .to_str()
                .with_context(|| format!("Non UTF-8 path {}", path.display()))?;
            matches.push(display.to_owned());
        }
    }
    Ok(matches)
}
