//! File groups and the configuration shapes they are read from and written back to.

use serde_json::{Map, Value};

use crate::error::{Error, Result};

const FILES_KEY: &str = "files";
const SRC_KEY: &str = "src";
const DEST_KEY: &str = "dest";

/// One configured set of source paths with an optional shared destination.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileGroup {
    /// Source paths, in configuration order.
    pub src: Vec<String>,
    /// Destination path, if the group produces one.
    pub dest: Option<String>,
    /// Any other fields of the group object, preserved verbatim.
    pub extra: Map<String, Value>,
}

impl FileGroup {
    /// Group with sources and no destination.
    pub fn new<I, S>(src: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            src: src.into_iter().map(Into::into).collect(),
            dest: None,
            extra: Map::new(),
        }
    }

    /// Set the destination.
    #[must_use]
    pub fn with_dest(mut self, dest: impl Into<String>) -> Self {
        self.dest = Some(dest.into());
        self
    }

    /// Copy of this group restricted to `src`, keeping destination and extra fields.
    #[must_use]
    pub fn with_src(&self, src: Vec<String>) -> Self {
        Self {
            src,
            dest: self.dest.clone(),
            extra: self.extra.clone(),
        }
    }

    /// Whether several sources feed one destination.
    ///
    /// A single source whose destination is itself is an in-place per-file
    /// group, not fan-in. Any other group with a destination is fan-in, even
    /// with only one source.
    pub fn is_fan_in(&self) -> bool {
        self.dest.as_ref().is_some_and(|dest| {
            !(self.src.len() == 1 && self.src.first().is_some_and(|src| src == dest))
        })
    }

    /// Parse a `{src, dest, ...}` object.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if `src` or `dest` have the wrong type.
    pub fn from_object(object: &Map<String, Value>) -> Result<Self> {
        let src = object
            .get(SRC_KEY)
            .map_or_else(|| Ok(Vec::new()), |value| path_list(value, SRC_KEY))?;
        let dest = match object.get(DEST_KEY) {
            None | Some(Value::Null) => None,
            Some(Value::String(dest)) => Some(dest.clone()),
            Some(other) => {
                return Err(Error::Config(format!(
                    "`dest` must be a string, found {other}"
                )));
            }
        };
        let extra = object
            .iter()
            .filter(|(key, _)| key.as_str() != SRC_KEY && key.as_str() != DEST_KEY)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Ok(Self { src, dest, extra })
    }

    /// Top-level `src`/`dest` share their object with unrelated target options,
    /// which must not leak into the group.
    fn without_extra(mut self) -> Self {
        self.extra.clear();
        self
    }

    /// Render the group back as a `{src, dest, ...}` object.
    pub fn to_value(&self) -> Value {
        let mut object = Map::new();
        object.insert(
            SRC_KEY.to_owned(),
            Value::Array(self.src.iter().cloned().map(Value::String).collect()),
        );
        if let Some(dest) = &self.dest {
            object.insert(DEST_KEY.to_owned(), Value::String(dest.clone()));
        }
        for (key, value) in &self.extra {
            object.insert(key.clone(), value.clone());
        }
        Value::Object(object)
    }
}

/// How a target originally expressed its files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilesShape {
    /// `files` was a path string or a flat list of path strings.
    Simple,
    /// Structured `src`/`dest` groups.
    Groups,
}

/// File groups read from a target configuration, plus the shape they came in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetFiles {
    /// Groups in configuration order.
    pub groups: Vec<FileGroup>,
    /// Original shape, used when writing filtered groups back.
    pub shape: FilesShape,
}

impl TargetFiles {
    /// Read the file groups of a target configuration.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the configuration is not an object or a
    /// files entry has an unsupported type.
    pub fn from_config(config: &Value) -> Result<Self> {
        let object = config.as_object().ok_or_else(|| {
            Error::Config(format!("target configuration must be an object, found {config}"))
        })?;

        match object.get(FILES_KEY) {
            Some(Value::String(path)) => Ok(Self {
                groups: vec![FileGroup::new([path.clone()])],
                shape: FilesShape::Simple,
            }),
            Some(Value::Array(items)) if items.first().is_some_and(Value::is_string) => Ok(Self {
                groups: vec![FileGroup::new(string_items(items, FILES_KEY)?)],
                shape: FilesShape::Simple,
            }),
            Some(Value::Array(items)) => {
                let groups = items
                    .iter()
                    .map(|item| {
                        item.as_object().map_or_else(
                            || {
                                Err(Error::Config(format!(
                                    "`files` entries must be objects, found {item}"
                                )))
                            },
                            FileGroup::from_object,
                        )
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Self {
                    groups,
                    shape: FilesShape::Groups,
                })
            }
            Some(Value::Object(mapping)) => {
                let groups = mapping
                    .iter()
                    .map(|(dest, src)| {
                        Ok(FileGroup::new(path_list(src, FILES_KEY)?).with_dest(dest.clone()))
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Self {
                    groups,
                    shape: FilesShape::Groups,
                })
            }
            Some(Value::Null) | None => {
                let groups = if object.contains_key(SRC_KEY) {
                    vec![FileGroup::from_object(object)?.without_extra()]
                } else {
                    Vec::new()
                };
                Ok(Self {
                    groups,
                    shape: FilesShape::Groups,
                })
            }
            Some(other) => Err(Error::Config(format!(
                "`files` has unsupported type: {other}"
            ))),
        }
    }

    /// Copy of `config` whose files are replaced by `changed`, in this shape.
    ///
    /// Top-level `src` and `dest` are removed; every other field is kept.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if `config` is not an object.
    pub fn rewrite(&self, config: &Value, changed: &[FileGroup]) -> Result<Value> {
        let mut object = config.as_object().cloned().ok_or_else(|| {
            Error::Config(format!("target configuration must be an object, found {config}"))
        })?;
        object.remove(SRC_KEY);
        object.remove(DEST_KEY);

        let files = match self.shape {
            FilesShape::Simple => changed
                .iter()
                .flat_map(|group| group.src.iter().cloned())
                .map(Value::String)
                .collect(),
            FilesShape::Groups => changed.iter().map(FileGroup::to_value).collect(),
        };
        object.insert(FILES_KEY.to_owned(), Value::Array(files));

        Ok(Value::Object(object))
    }

    /// All source paths across groups, in order.
    pub fn sources(&self) -> Vec<String> {
        self.groups
            .iter()
            .flat_map(|group| group.src.iter().cloned())
            .collect()
    }
}

fn path_list(value: &Value, field: &str) -> Result<Vec<String>> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::String(path) => Ok(vec![path.clone()]),
        Value::Array(items) => string_items(items, field),
        other => Err(Error::Config(format!(
            "`{field}` must be a string or list of strings, found {other}"
        ))),
    }
}

fn string_items(items: &[Value], field: &str) -> Result<Vec<String>> {
    items
        .iter()
        .map(|item| {
            item.as_str().map(ToOwned::to_owned).ok_or_else(|| {
                Error::Config(format!("`{field}` entries must be strings, found {item}"))
            })
        })
        .collect()
}
