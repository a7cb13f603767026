//! Read-modify-write access to the timing YAML document.

use std::io;
use std::sync::{Mutex, PoisonError};

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use serde_yaml_ng::{Mapping, Value};
use tracing::debug;

use super::TimingError;

/// Highest two-digit suffix tried for non-unique keys.
const MAX_SUFFIX: u8 = 99;

/// YAML document of timing values, rewritten wholesale on every update.
///
/// Updates from one process are serialised through an internal lock.
#[derive(Debug)]
pub struct TimingStore {
    path: Utf8PathBuf,
    lock: Mutex<()>,
}

impl TimingStore {
    /// Builds a store backed by the document at `path`.
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Location of the document.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Reads the whole document; a missing or empty file is an empty mapping.
    ///
    /// # Errors
    ///
    /// Returns [`TimingError`] when the file cannot be read or parsed.
    pub fn load(&self) -> Result<Mapping, TimingError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.read_document()
    }

    /// Stores `value` under `key_path`, creating intermediate mappings.
    ///
    /// With `is_uniq` unset, the first unused `_00`..`_99` suffix is appended
    /// to the last key so earlier values are never overwritten. Returns the
    /// key actually written.
    ///
    /// # Errors
    ///
    /// Returns [`TimingError`] when the path is empty, collides with a scalar,
    /// has no free suffix left, or the file cannot be read or written.
    pub fn update<S>(&self, key_path: &[S], value: &str, is_uniq: bool) -> Result<String, TimingError>
    where
        S: AsRef<str>,
    {
        let (last, parents) = key_path.split_last().ok_or(TimingError::EmptyPath)?;
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut document = self.read_document()?;
        let mut node = &mut document;
        for key in parents {
            node = self.child_mapping(node, key.as_ref())?;
        }

        let leaf = if is_uniq {
            last.as_ref().to_owned()
        } else {
            self.free_suffix(node, last.as_ref())?
        };
        node.insert(Value::from(leaf.as_str()), Value::from(value));

        self.write_document(&document)?;
        debug!(path = %self.path, key = %leaf, value, "timing value stored");
        Ok(leaf)
    }

    fn child_mapping<'m>(&self, node: &'m mut Mapping, key: &str) -> Result<&'m mut Mapping, TimingError> {
        let entry = node
            .entry(Value::from(key))
            .or_insert_with(|| Value::Mapping(Mapping::new()));
        match entry {
            Value::Mapping(child) => Ok(child),
            _ => Err(TimingError::InvalidStructure {
                path: self.path.clone(),
                message: format!("`{key}` holds a value, not a mapping"),
            }),
        }
    }

    fn free_suffix(&self, node: &Mapping, key: &str) -> Result<String, TimingError> {
        (0..=MAX_SUFFIX)
            .map(|suffix| format!("{key}_{suffix:02}"))
            .find(|candidate| !node.contains_key(candidate.as_str()))
            .ok_or_else(|| TimingError::SuffixesExhausted {
                path: self.path.clone(),
                key: key.to_owned(),
            })
    }

    fn read_document(&self) -> Result<Mapping, TimingError> {
        let (dir, file_name) = self.open_parent(false)?;
        let Some(handle) = dir else {
            return Ok(Mapping::new());
        };
        let contents = match handle.read_to_string(file_name) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Mapping::new()),
            Err(err) => return Err(self.io_error(&err)),
        };
        if contents.trim().is_empty() {
            return Ok(Mapping::new());
        }

        match serde_yaml_ng::from_str::<Value>(&contents) {
            Ok(Value::Mapping(mapping)) => Ok(mapping),
            Ok(Value::Null) => Ok(Mapping::new()),
            Ok(_) => Err(TimingError::InvalidStructure {
                path: self.path.clone(),
                message: String::from("document root is not a mapping"),
            }),
            Err(err) => Err(TimingError::Parse {
                path: self.path.clone(),
                message: err.to_string(),
            }),
        }
    }

    fn write_document(&self, document: &Mapping) -> Result<(), TimingError> {
        let rendered = serde_yaml_ng::to_string(document).map_err(|err| TimingError::Parse {
            path: self.path.clone(),
            message: err.to_string(),
        })?;
        let (dir, file_name) = self.open_parent(true)?;
        let handle = dir.ok_or_else(|| TimingError::Io {
            path: self.path.clone(),
            message: String::from("parent directory is missing"),
        })?;
        handle
            .write(file_name, rendered)
            .map_err(|err| self.io_error(&err))
    }

    /// Opens the parent directory, creating it when `create` is set.
    /// Yields `None` when it does not exist and was not created.
    fn open_parent(&self, create: bool) -> Result<(Option<Dir>, &str), TimingError> {
        let parent = self
            .path
            .parent()
            .filter(|dir| !dir.as_str().is_empty())
            .unwrap_or_else(|| Utf8Path::new("."));
        let file_name = self
            .path
            .file_name()
            .ok_or_else(|| TimingError::InvalidStructure {
                path: self.path.clone(),
                message: String::from("timing path is missing a filename"),
            })?;

        if create {
            Dir::create_ambient_dir_all(parent, ambient_authority()).map_err(|err| {
                TimingError::Io {
                    path: parent.to_path_buf(),
                    message: err.to_string(),
                }
            })?;
        }
        match Dir::open_ambient_dir(parent, ambient_authority()) {
            Ok(dir) => Ok((Some(dir), file_name)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok((None, file_name)),
            Err(err) => Err(TimingError::Io {
                path: parent.to_path_buf(),
                message: err.to_string(),
            }),
        }
    }

    fn io_error(&self, err: &io::Error) -> TimingError {
        TimingError::Io {
            path: self.path.clone(),
            message: err.to_string(),
        }
    }
}
