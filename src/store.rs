//! Show store module
//!
//! Keeps the show records in memory and persists them as a single JSON
//! file. Saving goes through a temporary sibling file that is renamed into
//! place, so a crash never leaves a truncated cache behind.

use crate::show::ShowRecord;
use crate::temp::create_temp_sibling;
use indexmap::IndexMap;
use indexmap::map::Entry;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during store operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to create the directory holding the cache file
    #[error("Failed to create cache directory at {path}: {source}")]
    DirectoryCreationFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to read a file
    #[error("Failed to read file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to write the cache file
    #[error("Failed to write cache file {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to deserialize a file
    #[error("Failed to deserialize file {path}: {source}")]
    DeserializationFailed {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Failed to serialize the shows
    #[error("Failed to serialize data: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    /// The show-name list file does not exist
    #[error("File '{0}' not found")]
    ShowFileNotFound(PathBuf),
}

/// An entry of the show-name list file
///
/// Either a bare name or a `[name, timezone]` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ShowName {
    Name(String),
    WithTimezone(String, String),
}

impl ShowName {
    pub fn name(&self) -> &str {
        match self {
            ShowName::Name(name) | ShowName::WithTimezone(name, _) => name,
        }
    }

    pub fn timezone(&self) -> Option<&str> {
        match self {
            ShowName::Name(_) => None,
            ShowName::WithTimezone(_, timezone) => Some(timezone),
        }
    }
}

/// In-memory show records, keyed by show name
///
/// Iteration and the saved file follow insertion order. Batch operations
/// go through [`keys`](Self::keys), which is sorted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShowStore {
    shows: IndexMap<String, ShowRecord>,
}

impl ShowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the store from a cache file
    ///
    /// A missing file yields an empty store.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let content = fs::read_to_string(path).map_err(|e| StoreError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

        serde_json::from_str(&content).map_err(|e| StoreError::DeserializationFailed {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Writes the full store to `path`, replacing it atomically
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StoreError::DirectoryCreationFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let content = serde_json::to_string_pretty(self)?;

        let write_failed = |e| StoreError::WriteFailed {
            path: path.to_path_buf(),
            source: e,
        };
        let temp = create_temp_sibling(path).map_err(write_failed)?;
        fs::write(temp.path(), content).map_err(write_failed)?;
        temp.persist(path).map_err(write_failed)?;

        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&ShowRecord> {
        self.shows.get(key)
    }

    /// Returns the record for `key`, creating a default one if missing
    pub fn entry(&mut self, key: &str) -> &mut ShowRecord {
        match self.shows.entry(key.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(ShowRecord::default()),
        }
    }

    /// Inserts or replaces a record
    pub fn insert(&mut self, key: impl Into<String>, show: ShowRecord) {
        self.shows.insert(key.into(), show);
    }

    /// Removes a record, keeping the order of the others
    pub fn remove(&mut self, key: &str) -> Option<ShowRecord> {
        self.shows.shift_remove(key)
    }

    /// Show keys in lexicographic order
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.shows.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.shows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shows.is_empty()
    }

    /// All records in insertion order
    pub fn shows(&self) -> &IndexMap<String, ShowRecord> {
        &self.shows
    }
}

/// Reads the show-name list file
pub fn load_show_names(path: &Path) -> Result<Vec<ShowName>, StoreError> {
    if !path.exists() {
        return Err(StoreError::ShowFileNotFound(path.to_path_buf()));
    }

    let content = fs::read_to_string(path).map_err(|e| StoreError::ReadFailed {
        path: path.to_path_buf(),
        source: e,
    })?;

    serde_json::from_str(&content).map_err(|e| StoreError::DeserializationFailed {
        path: path.to_path_buf(),
        source: e,
    })
}
