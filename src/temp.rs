//! Temporary file management module
//!
//! This module provides RAII-based temporary file handling with automatic
//! cleanup, used to replace files atomically.

use std::fs::{self, File};
use std::io;
use std::ops::Deref;
use std::path::{Path, PathBuf};

/// Guard for temporary resources that automatically cleans up on drop
#[derive(Debug)]
pub(crate) enum TempGuard {
    /// Temporary file that will be deleted when dropped
    File(PathBuf),
}

impl TempGuard {
    /// Get the path to the temporary resource
    pub(crate) fn path(&self) -> &Path {
        match self {
            TempGuard::File(path) => path,
        }
    }

    /// Moves the temporary file over `destination`
    ///
    /// On failure the guard is dropped and the temporary file removed.
    pub(crate) fn persist(self, destination: &Path) -> io::Result<()> {
        fs::rename(self.path(), destination)
    }
}

impl Drop for TempGuard {
    fn drop(&mut self) {
        match self {
            TempGuard::File(path) => {
                // Already gone after a successful persist
                let _ = fs::remove_file(path);
            }
        }
    }
}

impl Deref for TempGuard {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        self.path()
    }
}

/// Creates an empty temporary file next to `target`
///
/// The file lives in the same directory as `target` so it can later be
/// renamed over it, and gets a unique name generated using ULID
/// (monotonic, sortable unique identifier).
///
/// # Examples
///
/// ```ignore
/// let temp = create_temp_sibling(Path::new("cache/shows.json"))?;
/// fs::write(temp.path(), content)?;
/// temp.persist(Path::new("cache/shows.json"))?;
/// ```
pub(crate) fn create_temp_sibling(target: &Path) -> io::Result<TempGuard> {
    let directory = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let file_name = target
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("sallie");

    let ulid = ulid::Ulid::new();
    let path = directory.join(format!("{}.{}.tmp", file_name, ulid));

    File::create(&path)?;

    Ok(TempGuard::File(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_temp_sibling() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("shows.json");

        let temp = create_temp_sibling(&target).unwrap();
        let path = temp.path().to_path_buf();

        assert!(path.exists());
        assert_eq!(path.parent(), Some(dir.path()));

        let filename = path.file_name().unwrap().to_str().unwrap();
        assert!(filename.starts_with("shows.json."));
        assert!(filename.ends_with(".tmp"));

        drop(temp);
        assert!(!path.exists());
    }

    #[test]
    fn test_persist_replaces_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("shows.json");
        fs::write(&target, "old").unwrap();

        let temp = create_temp_sibling(&target).unwrap();
        let path = temp.path().to_path_buf();
        fs::write(temp.path(), "new").unwrap();
        temp.persist(&target).unwrap();

        assert_eq!(fs::read_to_string(&target).unwrap(), "new");
        assert!(!path.exists());
    }

    #[test]
    fn test_multiple_temp_files_unique() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("shows.json");

        let temp1 = create_temp_sibling(&target).unwrap();
        let temp2 = create_temp_sibling(&target).unwrap();

        assert_ne!(temp1.path(), temp2.path());
        assert!(temp1.path().exists());
        assert!(temp2.path().exists());
    }
}
