//! File-based key-value store for persistent state.

use crate::error::{StorageError, StorageResult};
use crate::store::KeyValueStore;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// A key-value store persisted as a single JSON object on disk.
///
/// Values survive process restarts.
///
/// # Durability
///
/// Every mutation rewrites the whole map into a sibling temporary file,
/// calls `File::sync_all()`, and renames it over the target. A crash
/// mid-write leaves either the old or the new map, never a torn file.
///
/// # Thread Safety
///
/// The in-memory copy is guarded by a lock held across the write, so
/// concurrent mutations are serialized.
///
/// # Example
///
/// ```no_run
/// use healthsync_storage::{FileStore, KeyValueStore};
/// use std::path::Path;
///
/// let store = FileStore::open(Path::new("state.json")).unwrap();
/// store.set("changes_token", "abc").unwrap();
/// ```
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, String>>,
}

impl FileStore {
    /// Opens the store at `path`, loading existing entries if the file exists.
    ///
    /// A missing file is treated as an empty store; nothing is written until
    /// the first mutation.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not contain a
    /// JSON object of strings.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let entries = match fs::read_to_string(path) {
            Ok(contents) if contents.trim().is_empty() => BTreeMap::new(),
            Ok(contents) => serde_json::from_str(&contents)
                .map_err(|e| StorageError::Corrupted(format!("{}: {}", path.display(), e)))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path: path.to_path_buf(),
            entries: RwLock::new(entries),
        })
    }

    /// Opens the store, creating parent directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if directories cannot be created or the file cannot be loaded.
    pub fn open_with_create_dirs(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Self::open(path)
    }

    /// Returns the path to the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> StorageResult<()> {
        let json = serde_json::to_vec_pretty(entries)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        let tmp_path = self.path.with_extension("tmp");
        {
            let mut tmp = File::create(&tmp_path)?;
            tmp.write_all(&json)?;
            tmp.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut entries = self.entries.write();
        let previous = entries.insert(key.to_string(), value.to_string());
        if let Err(e) = self.persist(&entries) {
            // Keep memory consistent with disk.
            match previous {
                Some(old) => entries.insert(key.to_string(), old),
                None => entries.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let mut entries = self.entries.write();
        let Some(previous) = entries.remove(key) else {
            return Ok(());
        };
        if let Err(e) = self.persist(&entries) {
            entries.insert(key.to_string(), previous);
            return Err(e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_open_missing_is_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");

        let store = FileStore::open(&path).unwrap();
        assert!(store.get("anything").unwrap().is_none());
        assert!(!path.exists());
    }

    #[test]
    fn file_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");

        {
            let store = FileStore::open(&path).unwrap();
            store.set("changes_token", "tok-1").unwrap();
            store.set("last_sync_timestamp", "2025-12-15T14:30:00Z").unwrap();
        }

        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.get("changes_token").unwrap().as_deref(), Some("tok-1"));
        assert_eq!(
            store.get("last_sync_timestamp").unwrap().as_deref(),
            Some("2025-12-15T14:30:00Z")
        );
    }

    #[test]
    fn file_remove_is_durable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");

        let store = FileStore::open(&path).unwrap();
        store.set("changes_token", "tok-1").unwrap();
        store.remove("changes_token").unwrap();
        drop(store);

        let store = FileStore::open(&path).unwrap();
        assert!(store.get("changes_token").unwrap().is_none());
    }

    #[test]
    fn file_corrupted_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, b"not json").unwrap();

        let result = FileStore::open(&path);
        assert!(matches!(result, Err(StorageError::Corrupted(_))));
    }

    #[test]
    fn file_create_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("state.json");

        let store = FileStore::open_with_create_dirs(&path).unwrap();
        store.set("k", "v").unwrap();
        assert!(path.exists());
        assert_eq!(store.path(), path.as_path());
    }
}
