//! String-keyed, string-valued persistence with enumerable keys.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::StoreError;

/// Default capacity, matching the usual per-origin browser storage quota
pub const DEFAULT_CAPACITY_BYTES: usize = 5 * 1024 * 1024;

/// File extension for entries written by `FileStore`
const ENTRY_EXTENSION: &str = "json";

/// A bounded key-value store. Usage is measured as the sum of key and
/// value lengths, and a write that would exceed capacity fails with
/// `StoreError::QuotaExceeded` without modifying the store.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
    fn keys(&self) -> Result<Vec<String>, StoreError>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Arc<S> {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        (**self).remove(key)
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        (**self).keys()
    }
}

impl KeyValueStore for Box<dyn KeyValueStore + Send + Sync> {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        (**self).remove(key)
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        (**self).keys()
    }
}

fn check_capacity(used: usize, capacity: usize) -> Result<(), StoreError> {
    if used > capacity {
        Err(StoreError::QuotaExceeded {
            needed: used,
            capacity,
        })
    } else {
        Ok(())
    }
}

// ============================================================================
// MemoryStore
// ============================================================================

/// In-process store. Contents are lost when it is dropped.
#[derive(Debug)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
    capacity: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY_BYTES)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            capacity,
        }
    }

    fn entries(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries();
        let used: usize = entries
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| k.len() + v.len())
            .sum();
        check_capacity(used + key.len() + value.len(), self.capacity)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.entries().keys().cloned().collect())
    }
}

// ============================================================================
// FileStore
// ============================================================================

/// Directory-backed store: each key is a `<key>.json` file.
///
/// Keys are restricted to ASCII alphanumerics, `_`, `-` and `.` so that
/// they map one-to-one onto file names. Assumes a single writer.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
    capacity: usize,
}

impl FileStore {
    pub fn new(dir: PathBuf) -> Result<Self, StoreError> {
        Self::with_capacity(dir, DEFAULT_CAPACITY_BYTES)
    }

    pub fn with_capacity(dir: PathBuf, capacity: usize) -> Result<Self, StoreError> {
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, capacity })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> Result<PathBuf, StoreError> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
        if !valid {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid store key: {:?}", key),
            )
            .into());
        }
        Ok(self.dir.join(format!("{}.{}", key, ENTRY_EXTENSION)))
    }

    /// Bytes used by every entry except `exclude`
    fn usage_excluding(&self, exclude: &str) -> Result<usize, StoreError> {
        let mut used = 0;
        for key in self.keys()? {
            if key == exclude {
                continue;
            }
            let len = fs::metadata(self.entry_path(&key)?)?.len() as usize;
            used += key.len() + len;
        }
        Ok(used)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.entry_path(key)?) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.entry_path(key)?;
        let used = self.usage_excluding(key)?;
        check_capacity(used + key.len() + value.len(), self.capacity)?;
        fs::write(path, value)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.entry_path(key)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                keys.push(stem.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_file_store(capacity: usize) -> (FileStore, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = FileStore::with_capacity(temp_dir.path().join("store"), capacity)
            .expect("store should open");
        (store, temp_dir)
    }

    #[test]
    fn test_memory_store_basic_operations() {
        let store = MemoryStore::new();
        assert!(store.is_empty());

        store.set("a", "1").unwrap();
        store.set("b", "2").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));
        assert_eq!(store.keys().unwrap(), vec!["a", "b"]);

        store.remove("a").unwrap();
        assert_eq!(store.get("a").unwrap(), None);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_memory_store_rejects_writes_over_capacity() {
        let store = MemoryStore::with_capacity(10);
        store.set("k", "12345").unwrap();

        let err = store.set("other", "123456").unwrap_err();
        assert!(err.is_quota_exceeded());
        assert_eq!(store.get("other").unwrap(), None);

        // Overwriting an entry only counts its new size
        store.set("k", "123456789").unwrap();
    }

    #[test]
    fn test_file_store_persists_between_instances() {
        let (store, _temp_dir) = create_file_store(DEFAULT_CAPACITY_BYTES);
        store.set("f1_cache_session_result_1", "[1,2,3]").unwrap();

        let reopened = FileStore::new(store.dir().to_path_buf()).unwrap();
        assert_eq!(
            reopened.get("f1_cache_session_result_1").unwrap().as_deref(),
            Some("[1,2,3]")
        );
        assert_eq!(reopened.keys().unwrap(), vec!["f1_cache_session_result_1"]);
    }

    #[test]
    fn test_file_store_missing_and_remove() {
        let (store, _temp_dir) = create_file_store(DEFAULT_CAPACITY_BYTES);
        assert_eq!(store.get("nope").unwrap(), None);
        // Removing a missing key is not an error
        store.remove("nope").unwrap();
    }

    #[test]
    fn test_file_store_ignores_foreign_files() {
        let (store, _temp_dir) = create_file_store(DEFAULT_CAPACITY_BYTES);
        fs::write(store.dir().join("notes.txt"), "hello").unwrap();
        store.set("key", "value").unwrap();

        assert_eq!(store.keys().unwrap(), vec!["key"]);
    }

    #[test]
    fn test_file_store_rejects_path_like_keys() {
        let (store, _temp_dir) = create_file_store(DEFAULT_CAPACITY_BYTES);
        assert!(store.set("../escape", "x").is_err());
        assert!(store.set("a/b", "x").is_err());
        assert!(store.get("").is_err());
    }

    #[test]
    fn test_file_store_capacity() {
        let (store, _temp_dir) = create_file_store(20);
        store.set("a", "0123456789").unwrap();

        let err = store.set("b", "0123456789").unwrap_err();
        assert!(err.is_quota_exceeded());
        assert_eq!(store.get("b").unwrap(), None);
    }

    #[test]
    fn test_arc_store_shares_contents() {
        let shared = Arc::new(MemoryStore::new());
        let handle = Arc::clone(&shared);
        handle.set("k", "v").unwrap();
        assert_eq!(shared.get("k").unwrap().as_deref(), Some("v"));
    }
}
