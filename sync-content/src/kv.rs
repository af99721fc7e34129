//! String key-value storage.
//!
//! The device's persistent key-value store holds whole JSON documents under
//! a handful of well-known keys. Encoding lives in [`crate::LocalStore`];
//! stores here only move strings.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::StoreError;

/// Trait for persistent string key-value storage.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value under `key`, or `None` if absent.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Delete `key`. Deleting a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// In-memory key-value store for testing.
///
/// Clones share the same map, so a test can keep a handle and inspect what
/// the code under test persisted.
#[derive(Debug, Default, Clone)]
pub struct MemoryKvStore {
    inner: Arc<Mutex<MemoryKvInner>>,
}

#[derive(Debug, Default)]
struct MemoryKvInner {
    values: HashMap<String, String>,
    writes: usize,
    fail_next_write: Option<String>,
}

impl MemoryKvStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw stored string under `key`.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.inner.lock().unwrap().values.get(key).cloned()
    }

    /// Number of successful `set`/`remove` calls so far.
    pub fn write_count(&self) -> usize {
        self.inner.lock().unwrap().writes
    }

    /// Cause the next `set()` or `remove()` to fail with the given error.
    pub fn fail_next_write(&self, error: &str) {
        self.inner.lock().unwrap().fail_next_write = Some(error.to_string());
    }
}

#[async_trait]
impl KeyValueStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.inner.lock().unwrap().values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(error) = inner.fail_next_write.take() {
            return Err(StoreError::Backend(error));
        }
        inner.values.insert(key.to_string(), value.to_string());
        inner.writes += 1;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(error) = inner.fail_next_write.take() {
            return Err(StoreError::Backend(error));
        }
        inner.values.remove(key);
        inner.writes += 1;
        Ok(())
    }
}

/// Key-value store backed by one file per key in a directory.
///
/// Each write goes to a temp file that is then renamed over the target, so a
/// crash never leaves a half-written document.
#[derive(Debug, Clone)]
pub struct FileKvStore {
    dir: PathBuf,
}

impl FileKvStore {
    /// Open (and create if needed) a store rooted at `dir`.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| StoreError::io(&dir, e))?;
        Ok(Self { dir })
    }

    /// Directory holding the key files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        if !is_safe_key(key) {
            return Err(StoreError::InvalidName {
                name: key.to_string(),
            });
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

#[async_trait]
impl KeyValueStore for FileKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.path_for(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        atomic_write(&path, value.as_bytes()).await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }
}

/// Keys and blob names double as file names.
pub(crate) fn is_safe_key(key: &str) -> bool {
    !key.is_empty()
        && key != "."
        && key != ".."
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// Write to a sibling temp file, then rename over `path`.
pub(crate) async fn atomic_write(path: &Path, data: &[u8]) -> Result<(), StoreError> {
    let temp_path = path.with_extension("tmp");

    tokio::fs::write(&temp_path, data)
        .await
        .map_err(|e| StoreError::io(&temp_path, e))?;

    tokio::fs::rename(&temp_path, path)
        .await
        .map_err(|e| StoreError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_set_get_remove() {
        let store = MemoryKvStore::new();
        assert_eq!(store.get("k").await.unwrap(), None);

        store.set("k", "v1").await.unwrap();
        store.set("k", "v2").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v2"));

        store.remove("k").await.unwrap();
        store.remove("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
        assert_eq!(store.write_count(), 4);
    }

    #[tokio::test]
    async fn memory_store_clones_share_state() {
        let store = MemoryKvStore::new();
        let handle = store.clone();

        store.set("offlineProgress", "{}").await.unwrap();
        assert_eq!(handle.raw("offlineProgress").as_deref(), Some("{}"));
    }

    #[tokio::test]
    async fn memory_store_fail_next_write() {
        let store = MemoryKvStore::new();
        store.fail_next_write("disk full");

        let result = store.set("k", "v").await;
        assert!(matches!(result, Err(StoreError::Backend(ref e)) if e == "disk full"));
        assert_eq!(store.raw("k"), None);

        // Only the next write fails.
        store.set("k", "v").await.unwrap();
        assert_eq!(store.raw("k").as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();

        let store = FileKvStore::open(dir.path().join("kv")).await.unwrap();
        store.set("offlineData", r#"{"courses":[]}"#).await.unwrap();

        let reopened = FileKvStore::open(dir.path().join("kv")).await.unwrap();
        assert_eq!(
            reopened.get("offlineData").await.unwrap().as_deref(),
            Some(r#"{"courses":[]}"#)
        );
    }

    #[tokio::test]
    async fn file_store_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKvStore::open(dir.path()).await.unwrap();

        store.set("offlineProgress", "{}").await.unwrap();
        store.set("offlineProgress", r#"{"a":1}"#).await.unwrap();

        assert!(dir.path().join("offlineProgress.json").exists());
        assert!(!dir.path().join("offlineProgress.tmp").exists());
    }

    #[tokio::test]
    async fn file_store_remove_missing_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKvStore::open(dir.path()).await.unwrap();

        store.remove("never-set").await.unwrap();
        assert_eq!(store.get("never-set").await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_store_rejects_path_like_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKvStore::open(dir.path()).await.unwrap();

        for key in ["../escape", "a/b", "", ".."] {
            assert!(matches!(
                store.set(key, "x").await,
                Err(StoreError::InvalidName { .. })
            ));
        }
    }
}
