//! Named blob storage.
//!
//! Downloaded media (images, lesson videos) are stored as opaque blobs under
//! names built by [`sync_types::naming`]. Everything belonging to one content
//! item shares its `{type}_{id}` prefix, which is how sizes are summed and
//! how removal finds what to delete.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sync_types::{naming::blob_belongs_to, DiskSpace};
use sysinfo::Disks;

use crate::error::StoreError;
use crate::kv::{atomic_write, is_safe_key};

/// Trait for named blob storage.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `data` under `name`, replacing any previous blob.
    async fn put(&self, name: &str, data: &[u8]) -> Result<(), StoreError>;

    /// Read a blob. Returns `NotFound` if absent.
    async fn get(&self, name: &str) -> Result<Vec<u8>, StoreError>;

    /// Check if a blob exists.
    async fn exists(&self, name: &str) -> Result<bool, StoreError>;

    /// Delete a blob.
    ///
    /// Returns `Ok(true)` if removed, `Ok(false)` if it was not there.
    async fn remove(&self, name: &str) -> Result<bool, StoreError>;

    /// Byte length of a blob. Returns `NotFound` if absent.
    async fn size(&self, name: &str) -> Result<u64, StoreError>;

    /// Names of all stored blobs.
    async fn list(&self) -> Result<Vec<String>, StoreError>;

    /// Free and total space of the volume backing the store, if known.
    async fn disk_space(&self) -> Option<DiskSpace>;

    /// Names of the blobs belonging to a content prefix.
    async fn list_prefixed(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|name| blob_belongs_to(name, prefix))
            .collect())
    }
}

/// In-memory blob store for testing.
///
/// Stores blobs in a thread-safe map. Not persistent - all data is lost
/// when the last clone is dropped.
#[derive(Debug, Default, Clone)]
pub struct MemoryBlobStore {
    inner: Arc<Mutex<MemoryBlobInner>>,
}

#[derive(Debug, Default)]
struct MemoryBlobInner {
    blobs: BTreeMap<String, Vec<u8>>,
    puts: usize,
    fail_next_put: Option<String>,
    fail_size: HashSet<String>,
    disk: Option<DiskSpace>,
}

impl MemoryBlobStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of blobs currently stored.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().blobs.len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().blobs.is_empty()
    }

    /// Names of stored blobs, sorted.
    pub fn names(&self) -> Vec<String> {
        self.inner.lock().unwrap().blobs.keys().cloned().collect()
    }

    /// Number of successful `put` calls so far.
    pub fn put_count(&self) -> usize {
        self.inner.lock().unwrap().puts
    }

    /// Cause the next `put()` to fail with the given error.
    pub fn fail_next_put(&self, error: &str) {
        self.inner.lock().unwrap().fail_next_put = Some(error.to_string());
    }

    /// Make `size()` fail for this blob name.
    pub fn fail_size_for(&self, name: &str) {
        self.inner.lock().unwrap().fail_size.insert(name.to_string());
    }

    /// Report this device space from `disk_space()`.
    pub fn set_disk_space(&self, space: DiskSpace) {
        self.inner.lock().unwrap().disk = Some(space);
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, name: &str, data: &[u8]) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(error) = inner.fail_next_put.take() {
            return Err(StoreError::Backend(error));
        }
        inner.blobs.insert(name.to_string(), data.to_vec());
        inner.puts += 1;
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        self.inner
            .lock()
            .unwrap()
            .blobs
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                name: name.to_string(),
            })
    }

    async fn exists(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.inner.lock().unwrap().blobs.contains_key(name))
    }

    async fn remove(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.inner.lock().unwrap().blobs.remove(name).is_some())
    }

    async fn size(&self, name: &str) -> Result<u64, StoreError> {
        let inner = self.inner.lock().unwrap();
        if inner.fail_size.contains(name) {
            return Err(StoreError::Backend(format!("cannot stat {name}")));
        }
        inner
            .blobs
            .get(name)
            .map(|data| data.len() as u64)
            .ok_or_else(|| StoreError::NotFound {
                name: name.to_string(),
            })
    }

    async fn list(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.names())
    }

    async fn disk_space(&self) -> Option<DiskSpace> {
        self.inner.lock().unwrap().disk
    }
}

/// Blob store keeping one file per blob in a directory.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    dir: PathBuf,
}

impl FsBlobStore {
    /// Open (and create if needed) a store rooted at `dir`.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| StoreError::io(&dir, e))?;
        Ok(Self { dir })
    }

    /// Directory holding the blob files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, StoreError> {
        if !is_safe_key(name) || name.ends_with(".tmp") {
            return Err(StoreError::InvalidName {
                name: name.to_string(),
            });
        }
        Ok(self.dir.join(name))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, name: &str, data: &[u8]) -> Result<(), StoreError> {
        let path = self.path_for(name)?;
        atomic_write(&path, data).await
    }

    async fn get(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.path_for(name)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StoreError::NotFound {
                name: name.to_string(),
            }),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    async fn exists(&self, name: &str) -> Result<bool, StoreError> {
        let path = self.path_for(name)?;
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| StoreError::io(path, e))
    }

    async fn remove(&self, name: &str) -> Result<bool, StoreError> {
        let path = self.path_for(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    async fn size(&self, name: &str) -> Result<u64, StoreError> {
        let path = self.path_for(name)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StoreError::NotFound {
                name: name.to_string(),
            }),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    async fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| StoreError::io(&self.dir, e))?;

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io(&self.dir, e))?
        {
            let is_file = entry
                .file_type()
                .await
                .map(|t| t.is_file())
                .unwrap_or(false);
            if !is_file {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if !name.ends_with(".tmp") {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    async fn disk_space(&self) -> Option<DiskSpace> {
        let dir = tokio::fs::canonicalize(&self.dir).await.ok()?;
        tokio::task::spawn_blocking(move || volume_space(&dir))
            .await
            .ok()
            .flatten()
    }
}

/// Space of the mounted volume with the longest mount point containing `path`.
fn volume_space(path: &Path) -> Option<DiskSpace> {
    let disks = Disks::new_with_refreshed_list();
    disks
        .list()
        .iter()
        .filter(|disk| path.starts_with(disk.mount_point()))
        .max_by_key(|disk| disk.mount_point().as_os_str().len())
        .map(|disk| DiskSpace {
            available: disk.available_space(),
            total: disk.total_space(),
        })
}
