//! Typed access to the offline documents in a key-value store.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use sync_types::{ContentCatalog, ProgressMap};
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::kv::KeyValueStore;

/// Key of the content catalog document.
pub const CATALOG_KEY: &str = "offlineData";
/// Key of the offline progress map.
pub const PROGRESS_KEY: &str = "offlineProgress";
/// Key of the feature toggles document.
pub const SETTINGS_KEY: &str = "offlineSettings";

/// JSON documents over a [`KeyValueStore`].
///
/// Missing keys load as empty documents. A value that fails to decode is
/// reported as [`StoreError::Corrupt`] rather than silently reset.
///
/// Clones share one write lock, so `update_*` read-modify-write cycles made
/// through any clone never interleave.
#[derive(Clone)]
pub struct LocalStore {
    kv: Arc<dyn KeyValueStore>,
    write_lock: Arc<Mutex<()>>,
}

impl LocalStore {
    /// Wrap a key-value store.
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Load the content catalog.
    pub async fn load_catalog(&self) -> Result<ContentCatalog, StoreError> {
        Ok(self.load(CATALOG_KEY).await?.unwrap_or_default())
    }

    /// Persist the content catalog.
    pub async fn save_catalog(&self, catalog: &ContentCatalog) -> Result<(), StoreError> {
        self.save(CATALOG_KEY, catalog).await
    }

    /// Load, modify and save the catalog as one step.
    pub async fn update_catalog<F, R>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut ContentCatalog) -> R + Send,
        R: Send,
    {
        let _guard = self.write_lock.lock().await;
        let mut catalog = self.load_catalog().await?;
        let result = f(&mut catalog);
        self.save_catalog(&catalog).await?;
        Ok(result)
    }

    /// Stamp the catalog's last-synced time.
    pub async fn set_last_synced(&self, now: DateTime<Utc>) -> Result<(), StoreError> {
        self.update_catalog(|catalog| catalog.touch(now)).await
    }

    /// Load the offline progress map.
    pub async fn load_progress(&self) -> Result<ProgressMap, StoreError> {
        Ok(self.load(PROGRESS_KEY).await?.unwrap_or_default())
    }

    /// Persist the offline progress map.
    pub async fn save_progress(&self, progress: &ProgressMap) -> Result<(), StoreError> {
        self.save(PROGRESS_KEY, progress).await
    }

    /// Load, modify and save the progress map as one step.
    ///
    /// An empty result removes the key instead of storing `{}`.
    pub async fn update_progress<F, R>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut ProgressMap) -> R + Send,
        R: Send,
    {
        let _guard = self.write_lock.lock().await;
        let mut progress = self.load_progress().await?;
        let result = f(&mut progress);
        if progress.is_empty() {
            self.kv.remove(PROGRESS_KEY).await?;
        } else {
            self.save_progress(&progress).await?;
        }
        Ok(result)
    }

    /// Drop all offline progress.
    pub async fn clear_progress(&self) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        self.kv.remove(PROGRESS_KEY).await
    }

    /// Load the feature toggles, or their defaults if never saved.
    pub async fn load_settings<T>(&self) -> Result<T, StoreError>
    where
        T: DeserializeOwned + Default,
    {
        Ok(self.load(SETTINGS_KEY).await?.unwrap_or_default())
    }

    /// Persist the feature toggles.
    pub async fn save_settings<T>(&self, settings: &T) -> Result<(), StoreError>
    where
        T: Serialize + Sync,
    {
        self.save(SETTINGS_KEY, settings).await
    }

    async fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.kv.get(key).await? {
            None => Ok(None),
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|source| StoreError::Corrupt {
                    key: key.to_string(),
                    source,
                }),
        }
    }

    async fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let raw = serde_json::to_string(value)?;
        self.kv.set(key, &raw).await
    }
}
