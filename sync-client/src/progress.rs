//! Offline progress tracking.

use chrono::Utc;
use serde_json::Value;
use sync_content::LocalStore;
use sync_core::values_equal;
use sync_types::{ProgressMap, LAST_UPDATED_KEY};

use crate::error::ClientError;

/// Records learner progress locally until the next sync.
///
/// Updates are shallow merges persisted before returning. No history is
/// kept; merging with the server happens only at sync time.
#[derive(Clone)]
pub struct ProgressTracker {
    local: LocalStore,
}

impl ProgressTracker {
    /// Create a tracker over the local store.
    pub fn new(local: LocalStore) -> Self {
        Self { local }
    }

    /// Current offline progress.
    pub async fn get(&self) -> Result<ProgressMap, ClientError> {
        Ok(self.local.load_progress().await?)
    }

    /// Merge `partial` over the stored map and stamp `lastUpdated`.
    ///
    /// Returns the map as persisted.
    pub async fn update(&self, partial: ProgressMap) -> Result<ProgressMap, ClientError> {
        let now = Utc::now().to_rfc3339();
        let updated = self
            .local
            .update_progress(move |progress| {
                progress.merge(partial);
                progress.insert(LAST_UPDATED_KEY, Value::String(now));
                progress.clone()
            })
            .await?;
        tracing::debug!(keys = updated.len(), "offline progress updated");
        Ok(updated)
    }

    /// Set a single key.
    pub async fn record(
        &self,
        key: impl Into<String>,
        value: Value,
    ) -> Result<ProgressMap, ClientError> {
        let mut partial = ProgressMap::new();
        partial.insert(key, value);
        self.update(partial).await
    }

    /// Drop all offline progress.
    pub async fn clear(&self) -> Result<(), ClientError> {
        Ok(self.local.clear_progress().await?)
    }

    /// Drop the entries of `synced` that are still unchanged locally.
    ///
    /// Keys written after the snapshot was taken survive.
    pub async fn clear_synced(&self, synced: &ProgressMap) -> Result<usize, ClientError> {
        let removed = self
            .local
            .update_progress(|progress| {
                let stale: Vec<String> = synced
                    .iter()
                    .filter(|(key, value)| {
                        progress
                            .get(key)
                            .is_some_and(|current| values_equal(current, value))
                    })
                    .map(|(key, _)| key.clone())
                    .collect();
                for key in &stale {
                    progress.remove(key);
                }
                // A lone timestamp carries no progress.
                if progress.len() == 1 && progress.contains_key(LAST_UPDATED_KEY) {
                    progress.remove(LAST_UPDATED_KEY);
                }
                stale.len()
            })
            .await?;
        Ok(removed)
    }
}
