//! The offline service: one object owning every offline operation.
//!
//! Hosts build an [`OfflineService`] from their collaborators and a config,
//! call [`OfflineService::init`] once, and drive it from UI actions and
//! connectivity callbacks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sync_content::{BlobFetcher, BlobSource, BlobStore, KeyValueStore, LocalStore, ProgressFn};
use sync_core::{DownloadQueue, SyncEvent, SyncState};
use sync_types::{ContentItem, ContentType, DownloadQueueEntry, ProgressMap, StorageInfo};
use tokio::sync::{broadcast, Mutex};

use crate::api::{Connectivity, ContentApi, ProgressServer};
use crate::config::OfflineConfig;
use crate::downloader::ContentDownloader;
use crate::error::ClientError;
use crate::orchestrator::SyncOrchestrator;
use crate::progress::ProgressTracker;
use crate::remover::ContentRemover;
use crate::report::{
    Degradation, DownloadReport, RemoveReport, StorageReport, SyncReport, DOWNLOAD_FAILED,
};

/// External dependencies of the service.
#[derive(Clone)]
pub struct Collaborators {
    /// Source of content records.
    pub content_api: Arc<dyn ContentApi>,
    /// Network probe.
    pub connectivity: Arc<dyn Connectivity>,
    /// Server side of progress sync.
    pub progress_server: Arc<dyn ProgressServer>,
    /// Remote blob downloads.
    pub blob_source: Arc<dyn BlobSource>,
    /// Local blob storage.
    pub blob_store: Arc<dyn BlobStore>,
    /// Local document storage.
    pub kv: Arc<dyn KeyValueStore>,
}

/// User-facing feature toggles, persisted under `offlineSettings`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OfflineSettings {
    /// Downloads are allowed.
    pub offline_mode_enabled: bool,
    /// Sync automatically when the device comes back online.
    pub auto_sync: bool,
}

impl Default for OfflineSettings {
    fn default() -> Self {
        Self {
            offline_mode_enabled: true,
            auto_sync: true,
        }
    }
}

/// Offline content and progress sync for one user.
///
/// Cheap to clone; clones share the queue, the sync state and storage.
#[derive(Clone)]
pub struct OfflineService {
    config: OfflineConfig,
    connectivity: Arc<dyn Connectivity>,
    blobs: Arc<dyn BlobStore>,
    local: LocalStore,
    downloader: ContentDownloader,
    remover: ContentRemover,
    tracker: ProgressTracker,
    orchestrator: SyncOrchestrator,
    queue: Arc<Mutex<DownloadQueue>>,
    online: Arc<AtomicBool>,
}

impl OfflineService {
    /// Wire the service from its collaborators.
    pub fn new(collaborators: Collaborators, config: OfflineConfig) -> Self {
        let Collaborators {
            content_api,
            connectivity,
            progress_server,
            blob_source,
            blob_store,
            kv,
        } = collaborators;

        let local = LocalStore::new(kv);
        let fetcher = BlobFetcher::new(Arc::clone(&blob_store), blob_source);
        let downloader = ContentDownloader::new(
            content_api,
            Arc::clone(&connectivity),
            fetcher,
            local.clone(),
        );
        let remover = ContentRemover::new(Arc::clone(&blob_store), local.clone());
        let orchestrator = SyncOrchestrator::new(
            progress_server,
            Arc::clone(&connectivity),
            local.clone(),
            config.sync.event_buffer,
        );
        let queue = DownloadQueue::new(config.downloads.max_queue_size);

        Self {
            connectivity,
            blobs: blob_store,
            tracker: ProgressTracker::new(local.clone()),
            local,
            downloader,
            remover,
            orchestrator,
            queue: Arc::new(Mutex::new(queue)),
            online: Arc::new(AtomicBool::new(true)),
            config,
        }
    }

    /// Check that stored documents are readable and record the current
    /// network state.
    pub async fn init(&self) -> Result<(), ClientError> {
        let catalog = self.local.load_catalog().await?;
        self.local.load_progress().await?;
        self.settings().await?;

        let online = self.connectivity.status().await.is_online();
        self.online.store(online, Ordering::SeqCst);

        tracing::info!(
            items = catalog.counts().total(),
            online,
            "offline service ready"
        );
        Ok(())
    }

    /// Drop pending downloads. The active one, if any, runs to completion.
    pub async fn dispose(&self) {
        let dropped = self.cancel_all_downloads().await;
        tracing::info!(dropped, "offline service disposed");
    }

    // ============================================================
    // Download queue
    // ============================================================

    /// Queue a download. `include_related` defaults to the configured value.
    pub async fn request_download(
        &self,
        content_type: ContentType,
        content_id: &str,
        include_related: Option<bool>,
    ) -> Result<(), ClientError> {
        if !self.settings().await?.offline_mode_enabled {
            return Err(ClientError::OfflineModeDisabled);
        }

        let include_related = include_related.unwrap_or(self.config.downloads.include_related);
        self.queue.lock().await.enqueue(DownloadQueueEntry::new(
            content_type,
            content_id,
            include_related,
        ))?;
        tracing::debug!(%content_type, content_id, "download queued");
        Ok(())
    }

    /// Download queued entries one at a time until the queue is empty.
    ///
    /// Returns immediately with no reports if another caller is already
    /// processing the queue.
    pub async fn process_queue(&self) -> Vec<DownloadReport> {
        let mut reports = Vec::new();
        loop {
            let Some(entry) = self.queue.lock().await.start_next() else {
                break;
            };
            let report = self
                .downloader
                .download(
                    entry.content_type,
                    &entry.content_id,
                    entry.include_related,
                    None,
                )
                .await;
            self.queue.lock().await.complete();
            reports.push(report);
        }
        reports
    }

    /// Remove a queued download that has not started.
    pub async fn cancel_download(
        &self,
        content_type: ContentType,
        content_id: &str,
    ) -> Result<(), ClientError> {
        self.queue.lock().await.cancel(content_type, content_id)?;
        Ok(())
    }

    /// Remove every queued download that has not started.
    pub async fn cancel_all_downloads(&self) -> usize {
        self.queue.lock().await.cancel_all()
    }

    /// Queued downloads in order, the active one first.
    pub async fn queued_downloads(&self) -> Vec<DownloadQueueEntry> {
        self.queue.lock().await.entries()
    }

    /// Whether a queued download is running.
    pub async fn is_downloading(&self) -> bool {
        self.queue.lock().await.is_downloading()
    }

    // ============================================================
    // Content
    // ============================================================

    /// Download one item now, bypassing the queue.
    pub async fn download(
        &self,
        content_type: ContentType,
        content_id: &str,
        include_related: bool,
        on_progress: Option<&ProgressFn>,
    ) -> DownloadReport {
        match self.settings().await {
            Ok(settings) if !settings.offline_mode_enabled => {
                DownloadReport::failure(ClientError::OfflineModeDisabled.to_string())
            }
            Ok(_) => {
                self.downloader
                    .download(content_type, content_id, include_related, on_progress)
                    .await
            }
            Err(e) => {
                tracing::warn!(error = %e, "cannot read offline settings");
                DownloadReport::failure(DOWNLOAD_FAILED)
            }
        }
    }

    /// [`OfflineService::download`] with the type given by name.
    pub async fn download_named(
        &self,
        content_type: &str,
        content_id: &str,
        include_related: bool,
        on_progress: Option<&ProgressFn>,
    ) -> DownloadReport {
        match content_type.parse::<ContentType>() {
            Ok(content_type) => {
                self.download(content_type, content_id, include_related, on_progress)
                    .await
            }
            Err(e) => DownloadReport::failure(e.to_string()),
        }
    }

    /// Remove one item and its blobs.
    pub async fn remove(
        &self,
        content_type: ContentType,
        content_id: &str,
        remove_related: bool,
    ) -> RemoveReport {
        self.remover
            .remove(content_type, content_id, remove_related)
            .await
    }

    /// [`OfflineService::remove`] with the type given by name.
    pub async fn remove_named(
        &self,
        content_type: &str,
        content_id: &str,
        remove_related: bool,
    ) -> RemoveReport {
        self.remover
            .remove_named(content_type, content_id, remove_related)
            .await
    }

    /// Delete all downloaded content. Offline progress is kept.
    pub async fn clear_all(&self) -> RemoveReport {
        self.remover.clear_all().await
    }

    /// Bytes used, per-type counts and device space.
    ///
    /// Blobs whose size cannot be read are left out of the total and listed
    /// on the report.
    pub async fn storage_info(&self) -> Result<StorageReport, ClientError> {
        let counts = self.local.load_catalog().await?.counts();

        let mut used = 0;
        let mut degraded = Vec::new();
        for name in self.blobs.list().await? {
            match self.blobs.size(&name).await {
                Ok(bytes) => used += bytes,
                Err(e) => {
                    tracing::warn!(blob = %name, error = %e, "cannot read blob size");
                    degraded.push(Degradation::SizeUnavailable {
                        name,
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok(StorageReport {
            info: StorageInfo::new(used, counts, self.blobs.disk_space().await),
            degraded,
        })
    }

    /// Whether the item is in the offline catalog.
    pub async fn is_available_offline(
        &self,
        content_type: ContentType,
        content_id: &str,
    ) -> Result<bool, ClientError> {
        Ok(self
            .local
            .load_catalog()
            .await?
            .contains(content_type, content_id))
    }

    /// Every downloaded item of one type.
    pub async fn offline_content(
        &self,
        content_type: ContentType,
    ) -> Result<Vec<ContentItem>, ClientError> {
        Ok(self.local.load_catalog().await?.items(content_type))
    }

    // ============================================================
    // Progress and sync
    // ============================================================

    /// Offline progress not yet synced.
    pub async fn progress(&self) -> Result<ProgressMap, ClientError> {
        self.tracker.get().await
    }

    /// Merge `partial` into offline progress.
    pub async fn update_progress(&self, partial: ProgressMap) -> Result<ProgressMap, ClientError> {
        self.tracker.update(partial).await
    }

    /// Sync offline progress with the server now.
    pub async fn sync_changes(&self) -> SyncReport {
        self.orchestrator.sync_changes().await
    }

    /// Current sync state.
    pub async fn sync_status(&self) -> SyncState {
        self.orchestrator.status().await
    }

    /// Reason of the last failed sync.
    pub async fn last_sync_error(&self) -> Option<String> {
        self.orchestrator.last_error().await
    }

    /// Acknowledge a failed sync.
    pub async fn reset_sync(&self) {
        self.orchestrator.reset().await
    }

    /// Receive sync lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.orchestrator.subscribe()
    }

    /// Feed a connectivity change from the platform.
    ///
    /// Coming back online with auto-sync on (in both the config and the
    /// stored settings) syncs immediately and returns the report.
    pub async fn on_connectivity_changed(&self, online: bool) -> Option<SyncReport> {
        let was_online = self.online.swap(online, Ordering::SeqCst);
        if !online || was_online {
            return None;
        }
        tracing::info!("connectivity restored");

        if !self.config.sync.auto_sync {
            return None;
        }
        match self.settings().await {
            Ok(settings) if settings.auto_sync => Some(self.sync_changes().await),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, "cannot read offline settings");
                None
            }
        }
    }

    // ============================================================
    // Settings
    // ============================================================

    /// Stored feature toggles, or defaults.
    pub async fn settings(&self) -> Result<OfflineSettings, ClientError> {
        Ok(self.local.load_settings().await?)
    }

    /// Persist feature toggles.
    pub async fn update_settings(&self, settings: OfflineSettings) -> Result<(), ClientError> {
        self.local.save_settings(&settings).await?;
        tracing::debug!(?settings, "offline settings updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockConnectivity, MockContentApi, MockProgressServer};
    use serde_json::json;
    use sync_content::{MemoryBlobSource, MemoryBlobStore, MemoryKvStore};
    use sync_core::QueueError;
    use sync_types::DiskSpace;

    struct Harness {
        service: OfflineService,
        api: MockContentApi,
        connectivity: MockConnectivity,
        server: MockProgressServer,
        blobs: MemoryBlobStore,
    }

    fn harness_with(config: OfflineConfig) -> Harness {
        let api = MockContentApi::new();
        let connectivity = MockConnectivity::new(true);
        let server = MockProgressServer::new();
        let blobs = MemoryBlobStore::new();
        let source = MemoryBlobSource::new();
        source.insert("https://cdn/lab.png", vec![9u8; 40]);

        for id in ["1", "2", "3"] {
            api.insert(ContentType::Assessment, id, json!({"id": id}));
        }
        api.insert(
            ContentType::Lab,
            "7",
            json!({"id": "7", "image": "https://cdn/lab.png"}),
        );

        let service = OfflineService::new(
            Collaborators {
                content_api: Arc::new(api.clone()),
                connectivity: Arc::new(connectivity.clone()),
                progress_server: Arc::new(server.clone()),
                blob_source: Arc::new(source),
                blob_store: Arc::new(blobs.clone()),
                kv: Arc::new(MemoryKvStore::new()),
            },
            config,
        );
        Harness {
            service,
            api,
            connectivity,
            server,
            blobs,
        }
    }

    fn harness() -> Harness {
        harness_with(OfflineConfig::default())
    }

    fn progress(key: &str, value: serde_json::Value) -> ProgressMap {
        let mut map = ProgressMap::new();
        map.insert(key, value);
        map
    }

    // ============================================================
    // Queue
    // ============================================================

    #[tokio::test]
    async fn queue_processes_in_order() {
        let h = harness();
        h.service.init().await.unwrap();
        h.service
            .request_download(ContentType::Assessment, "2", None)
            .await
            .unwrap();
        h.service
            .request_download(ContentType::Assessment, "1", Some(false))
            .await
            .unwrap();

        let reports = h.service.process_queue().await;

        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| r.success));
        assert_eq!(
            h.api.calls(),
            vec![
                (ContentType::Assessment, "2".to_string()),
                (ContentType::Assessment, "1".to_string()),
            ]
        );
        assert!(h.service.queued_downloads().await.is_empty());
        assert!(!h.service.is_downloading().await);
    }

    #[tokio::test]
    async fn duplicate_request_is_rejected() {
        let h = harness();
        h.service
            .request_download(ContentType::Assessment, "1", None)
            .await
            .unwrap();

        let err = h
            .service
            .request_download(ContentType::Assessment, "1", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Queue(QueueError::Duplicate { .. })));
        assert_eq!(h.service.queued_downloads().await.len(), 1);
    }

    #[tokio::test]
    async fn queue_capacity_comes_from_config() {
        let mut config = OfflineConfig::default();
        config.downloads.max_queue_size = 1;
        let h = harness_with(config);

        h.service
            .request_download(ContentType::Assessment, "1", None)
            .await
            .unwrap();
        let err = h
            .service
            .request_download(ContentType::Assessment, "2", None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::Queue(QueueError::Full { capacity: 1 })
        ));
    }

    #[tokio::test]
    async fn cancel_removes_pending_entries() {
        let h = harness();
        for id in ["1", "2", "3"] {
            h.service
                .request_download(ContentType::Assessment, id, None)
                .await
                .unwrap();
        }

        h.service
            .cancel_download(ContentType::Assessment, "2")
            .await
            .unwrap();
        assert!(h
            .service
            .cancel_download(ContentType::Assessment, "2")
            .await
            .is_err());

        assert_eq!(h.service.cancel_all_downloads().await, 2);
        assert!(h.service.process_queue().await.is_empty());
    }

    #[tokio::test]
    async fn disabled_offline_mode_blocks_downloads() {
        let h = harness();
        h.service
            .update_settings(OfflineSettings {
                offline_mode_enabled: false,
                auto_sync: true,
            })
            .await
            .unwrap();

        let err = h
            .service
            .request_download(ContentType::Assessment, "1", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::OfflineModeDisabled));

        let report = h
            .service
            .download(ContentType::Assessment, "1", false, None)
            .await;
        assert_eq!(report.message, "Offline mode is disabled");
        assert!(h.api.calls().is_empty());
    }

    // ============================================================
    // Content
    // ============================================================

    #[tokio::test]
    async fn storage_info_counts_blobs_and_items() {
        let h = harness();
        h.blobs.set_disk_space(DiskSpace {
            available: 600,
            total: 1000,
        });

        assert!(h.service.download(ContentType::Lab, "7", false, None).await.success);
        assert!(h
            .service
            .download_named("assessment", "1", false, None)
            .await
            .success);

        let report = h.service.storage_info().await.unwrap();
        assert!(!report.is_degraded());
        let info = report.info;
        assert_eq!(info.total_bytes_used, 40);
        assert_eq!(info.counts.labs, 1);
        assert_eq!(info.counts.assessments, 1);
        assert_eq!(info.device_free, Some(600));
        assert!((info.percent_used - 4.0).abs() < 1e-9);

        assert!(h
            .service
            .is_available_offline(ContentType::Lab, "7")
            .await
            .unwrap());
        assert_eq!(
            h.service
                .offline_content(ContentType::Assessment)
                .await
                .unwrap()
                .len(),
            1
        );

        let removed = h.service.remove_named("lab", "7", false).await;
        assert_eq!(removed.freed_space, 40);
        assert!(!h
            .service
            .is_available_offline(ContentType::Lab, "7")
            .await
            .unwrap());

        assert!(h.service.clear_all().await.success);
        assert_eq!(h.service.storage_info().await.unwrap().info.counts.total(), 0);
    }

    #[tokio::test]
    async fn storage_info_lists_unmeasured_blobs() {
        let h = harness();
        h.blobs.put("lab_7_image", &[0u8; 30]).await.unwrap();
        h.blobs.put("lab_8_image", &[0u8; 12]).await.unwrap();
        h.blobs.fail_size_for("lab_7_image");

        let report = h.service.storage_info().await.unwrap();

        assert_eq!(report.info.total_bytes_used, 12);
        assert!(matches!(
            report.degraded.as_slice(),
            [Degradation::SizeUnavailable { name, .. }] if name == "lab_7_image"
        ));
    }

    // ============================================================
    // Sync and connectivity
    // ============================================================

    #[tokio::test]
    async fn reconnect_triggers_sync() {
        let h = harness();
        h.connectivity.set_online(false);
        h.service.init().await.unwrap();
        h.service
            .update_progress(progress("lesson_1_completed", json!(true)))
            .await
            .unwrap();

        h.connectivity.set_online(true);
        let report = h.service.on_connectivity_changed(true).await.unwrap();

        assert!(report.success);
        assert_eq!(h.server.pushed().len(), 1);
        assert!(h.service.progress().await.unwrap().is_empty());
        assert_eq!(h.service.sync_status().await, SyncState::Idle);
    }

    #[tokio::test]
    async fn staying_online_does_not_sync() {
        let h = harness();
        h.service.init().await.unwrap();
        h.service
            .update_progress(progress("lesson_1_completed", json!(true)))
            .await
            .unwrap();

        assert!(h.service.on_connectivity_changed(true).await.is_none());
        assert!(h.service.on_connectivity_changed(false).await.is_none());
        assert!(h.server.exchanged().is_empty());
    }

    #[tokio::test]
    async fn auto_sync_setting_off_skips_sync() {
        let h = harness();
        h.service
            .update_settings(OfflineSettings {
                offline_mode_enabled: true,
                auto_sync: false,
            })
            .await
            .unwrap();
        h.service.on_connectivity_changed(false).await;

        assert!(h.service.on_connectivity_changed(true).await.is_none());
        assert!(h.server.exchanged().is_empty());
    }

    #[tokio::test]
    async fn sync_failure_is_visible_until_reset() {
        let h = harness();
        h.service
            .update_progress(progress("lab_7_score", json!(3)))
            .await
            .unwrap();
        h.server.fail_next_push("unavailable");

        assert!(!h.service.sync_changes().await.success);
        assert!(h.service.last_sync_error().await.is_some());

        h.service.reset_sync().await;
        assert!(h.service.last_sync_error().await.is_none());
    }

    #[tokio::test]
    async fn settings_default_and_roundtrip() {
        let h = harness();
        assert_eq!(h.service.settings().await.unwrap(), OfflineSettings::default());

        let settings = OfflineSettings {
            offline_mode_enabled: false,
            auto_sync: false,
        };
        h.service.update_settings(settings).await.unwrap();
        assert_eq!(h.service.settings().await.unwrap(), settings);
    }

    #[test]
    fn settings_serialize_camel_case() {
        let value = serde_json::to_value(OfflineSettings::default()).unwrap();
        assert_eq!(value, json!({"offlineModeEnabled": true, "autoSync": true}));

        let partial: OfflineSettings = serde_json::from_value(json!({"autoSync": false})).unwrap();
        assert!(partial.offline_mode_enabled);
        assert!(!partial.auto_sync);
    }
}
