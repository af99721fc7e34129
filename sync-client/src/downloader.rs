//! Content downloads.
//!
//! A download fetches the item's record, its image, and for a course its
//! referenced lessons with their videos, then upserts everything into the
//! offline catalog in one write.

use std::sync::Arc;

use chrono::Utc;
use sync_content::{BlobFetcher, LocalStore, ProgressFn};
use sync_types::naming::{content_prefix, image_blob_name, video_blob_name};
use sync_types::{CatalogRecord, ContentItem, ContentType, Lesson, ModelError};

use crate::api::{Connectivity, ContentApi};
use crate::error::ClientError;
use crate::report::{Degradation, DownloadReport, DOWNLOAD_FAILED, OFFLINE};

const DOWNLOADED: &str = "Content downloaded successfully";

fn no_progress(_: f64) {}

/// Downloads content records and their media for offline use.
#[derive(Clone)]
pub struct ContentDownloader {
    api: Arc<dyn ContentApi>,
    connectivity: Arc<dyn Connectivity>,
    fetcher: BlobFetcher,
    local: LocalStore,
}

impl ContentDownloader {
    /// Create a downloader.
    pub fn new(
        api: Arc<dyn ContentApi>,
        connectivity: Arc<dyn Connectivity>,
        fetcher: BlobFetcher,
        local: LocalStore,
    ) -> Self {
        Self {
            api,
            connectivity,
            fetcher,
            local,
        }
    }

    /// Download one item, and for a course with `include_related` its lessons.
    ///
    /// `on_progress` receives each blob transfer's fraction independently.
    pub async fn download(
        &self,
        content_type: ContentType,
        content_id: &str,
        include_related: bool,
        on_progress: Option<&ProgressFn>,
    ) -> DownloadReport {
        if !self.connectivity.status().await.is_online() {
            tracing::info!(%content_type, content_id, "download skipped: offline");
            return DownloadReport::failure(OFFLINE);
        }

        let on_progress = on_progress.unwrap_or(&no_progress);
        match self
            .try_download(content_type, content_id, include_related, on_progress)
            .await
        {
            Ok(report) => {
                tracing::info!(
                    %content_type,
                    content_id,
                    size = report.size,
                    related = report.related_content_count,
                    degraded = report.degraded.len(),
                    "content downloaded"
                );
                report
            }
            Err(e) => {
                tracing::warn!(%content_type, content_id, error = %e, "download failed");
                DownloadReport::failure(DOWNLOAD_FAILED)
            }
        }
    }

    /// [`ContentDownloader::download`] with the type given by name.
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

    async fn try_download(
        &self,
        content_type: ContentType,
        content_id: &str,
        include_related: bool,
        on_progress: &ProgressFn,
    ) -> Result<DownloadReport, ClientError> {
        let mut degraded = Vec::new();

        let detail = self.api.fetch_detail(content_type, content_id).await?;
        let mut item = ContentItem::from_json(content_type, detail)?;

        if let Some(url) = item.image().map(str::to_owned) {
            let name = image_blob_name(content_type, item.id());
            self.fetcher.ensure(&url, &name, on_progress).await?;
        }

        let mut related: Vec<Lesson> = Vec::new();
        match &item {
            ContentItem::Course(course) if include_related => {
                for lesson_id in course.lesson_ids() {
                    match self.fetch_lesson(&lesson_id, on_progress, &mut degraded).await {
                        Ok(lesson) => related.push(lesson),
                        Err(e) => {
                            tracing::warn!(%lesson_id, error = %e, "related lesson unavailable");
                            degraded.push(Degradation::RelatedLessonUnavailable {
                                lesson_id,
                                reason: e.to_string(),
                            });
                        }
                    }
                }
            }
            ContentItem::Lesson(lesson) => {
                self.fetch_videos(lesson, on_progress, &mut degraded).await;
            }
            _ => {}
        }

        let mut size = self
            .prefix_size(&content_prefix(content_type, item.id()), &mut degraded)
            .await;
        for lesson in &mut related {
            let lesson_size = self
                .prefix_size(&content_prefix(ContentType::Lesson, &lesson.id), &mut degraded)
                .await;
            lesson.set_size(lesson_size);
            size += lesson_size;
        }
        item.set_size(size);

        let related_content_count = related.len();
        let now = Utc::now();
        self.local
            .update_catalog(move |catalog| {
                catalog.upsert(item);
                for lesson in related {
                    catalog.upsert(ContentItem::Lesson(lesson));
                }
                catalog.touch(now);
            })
            .await?;

        Ok(DownloadReport {
            success: true,
            message: DOWNLOADED.to_string(),
            size,
            related_content_count,
            degraded,
        })
    }

    async fn fetch_lesson(
        &self,
        lesson_id: &str,
        on_progress: &ProgressFn,
        degraded: &mut Vec<Degradation>,
    ) -> Result<Lesson, ClientError> {
        let detail = self.api.fetch_detail(ContentType::Lesson, lesson_id).await?;
        let lesson: Lesson =
            serde_json::from_value(detail).map_err(|source| ModelError::InvalidContent {
                content_type: ContentType::Lesson,
                source,
            })?;
        self.fetch_videos(&lesson, on_progress, degraded).await;
        Ok(lesson)
    }

    async fn fetch_videos(
        &self,
        lesson: &Lesson,
        on_progress: &ProgressFn,
        degraded: &mut Vec<Degradation>,
    ) {
        for (section_id, url) in lesson.videos() {
            let name = video_blob_name(&lesson.id, section_id);
            if let Err(e) = self.fetcher.ensure(url, &name, on_progress).await {
                tracing::warn!(blob = %name, error = %e, "video unavailable");
                degraded.push(Degradation::BlobUnavailable {
                    name,
                    reason: e.to_string(),
                });
            }
        }
    }

    /// Bytes of stored blobs under `prefix`. Unreadable sizes count as 0.
    async fn prefix_size(&self, prefix: &str, degraded: &mut Vec<Degradation>) -> u64 {
        let store = self.fetcher.store();
        let names = match store.list_prefixed(prefix).await {
            Ok(names) => names,
            Err(e) => {
                tracing::warn!(prefix, error = %e, "cannot list blobs");
                degraded.push(Degradation::SizeUnavailable {
                    name: prefix.to_string(),
                    reason: e.to_string(),
                });
                return 0;
            }
        };

        let mut total = 0;
        for name in names {
            match store.size(&name).await {
                Ok(bytes) => total += bytes,
                Err(e) => {
                    tracing::warn!(blob = %name, error = %e, "cannot read blob size");
                    degraded.push(Degradation::SizeUnavailable {
                        name,
                        reason: e.to_string(),
                    });
                }
            }
        }
        total
    }
}
