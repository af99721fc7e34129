//! Content removal.

use std::sync::Arc;

use sync_content::{BlobStore, LocalStore};
use sync_types::naming::content_prefix;
use sync_types::{ContentItem, ContentType};

use crate::error::ClientError;
use crate::report::{Degradation, RemoveReport, NOT_FOUND, REMOVE_FAILED};

const REMOVED: &str = "Content removed successfully";
const CLEARED: &str = "All offline content cleared";

/// Removes downloaded content and its blobs.
#[derive(Clone)]
pub struct ContentRemover {
    blobs: Arc<dyn BlobStore>,
    local: LocalStore,
}

impl ContentRemover {
    /// Create a remover.
    pub fn new(blobs: Arc<dyn BlobStore>, local: LocalStore) -> Self {
        Self { blobs, local }
    }

    /// Remove one item and its blobs.
    ///
    /// With `remove_related`, a course also takes its referenced lessons and
    /// their blobs with it.
    pub async fn remove(
        &self,
        content_type: ContentType,
        content_id: &str,
        remove_related: bool,
    ) -> RemoveReport {
        match self.try_remove(content_type, content_id, remove_related).await {
            Ok(report) => {
                tracing::info!(
                    %content_type,
                    content_id,
                    freed = report.freed_space,
                    related = report.related_content_removed,
                    degraded = report.degraded.len(),
                    "content removed"
                );
                report
            }
            Err(ClientError::NotFound { .. }) => RemoveReport::failure(NOT_FOUND),
            Err(e) => {
                tracing::warn!(%content_type, content_id, error = %e, "remove failed");
                RemoveReport::failure(REMOVE_FAILED)
            }
        }
    }

    /// [`ContentRemover::remove`] with the type given by name.
    pub async fn remove_named(
        &self,
        content_type: &str,
        content_id: &str,
        remove_related: bool,
    ) -> RemoveReport {
        match content_type.parse::<ContentType>() {
            Ok(content_type) => self.remove(content_type, content_id, remove_related).await,
            Err(e) => RemoveReport::failure(e.to_string()),
        }
    }

    /// Delete every blob and reset the catalog. Offline progress is kept.
    pub async fn clear_all(&self) -> RemoveReport {
        match self.try_clear_all().await {
            Ok(report) => {
                tracing::info!(
                    freed = report.freed_space,
                    degraded = report.degraded.len(),
                    "offline content cleared"
                );
                report
            }
            Err(e) => {
                tracing::warn!(error = %e, "clear failed");
                RemoveReport::failure(REMOVE_FAILED)
            }
        }
    }

    async fn try_remove(
        &self,
        content_type: ContentType,
        content_id: &str,
        remove_related: bool,
    ) -> Result<RemoveReport, ClientError> {
        let catalog = self.local.load_catalog().await?;
        let item = catalog
            .get(content_type, content_id)
            .ok_or_else(|| ClientError::NotFound {
                content_type,
                content_id: content_id.to_string(),
            })?;

        let related_ids = match item {
            ContentItem::Course(course) if remove_related => course.lesson_ids(),
            _ => Vec::new(),
        };

        let mut degraded = Vec::new();
        let mut freed_space = 0;
        for lesson_id in &related_ids {
            freed_space += self
                .delete_prefix(&content_prefix(ContentType::Lesson, lesson_id), &mut degraded)
                .await?;
        }
        freed_space += self
            .delete_prefix(&content_prefix(content_type, content_id), &mut degraded)
            .await?;

        let id = content_id.to_string();
        let related_content_removed = self
            .local
            .update_catalog(move |catalog| {
                catalog.remove(content_type, &id);
                catalog.remove_lessons(&related_ids).len()
            })
            .await?;

        Ok(RemoveReport {
            success: true,
            message: REMOVED.to_string(),
            freed_space,
            related_content_removed,
            degraded,
        })
    }

    async fn try_clear_all(&self) -> Result<RemoveReport, ClientError> {
        let mut degraded = Vec::new();
        let mut freed_space = 0;
        for name in self.blobs.list().await? {
            freed_space += self.delete_blob(&name, &mut degraded).await?;
        }
        self.local.update_catalog(|catalog| catalog.clear()).await?;

        Ok(RemoveReport {
            success: true,
            message: CLEARED.to_string(),
            freed_space,
            related_content_removed: 0,
            degraded,
        })
    }

    /// Delete every blob under `prefix`, returning the bytes freed.
    async fn delete_prefix(
        &self,
        prefix: &str,
        degraded: &mut Vec<Degradation>,
    ) -> Result<u64, ClientError> {
        let mut freed = 0;
        for name in self.blobs.list_prefixed(prefix).await? {
            freed += self.delete_blob(&name, degraded).await?;
        }
        Ok(freed)
    }

    async fn delete_blob(
        &self,
        name: &str,
        degraded: &mut Vec<Degradation>,
    ) -> Result<u64, ClientError> {
        let size = match self.blobs.size(name).await {
            Ok(size) => size,
            Err(e) => {
                tracing::warn!(blob = name, error = %e, "cannot read blob size");
                degraded.push(Degradation::SizeUnavailable {
                    name: name.to_string(),
                    reason: e.to_string(),
                });
                0
            }
        };
        if self.blobs.remove(name).await? {
            Ok(size)
        } else {
            Ok(0)
        }
    }
}
