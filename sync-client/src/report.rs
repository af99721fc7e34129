//! Structured results returned by public operations.
//!
//! Every public operation answers with a report instead of an error, so the
//! UI layer always gets `success` plus a message it can show.

use serde::Serialize;
use sync_types::StorageInfo;

pub(crate) const OFFLINE: &str = "No internet connection";
pub(crate) const NOT_FOUND: &str = "Content not found";
pub(crate) const DOWNLOAD_FAILED: &str = "Failed to download content";
pub(crate) const REMOVE_FAILED: &str = "Failed to remove content";
pub(crate) const SYNC_FAILED: &str = "Failed to sync changes";
pub(crate) const SYNC_IN_PROGRESS: &str = "Sync already in progress";
pub(crate) const NO_PROGRESS: &str = "No progress to sync";

/// A sub-step that failed without failing its operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Degradation {
    /// A lesson referenced by a course could not be fetched and was left out.
    #[serde(rename_all = "camelCase")]
    RelatedLessonUnavailable {
        /// Lesson id.
        lesson_id: String,
        /// Failure description.
        reason: String,
    },
    /// A lesson video could not be downloaded.
    BlobUnavailable {
        /// Blob name.
        name: String,
        /// Failure description.
        reason: String,
    },
    /// A blob size could not be read and counted as 0.
    SizeUnavailable {
        /// Blob name or content prefix.
        name: String,
        /// Failure description.
        reason: String,
    },
}

/// Result of a content download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadReport {
    /// Whether the item was stored.
    pub success: bool,
    /// Human readable outcome.
    pub message: String,
    /// Bytes of local blobs belonging to the item and its related lessons.
    pub size: u64,
    /// Related lessons stored alongside a course.
    pub related_content_count: usize,
    /// Sub-steps that failed without failing the download.
    pub degraded: Vec<Degradation>,
}

impl DownloadReport {
    pub(crate) fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            size: 0,
            related_content_count: 0,
            degraded: Vec::new(),
        }
    }

    /// Whether any sub-step failed.
    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }
}

/// Result of a content removal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveReport {
    /// Whether the item was removed.
    pub success: bool,
    /// Human readable outcome.
    pub message: String,
    /// Bytes of the blobs actually deleted.
    pub freed_space: u64,
    /// Related lessons dropped from the catalog.
    pub related_content_removed: usize,
    /// Blobs whose size could not be read; `freed_space` excludes them.
    pub degraded: Vec<Degradation>,
}

impl RemoveReport {
    pub(crate) fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            freed_space: 0,
            related_content_removed: 0,
            degraded: Vec::new(),
        }
    }

    /// Whether any blob size went uncounted.
    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }
}

/// Storage usage with the blobs that could not be measured.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageReport {
    /// The usage snapshot.
    #[serde(flatten)]
    pub info: StorageInfo,
    /// Blobs left out of `total_bytes_used`.
    pub degraded: Vec<Degradation>,
}

impl StorageReport {
    /// Whether `total_bytes_used` is a lower bound.
    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }
}

/// Result of a progress sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    /// Whether local progress reached the server (or there was none).
    pub success: bool,
    /// Human readable outcome.
    pub message: String,
    /// Keys in the resolved map pushed to the server.
    pub merged_keys: usize,
}

impl SyncReport {
    pub(crate) fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            merged_keys: 0,
        }
    }

    pub(crate) fn success(message: impl Into<String>, merged_keys: usize) -> Self {
        Self {
            success: true,
            message: message.into(),
            merged_keys,
        }
    }
}
