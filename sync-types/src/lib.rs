//! # sync-types
//!
//! Data model for offline learning content and progress sync.
//!
//! This crate provides the types shared by every other crate:
//! - [`ContentType`], [`ContentItem`] and the typed records - what can be downloaded
//! - [`ContentCatalog`] - the offline catalog with replace-by-id semantics
//! - [`ProgressMap`], [`ProgressKey`] - offline progress and its key convention
//! - [`DownloadQueueEntry`], [`StorageInfo`] - queue and storage views
//! - [`naming`] - the blob naming convention
//! - [`ModelError`] - error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod catalog;
mod content;
mod error;
pub mod naming;
mod progress;
mod queue;
mod storage;

pub use catalog::ContentCatalog;
pub use content::{
    Assessment, CatalogRecord, ContentItem, ContentType, Course, CourseModule, Lab, Lesson,
    LessonRef, LessonSection,
};
pub use error::ModelError;
pub use progress::{ProgressAttribute, ProgressKey, ProgressMap, LAST_UPDATED_KEY};
pub use queue::DownloadQueueEntry;
pub use storage::{DiskSpace, ItemCounts, StorageInfo};
