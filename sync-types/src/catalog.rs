//! The offline content catalog.
//!
//! Four collections keyed by id plus the time of the last successful write.
//! Ids are unique within a collection: `upsert` replaces in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::content::{Assessment, CatalogRecord, ContentItem, ContentType, Course, Lab, Lesson};
use crate::storage::ItemCounts;

/// Everything downloaded for offline use.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentCatalog {
    /// Downloaded courses.
    #[serde(default)]
    pub courses: Vec<Course>,
    /// Downloaded lessons (directly or as part of a course).
    #[serde(default)]
    pub lessons: Vec<Lesson>,
    /// Downloaded labs.
    #[serde(default)]
    pub labs: Vec<Lab>,
    /// Downloaded assessments.
    #[serde(default)]
    pub assessments: Vec<Assessment>,
    /// Time of the last successful catalog write or sync.
    #[serde(default)]
    pub last_synced: Option<DateTime<Utc>>,
}

fn upsert_by_id<T: CatalogRecord>(items: &mut Vec<T>, item: T) -> bool {
    match items.iter_mut().find(|existing| existing.id() == item.id()) {
        Some(existing) => {
            *existing = item;
            true
        }
        None => {
            items.push(item);
            false
        }
    }
}

fn remove_by_id<T: CatalogRecord>(items: &mut Vec<T>, id: &str) -> Option<T> {
    let index = items.iter().position(|item| item.id() == id)?;
    Some(items.remove(index))
}

fn set_size_by_id<T: CatalogRecord>(items: &mut [T], id: &str, size: u64) -> bool {
    match items.iter_mut().find(|item| item.id() == id) {
        Some(item) => {
            item.set_size(size);
            true
        }
        None => false,
    }
}

impl ContentCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, replacing any record with the same id.
    ///
    /// Returns `true` if an existing record was replaced.
    pub fn upsert(&mut self, item: ContentItem) -> bool {
        match item {
            ContentItem::Course(c) => upsert_by_id(&mut self.courses, c),
            ContentItem::Lesson(l) => upsert_by_id(&mut self.lessons, l),
            ContentItem::Lab(l) => upsert_by_id(&mut self.labs, l),
            ContentItem::Assessment(a) => upsert_by_id(&mut self.assessments, a),
        }
    }

    /// Look up a record by type and id.
    pub fn get(&self, content_type: ContentType, id: &str) -> Option<ContentItem> {
        match content_type {
            ContentType::Course => self
                .courses
                .iter()
                .find(|c| c.id == id)
                .cloned()
                .map(ContentItem::Course),
            ContentType::Lesson => self
                .lessons
                .iter()
                .find(|l| l.id == id)
                .cloned()
                .map(ContentItem::Lesson),
            ContentType::Lab => self
                .labs
                .iter()
                .find(|l| l.id == id)
                .cloned()
                .map(ContentItem::Lab),
            ContentType::Assessment => self
                .assessments
                .iter()
                .find(|a| a.id == id)
                .cloned()
                .map(ContentItem::Assessment),
        }
    }

    /// Check whether a record is present.
    pub fn contains(&self, content_type: ContentType, id: &str) -> bool {
        match content_type {
            ContentType::Course => self.courses.iter().any(|c| c.id == id),
            ContentType::Lesson => self.lessons.iter().any(|l| l.id == id),
            ContentType::Lab => self.labs.iter().any(|l| l.id == id),
            ContentType::Assessment => self.assessments.iter().any(|a| a.id == id),
        }
    }

    /// Remove and return a record.
    pub fn remove(&mut self, content_type: ContentType, id: &str) -> Option<ContentItem> {
        match content_type {
            ContentType::Course => remove_by_id(&mut self.courses, id).map(ContentItem::Course),
            ContentType::Lesson => remove_by_id(&mut self.lessons, id).map(ContentItem::Lesson),
            ContentType::Lab => remove_by_id(&mut self.labs, id).map(ContentItem::Lab),
            ContentType::Assessment => {
                remove_by_id(&mut self.assessments, id).map(ContentItem::Assessment)
            }
        }
    }

    /// Drop every lesson whose id is in `ids`, returning the removed lessons.
    pub fn remove_lessons(&mut self, ids: &[String]) -> Vec<Lesson> {
        let (removed, kept): (Vec<Lesson>, Vec<Lesson>) = std::mem::take(&mut self.lessons)
            .into_iter()
            .partition(|lesson| ids.contains(&lesson.id));
        self.lessons = kept;
        removed
    }

    /// Record the local size of a stored record. Returns `false` if absent.
    pub fn record_size(&mut self, content_type: ContentType, id: &str, size: u64) -> bool {
        match content_type {
            ContentType::Course => set_size_by_id(&mut self.courses, id, size),
            ContentType::Lesson => set_size_by_id(&mut self.lessons, id, size),
            ContentType::Lab => set_size_by_id(&mut self.labs, id, size),
            ContentType::Assessment => set_size_by_id(&mut self.assessments, id, size),
        }
    }

    /// All records of one type, in stored order.
    pub fn items(&self, content_type: ContentType) -> Vec<ContentItem> {
        match content_type {
            ContentType::Course => self.courses.iter().cloned().map(ContentItem::Course).collect(),
            ContentType::Lesson => self.lessons.iter().cloned().map(ContentItem::Lesson).collect(),
            ContentType::Lab => self.labs.iter().cloned().map(ContentItem::Lab).collect(),
            ContentType::Assessment => self
                .assessments
                .iter()
                .cloned()
                .map(ContentItem::Assessment)
                .collect(),
        }
    }

    /// Number of records of one type.
    pub fn count(&self, content_type: ContentType) -> usize {
        match content_type {
            ContentType::Course => self.courses.len(),
            ContentType::Lesson => self.lessons.len(),
            ContentType::Lab => self.labs.len(),
            ContentType::Assessment => self.assessments.len(),
        }
    }

    /// Per-type record counts.
    pub fn counts(&self) -> ItemCounts {
        ItemCounts {
            courses: self.courses.len(),
            lessons: self.lessons.len(),
            labs: self.labs.len(),
            assessments: self.assessments.len(),
        }
    }

    /// True when no collection holds a record.
    pub fn is_empty(&self) -> bool {
        self.counts().total() == 0
    }

    /// Record a successful write at `now`.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_synced = Some(now);
    }

    /// Drop every record and the last-synced marker.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
