//! Download queue entries.

use serde::{Deserialize, Serialize};

use crate::ContentType;

/// A pending download request.
///
/// Identity is `(content_type, content_id)`; `include_related` only
/// describes how the download should run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadQueueEntry {
    /// Type of the requested item.
    pub content_type: ContentType,
    /// Id of the requested item.
    pub content_id: String,
    /// Also download related items (a course's lessons).
    #[serde(default)]
    pub include_related: bool,
}

impl DownloadQueueEntry {
    /// Create a new entry.
    pub fn new(content_type: ContentType, content_id: impl Into<String>, include_related: bool) -> Self {
        Self {
            content_type,
            content_id: content_id.into(),
            include_related,
        }
    }

    /// Whether this entry requests the given item.
    pub fn matches(&self, content_type: ContentType, content_id: &str) -> bool {
        self.content_type == content_type && self.content_id == content_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_ignores_include_related() {
        let entry = DownloadQueueEntry::new(ContentType::Course, "c1", true);
        assert!(entry.matches(ContentType::Course, "c1"));
        assert!(!entry.matches(ContentType::Lesson, "c1"));
        assert!(!entry.matches(ContentType::Course, "c2"));
    }

    #[test]
    fn serializes_camel_case() {
        let entry = DownloadQueueEntry::new(ContentType::Lab, "x", false);
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["contentType"], "lab");
        assert_eq!(value["contentId"], "x");
    }
}
