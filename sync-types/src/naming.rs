//! Blob naming convention: `{type}_{id}[_resource][_subId]`.
//!
//! A blob belongs to a content item when its name equals the item prefix
//! or continues it with `_`. `course_1` owns `course_1_image` but not
//! `course_10_image`.

use crate::ContentType;

/// Prefix shared by every blob of one content item.
pub fn content_prefix(content_type: ContentType, content_id: &str) -> String {
    format!("{}_{}", content_type.as_str(), content_id)
}

/// Name of a content item's cover image blob.
pub fn image_blob_name(content_type: ContentType, content_id: &str) -> String {
    format!("{}_image", content_prefix(content_type, content_id))
}

/// Name of the video blob for one lesson section.
pub fn video_blob_name(lesson_id: &str, section_id: &str) -> String {
    format!(
        "{}_video_{}",
        content_prefix(ContentType::Lesson, lesson_id),
        section_id
    )
}

/// Whether `name` is a blob of the item identified by `prefix`.
pub fn blob_belongs_to(name: &str, prefix: &str) -> bool {
    match name.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('_'),
        None => false,
    }
}
