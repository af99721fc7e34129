//! Downloadable content records.
//!
//! Every record keeps the fields the sync layer needs typed (`id`, `title`,
//! `size` and the nested resources it downloads) and carries the rest of the
//! server payload in `extra`, so a stored record is always the whole record.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::ModelError;

/// Kind of downloadable content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    /// A course made of modules that reference lessons.
    Course,
    /// A single lesson with optional video sections.
    Lesson,
    /// A hands-on lab.
    Lab,
    /// An assessment (no nested resources).
    Assessment,
}

impl ContentType {
    /// All content types, in catalog order.
    pub const ALL: [ContentType; 4] = [
        ContentType::Course,
        ContentType::Lesson,
        ContentType::Lab,
        ContentType::Assessment,
    ];

    /// Lowercase name used in blob names and API paths.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Course => "course",
            ContentType::Lesson => "lesson",
            ContentType::Lab => "lab",
            ContentType::Assessment => "assessment",
        }
    }

    /// Name of the catalog collection holding this type.
    pub fn collection(&self) -> &'static str {
        match self {
            ContentType::Course => "courses",
            ContentType::Lesson => "lessons",
            ContentType::Lab => "labs",
            ContentType::Assessment => "assessments",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "course" => Ok(ContentType::Course),
            "lesson" => Ok(ContentType::Lesson),
            "lab" => Ok(ContentType::Lab),
            "assessment" => Ok(ContentType::Assessment),
            other => Err(ModelError::UnknownContentType(other.to_string())),
        }
    }
}

/// Accept ids sent either as JSON strings or numbers.
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(text) => text,
        RawId::Number(number) => number.to_string(),
    })
}

/// Reference from a course module to a lesson.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonRef {
    /// Lesson identifier.
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    /// Remaining server fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A module inside a course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseModule {
    /// Module identifier.
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    /// Lessons referenced by this module, in order.
    #[serde(default)]
    pub lessons: Vec<LessonRef>,
    /// Remaining server fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A section of a lesson, optionally backed by a video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonSection {
    /// Section identifier.
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    /// Remote video location, if the section has one.
    #[serde(rename = "videoUrl", default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    /// Remaining server fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A downloaded course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    /// Server-assigned identifier.
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    /// Display title.
    #[serde(default)]
    pub title: String,
    /// Bytes used by this course's local blobs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Cover image URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Ordered modules.
    #[serde(default)]
    pub modules: Vec<CourseModule>,
    /// Remaining server fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Course {
    /// Every lesson id referenced by any module, first occurrence order,
    /// without duplicates.
    pub fn lesson_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for lesson in self.modules.iter().flat_map(|m| m.lessons.iter()) {
            if !ids.contains(&lesson.id) {
                ids.push(lesson.id.clone());
            }
        }
        ids
    }
}

/// A downloaded lesson.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    /// Server-assigned identifier.
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    /// Display title.
    #[serde(default)]
    pub title: String,
    /// Bytes used by this lesson's local blobs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Ordered sections.
    #[serde(default)]
    pub sections: Vec<LessonSection>,
    /// Remaining server fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Lesson {
    /// `(section_id, video_url)` for every section that has a video.
    pub fn videos(&self) -> impl Iterator<Item = (&str, &str)> {
        self.sections
            .iter()
            .filter_map(|s| s.video_url.as_deref().map(|url| (s.id.as_str(), url)))
    }
}

/// A downloaded lab.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lab {
    /// Server-assigned identifier.
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    /// Display title.
    #[serde(default)]
    pub title: String,
    /// Bytes used by this lab's local blobs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Cover image URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Remaining server fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A downloaded assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    /// Server-assigned identifier.
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    /// Display title.
    #[serde(default)]
    pub title: String,
    /// Bytes used by this assessment's local blobs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Remaining server fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Records stored in a catalog collection, addressed by id.
pub trait CatalogRecord {
    /// Server-assigned identifier, unique within its collection.
    fn id(&self) -> &str;
    /// Record the local byte size.
    fn set_size(&mut self, size: u64);
}

macro_rules! impl_catalog_record {
    ($($ty:ty),*) => {
        $(
            impl CatalogRecord for $ty {
                fn id(&self) -> &str {
                    &self.id
                }

                fn set_size(&mut self, size: u64) {
                    self.size = Some(size);
                }
            }
        )*
    };
}

impl_catalog_record!(Course, Lesson, Lab, Assessment);

/// A content record of any type.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentItem {
    /// A course.
    Course(Course),
    /// A lesson.
    Lesson(Lesson),
    /// A lab.
    Lab(Lab),
    /// An assessment.
    Assessment(Assessment),
}

impl ContentItem {
    /// Decode a server detail payload as the given content type.
    pub fn from_json(content_type: ContentType, value: Value) -> Result<Self, ModelError> {
        let invalid = |source| ModelError::InvalidContent {
            content_type,
            source,
        };
        Ok(match content_type {
            ContentType::Course => ContentItem::Course(serde_json::from_value(value).map_err(invalid)?),
            ContentType::Lesson => ContentItem::Lesson(serde_json::from_value(value).map_err(invalid)?),
            ContentType::Lab => ContentItem::Lab(serde_json::from_value(value).map_err(invalid)?),
            ContentType::Assessment => {
                ContentItem::Assessment(serde_json::from_value(value).map_err(invalid)?)
            }
        })
    }

    /// Encode the record back to JSON.
    pub fn to_json(&self) -> Result<Value, ModelError> {
        match self {
            ContentItem::Course(c) => serde_json::to_value(c),
            ContentItem::Lesson(l) => serde_json::to_value(l),
            ContentItem::Lab(l) => serde_json::to_value(l),
            ContentItem::Assessment(a) => serde_json::to_value(a),
        }
        .map_err(ModelError::Serialization)
    }

    /// The type of this record.
    pub fn content_type(&self) -> ContentType {
        match self {
            ContentItem::Course(_) => ContentType::Course,
            ContentItem::Lesson(_) => ContentType::Lesson,
            ContentItem::Lab(_) => ContentType::Lab,
            ContentItem::Assessment(_) => ContentType::Assessment,
        }
    }

    /// Server-assigned identifier.
    pub fn id(&self) -> &str {
        match self {
            ContentItem::Course(c) => &c.id,
            ContentItem::Lesson(l) => &l.id,
            ContentItem::Lab(l) => &l.id,
            ContentItem::Assessment(a) => &a.id,
        }
    }

    /// Display title.
    pub fn title(&self) -> &str {
        match self {
            ContentItem::Course(c) => &c.title,
            ContentItem::Lesson(l) => &l.title,
            ContentItem::Lab(l) => &l.title,
            ContentItem::Assessment(a) => &a.title,
        }
    }

    /// Recorded local size in bytes.
    pub fn size(&self) -> Option<u64> {
        match self {
            ContentItem::Course(c) => c.size,
            ContentItem::Lesson(l) => l.size,
            ContentItem::Lab(l) => l.size,
            ContentItem::Assessment(a) => a.size,
        }
    }

    /// Record the local size in bytes.
    pub fn set_size(&mut self, size: u64) {
        match self {
            ContentItem::Course(c) => c.set_size(size),
            ContentItem::Lesson(l) => l.set_size(size),
            ContentItem::Lab(l) => l.set_size(size),
            ContentItem::Assessment(a) => a.set_size(size),
        }
    }

    /// Cover image URL, for types that carry one.
    pub fn image(&self) -> Option<&str> {
        match self {
            ContentItem::Course(c) => c.image.as_deref(),
            ContentItem::Lab(l) => l.image.as_deref(),
            ContentItem::Lesson(_) | ContentItem::Assessment(_) => None,
        }
    }
}
