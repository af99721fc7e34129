//! Offline learner progress.
//!
//! [`ProgressMap`] is a flat JSON object. Keys are opaque to the map; the
//! `{entity}_{id}_{attribute}` convention is interpreted by [`ProgressKey`]
//! and [`ProgressAttribute`], which the resolver uses to pick a merge rule.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key stamped by the progress tracker on every update.
pub const LAST_UPDATED_KEY: &str = "lastUpdated";

/// Per-item progress recorded while offline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProgressMap(Map<String, Value>);

impl ProgressMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Check whether a key is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Set a value, returning the previous one.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    /// Remove a value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Shallow merge: every key in `partial` overwrites the current value.
    pub fn merge(&mut self, partial: ProgressMap) {
        for (key, value) in partial.0 {
            self.0.insert(key, value);
        }
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no progress is recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over `(key, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Borrow the underlying JSON object.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Take the underlying JSON object.
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for ProgressMap {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, Value)> for ProgressMap {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Attribute named by the last `_` segment of a progress key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgressAttribute {
    /// `_progress`: completion fraction.
    Progress,
    /// `_score`: numeric score.
    Score,
    /// `_completed`: completion flag.
    Completed,
    /// `_timestamp`: ISO-8601 time of the last activity.
    Timestamp,
    /// `_attempts`: attempt counter.
    Attempts,
    /// `_answers`: submitted answers.
    Answers,
    /// Anything else, including keys without a `_` segment.
    Other,
}

impl ProgressAttribute {
    /// Classify a full progress key by its suffix.
    pub fn from_key(key: &str) -> Self {
        match key.rsplit_once('_') {
            Some((_, suffix)) => Self::from_suffix(suffix),
            None => ProgressAttribute::Other,
        }
    }

    /// Classify a bare attribute name.
    pub fn from_suffix(suffix: &str) -> Self {
        match suffix {
            "progress" => ProgressAttribute::Progress,
            "score" => ProgressAttribute::Score,
            "completed" => ProgressAttribute::Completed,
            "timestamp" => ProgressAttribute::Timestamp,
            "attempts" => ProgressAttribute::Attempts,
            "answers" => ProgressAttribute::Answers,
            _ => ProgressAttribute::Other,
        }
    }
}

/// A parsed `{entity}_{id}_{attribute}` key.
///
/// The entity is the first segment and the attribute the last; everything
/// in between is the id, so ids may themselves contain underscores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressKey<'a> {
    /// Entity kind, e.g. `course`.
    pub entity: &'a str,
    /// Entity id.
    pub id: &'a str,
    /// Raw attribute name.
    pub attribute_name: &'a str,
    /// Classified attribute.
    pub attribute: ProgressAttribute,
}

impl<'a> ProgressKey<'a> {
    /// Parse a key, returning `None` unless it has all three parts.
    pub fn parse(key: &'a str) -> Option<Self> {
        let (entity, rest) = key.split_once('_')?;
        let (id, attribute_name) = rest.rsplit_once('_')?;
        if entity.is_empty() || id.is_empty() || attribute_name.is_empty() {
            return None;
        }
        Some(Self {
            entity,
            id,
            attribute_name,
            attribute: ProgressAttribute::from_suffix(attribute_name),
        })
    }

    /// Build a key from its parts.
    pub fn format(entity: &str, id: &str, attribute: &str) -> String {
        format!("{entity}_{id}_{attribute}")
    }
}
