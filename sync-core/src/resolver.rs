//! Conflict resolution between local and remote JSON state.
//!
//! Two ways in:
//!
//! - A three-stage pipeline for callers that need provenance:
//!   [`detect_conflicts`] → [`generate_resolution_strategy`] →
//!   [`apply_resolution_strategy`].
//! - Single-pass helpers: [`resolve_progress_conflicts`] for the flat
//!   progress map (the sync hot path) and [`resolve_content_conflicts`]
//!   for whole content records.
//!
//! Which rule applies to a progress key is decided once, by parsing the key
//! into a [`ProgressAttribute`] and mapping it through [`Strategy::for_attribute`].

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sync_types::{ProgressAttribute, ProgressMap};

/// Field carrying a whole-record modification time on content objects.
pub const LAST_MODIFIED_FIELD: &str = "lastModified";

/// A difference between local and remote state for one key.
#[derive(Debug, Clone, PartialEq)]
pub enum Conflict {
    /// Both sides hold different non-object values.
    Value {
        /// Conflicting key.
        key: String,
        /// Local value.
        local: Value,
        /// Remote value.
        remote: Value,
    },
    /// Both sides hold objects that differ somewhere inside.
    Nested {
        /// Key of the object.
        key: String,
        /// Conflicts found inside the object.
        conflicts: Vec<Conflict>,
    },
}

impl Conflict {
    /// The key this conflict is about.
    pub fn key(&self) -> &str {
        match self {
            Conflict::Value { key, .. } | Conflict::Nested { key, .. } => key,
        }
    }
}

/// How to pick a value when both sides have one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Keep the local value.
    Local,
    /// Keep the remote value.
    Remote,
    /// Larger number wins.
    Max,
    /// Smaller number wins.
    Min,
    /// Logical OR of both values.
    BooleanOr,
    /// Logical AND of both values.
    BooleanAnd,
    /// Later timestamp wins.
    Recent,
    /// Set union of two arrays.
    Union,
}

impl Strategy {
    /// Registry of merge rules by progress attribute.
    pub fn for_attribute(attribute: ProgressAttribute) -> Self {
        match attribute {
            ProgressAttribute::Progress | ProgressAttribute::Score | ProgressAttribute::Attempts => {
                Strategy::Max
            }
            ProgressAttribute::Completed => Strategy::BooleanOr,
            ProgressAttribute::Timestamp => Strategy::Recent,
            ProgressAttribute::Answers => Strategy::Union,
            ProgressAttribute::Other => Strategy::Local,
        }
    }

    /// Merge rule for a full progress key.
    pub fn for_key(key: &str) -> Self {
        Self::for_attribute(ProgressAttribute::from_key(key))
    }

    /// Parse a strategy token. Unknown tokens fall back to [`Strategy::Local`].
    pub fn from_token(token: &str) -> Self {
        match token {
            "remote" => Strategy::Remote,
            "max" => Strategy::Max,
            "min" => Strategy::Min,
            "boolean_or" => Strategy::BooleanOr,
            "boolean_and" => Strategy::BooleanAnd,
            "recent" => Strategy::Recent,
            "union" => Strategy::Union,
            _ => Strategy::Local,
        }
    }

    /// The token naming this strategy.
    pub fn token(&self) -> &'static str {
        match self {
            Strategy::Local => "local",
            Strategy::Remote => "remote",
            Strategy::Max => "max",
            Strategy::Min => "min",
            Strategy::BooleanOr => "boolean_or",
            Strategy::BooleanAnd => "boolean_and",
            Strategy::Recent => "recent",
            Strategy::Union => "union",
        }
    }
}

/// Strategy for one key: a rule, or a plan for a nested object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StrategyNode {
    /// Apply this rule to the value.
    Leaf(Strategy),
    /// Recurse into the object with this plan.
    Nested(StrategyPlan),
}

/// Per-key resolution plan.
pub type StrategyPlan = BTreeMap<String, StrategyNode>;

/// Structural equality; numbers compare by value, arrays by order.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
                x == y
            } else if let (Some(x), Some(y)) = (x.as_u64(), y.as_u64()) {
                x == y
            } else {
                x.as_f64() == y.as_f64()
            }
        }
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| values_equal(a, b))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .all(|(k, v)| y.get(k).is_some_and(|other| values_equal(v, other)))
        }
        _ => a == b,
    }
}

/// Walk `local`'s keys and report those whose remote value differs.
///
/// Keys missing from `remote` are local-only and never conflict. Keys only
/// present in `remote` are not inspected.
pub fn detect_conflicts(local: &Map<String, Value>, remote: &Map<String, Value>) -> Vec<Conflict> {
    let mut conflicts = Vec::new();

    for (key, local_value) in local {
        let Some(remote_value) = remote.get(key) else {
            continue;
        };

        match (local_value, remote_value) {
            (Value::Object(l), Value::Object(r)) => {
                let nested = detect_conflicts(l, r);
                if !nested.is_empty() {
                    conflicts.push(Conflict::Nested {
                        key: key.clone(),
                        conflicts: nested,
                    });
                }
            }
            _ if !values_equal(local_value, remote_value) => conflicts.push(Conflict::Value {
                key: key.clone(),
                local: local_value.clone(),
                remote: remote_value.clone(),
            }),
            _ => {}
        }
    }

    conflicts
}

/// Pick a strategy for every conflicting key.
pub fn generate_resolution_strategy(conflicts: &[Conflict]) -> StrategyPlan {
    conflicts
        .iter()
        .map(|conflict| match conflict {
            Conflict::Value { key, .. } => (key.clone(), StrategyNode::Leaf(Strategy::for_key(key))),
            Conflict::Nested { key, conflicts } => (
                key.clone(),
                StrategyNode::Nested(generate_resolution_strategy(conflicts)),
            ),
        })
        .collect()
}

/// Merge `local` into a copy of `remote` following `plan`.
///
/// Keys in the plan that are missing on either side are left as in `remote`.
pub fn apply_resolution_strategy(
    local: &Map<String, Value>,
    remote: &Map<String, Value>,
    plan: &StrategyPlan,
) -> Map<String, Value> {
    let mut merged = remote.clone();

    for (key, node) in plan {
        let (Some(local_value), Some(remote_value)) = (local.get(key), remote.get(key)) else {
            continue;
        };

        let value = match node {
            StrategyNode::Leaf(strategy) => {
                if values_equal(local_value, remote_value) {
                    remote_value.clone()
                } else {
                    apply_strategy(*strategy, local_value, remote_value)
                }
            }
            StrategyNode::Nested(sub_plan) => match (local_value, remote_value) {
                (Value::Object(l), Value::Object(r)) => {
                    Value::Object(apply_resolution_strategy(l, r, sub_plan))
                }
                _ => local_value.clone(),
            },
        };
        merged.insert(key.clone(), value);
    }

    merged
}

/// Merge local progress with the server's in one pass.
///
/// Starts from `remote`, adopts local-only keys, and resolves shared keys
/// with the attribute registry.
pub fn resolve_progress_conflicts(local: &ProgressMap, remote: &ProgressMap) -> ProgressMap {
    let mut resolved = remote.clone();

    for (key, local_value) in local.iter() {
        let value = match remote.get(key) {
            None => local_value.clone(),
            Some(remote_value) if values_equal(local_value, remote_value) => local_value.clone(),
            Some(remote_value) => apply_strategy(Strategy::for_key(key), local_value, remote_value),
        };
        resolved.insert(key.clone(), value);
    }

    resolved
}

/// Merge two versions of a content record.
///
/// A missing side yields the other. When both carry `lastModified` the
/// later record wins whole (ties keep local); otherwise fields merge.
pub fn resolve_content_conflicts(local: Option<&Value>, remote: Option<&Value>) -> Option<Value> {
    match (local, remote) {
        (None, None) => None,
        (Some(local), None) => Some(local.clone()),
        (None, Some(remote)) => Some(remote.clone()),
        (Some(local), Some(remote)) => Some(merge_content(local, remote)),
    }
}

fn merge_content(local: &Value, remote: &Value) -> Value {
    let (Value::Object(local_obj), Value::Object(remote_obj)) = (local, remote) else {
        return local.clone();
    };

    let local_modified = local_obj.get(LAST_MODIFIED_FIELD).and_then(parse_timestamp);
    let remote_modified = remote_obj.get(LAST_MODIFIED_FIELD).and_then(parse_timestamp);
    if let (Some(l), Some(r)) = (local_modified, remote_modified) {
        return if r > l { remote.clone() } else { local.clone() };
    }

    let mut merged = remote_obj.clone();
    for (key, local_value) in local_obj {
        let value = match remote_obj.get(key) {
            None => local_value.clone(),
            Some(remote_value) => merge_field(local_value, remote_value),
        };
        merged.insert(key.clone(), value);
    }
    Value::Object(merged)
}

fn merge_field(local: &Value, remote: &Value) -> Value {
    match (local, remote) {
        (Value::Array(l), Value::Array(r)) if is_id_array(l) && is_id_array(r) => {
            Value::Array(merge_by_id(l, r))
        }
        (Value::Array(l), Value::Array(r)) if is_primitive_array(l) && is_primitive_array(r) => {
            Value::Array(union_values(l, r))
        }
        (Value::Object(_), Value::Object(_)) => merge_content(local, remote),
        _ => local.clone(),
    }
}

fn is_id_array(items: &[Value]) -> bool {
    items
        .iter()
        .all(|item| item.as_object().is_some_and(|obj| obj.contains_key("id")))
}

fn is_primitive_array(items: &[Value]) -> bool {
    items
        .iter()
        .all(|item| !matches!(item, Value::Array(_) | Value::Object(_)))
}

fn merge_by_id(local: &[Value], remote: &[Value]) -> Vec<Value> {
    let id_of = |item: &Value| item.get("id").cloned().unwrap_or(Value::Null);

    let mut merged: Vec<Value> = remote
        .iter()
        .map(|remote_item| {
            let remote_id = id_of(remote_item);
            match local
                .iter()
                .find(|local_item| values_equal(&id_of(local_item), &remote_id))
            {
                Some(local_item) => merge_content(local_item, remote_item),
                None => remote_item.clone(),
            }
        })
        .collect();

    for local_item in local {
        let local_id = id_of(local_item);
        if !remote
            .iter()
            .any(|remote_item| values_equal(&id_of(remote_item), &local_id))
        {
            merged.push(local_item.clone());
        }
    }

    merged
}

/// Local items first, then remote items not already present.
fn union_values(local: &[Value], remote: &[Value]) -> Vec<Value> {
    let mut union: Vec<Value> = Vec::with_capacity(local.len() + remote.len());
    for item in local.iter().chain(remote) {
        if !union.iter().any(|existing| values_equal(existing, item)) {
            union.push(item.clone());
        }
    }
    union
}

fn apply_strategy(strategy: Strategy, local: &Value, remote: &Value) -> Value {
    match strategy {
        Strategy::Local => local.clone(),
        Strategy::Remote => remote.clone(),
        Strategy::Max | Strategy::Min => match (local.as_f64(), remote.as_f64()) {
            (Some(l), Some(r)) => {
                let remote_wins = if strategy == Strategy::Max { r > l } else { r < l };
                if remote_wins {
                    remote.clone()
                } else {
                    local.clone()
                }
            }
            _ => local.clone(),
        },
        Strategy::BooleanOr => Value::Bool(truthy(local) || truthy(remote)),
        Strategy::BooleanAnd => Value::Bool(truthy(local) && truthy(remote)),
        Strategy::Recent => match (parse_timestamp(local), parse_timestamp(remote)) {
            (Some(l), Some(r)) if r > l => remote.clone(),
            (None, Some(_)) => remote.clone(),
            _ => local.clone(),
        },
        Strategy::Union => match (local, remote) {
            (Value::Array(l), Value::Array(r)) => Value::Array(union_values(l, r)),
            _ => local.clone(),
        },
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// ISO 8601 strings or epoch milliseconds. Strings without an offset,
/// including bare dates, are read as UTC.
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_iso8601(s),
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

fn parse_iso8601(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
