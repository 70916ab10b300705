//! JSON section cleaning for generated BRD form trees.
//!
//! Generated trees are full of placeholder branches: empty objects, empty
//! lists, `null`s and blank strings. [`clean`] prunes them bottom-up so only
//! populated fields reach an update payload or a site snapshot.
//!
//! # Rules
//!
//! - `null` and blank strings (empty after trimming) are dropped
//! - numbers and booleans are kept
//! - objects keep their surviving children in original key order, and are
//!   dropped when none survive
//! - lists keep their surviving elements in order, and are dropped when none
//!   survive
//!
//! The root is never dropped: an object or list root cleans to an empty
//! container, a blank scalar root cleans to `null`.

use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("generated JSON is not valid: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected a JSON object of form sections, got {0}")]
    NotAnObject(&'static str),
}

/// Prune empty branches from `tree`. Idempotent: `clean(&clean(x)) == clean(x)`.
pub fn clean(tree: &Value) -> Value {
    match tree {
        Value::Object(map) => Value::Object(clean_object(map)),
        Value::Array(items) => Value::Array(clean_array(items)),
        other => prune(other).unwrap_or(Value::Null),
    }
}

/// Clean the sections of an object tree.
pub fn clean_object(map: &Map<String, Value>) -> Map<String, Value> {
    map.iter()
        .filter_map(|(key, value)| prune(value).map(|v| (key.clone(), v)))
        .collect()
}

fn clean_array(items: &[Value]) -> Vec<Value> {
    items.iter().filter_map(prune).collect()
}

/// `None` when the branch carries nothing worth keeping.
fn prune(value: &Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(_) | Value::Bool(_) | Value::Number(_) => Some(value.clone()),
        Value::Object(map) => {
            let kept = clean_object(map);
            (!kept.is_empty()).then_some(Value::Object(kept))
        }
        Value::Array(items) => {
            let kept = clean_array(items);
            (!kept.is_empty()).then_some(Value::Array(kept))
        }
    }
}

/// Convert a generated reply into form sections.
///
/// Generators answer either with a JSON object or with a string holding one
/// (model output passed through verbatim). Anything else is a processing error.
pub fn convert_json_to_map(reply: Value) -> Result<Map<String, Value>, MergeError> {
    match reply {
        Value::Object(map) => Ok(map),
        Value::String(text) => match serde_json::from_str::<Value>(strip_fences(&text))? {
            Value::Object(map) => Ok(map),
            other => Err(MergeError::NotAnObject(kind(&other))),
        },
        other => Err(MergeError::NotAnObject(kind(&other))),
    }
}

/// Drop a surrounding markdown code fence, if any.
fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(body) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = body.strip_prefix("json").unwrap_or(body);
    body.strip_suffix("```").unwrap_or(body).trim()
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
