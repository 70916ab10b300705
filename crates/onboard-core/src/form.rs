//! BRD form payloads: the fetched form, the base tree handed to the prefill
//! generator, and the ordered partial update sent back.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// Keys owned by the form service, never part of a prefill base tree.
const METADATA_KEYS: &[&str] = &["_id", "id", "brdId", "version", "createdAt", "updatedAt"];

/// Reply from the BRD form service for both fetches and updates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormResponse {
    #[serde(default)]
    pub data: Option<Value>,
}

impl FormResponse {
    pub fn with_data(data: Value) -> Self {
        Self { data: Some(data) }
    }
}

/// One operation of a partial form update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum SectionOp {
    /// Overwrite a top-level section.
    Set { section: String, value: Value },
}

/// Ordered partial update against a BRD form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormUpdate {
    pub ops: Vec<SectionOp>,
}

impl FormUpdate {
    /// One `Set` per section, in the map's key order.
    pub fn from_sections(sections: Map<String, Value>) -> Self {
        let ops = sections
            .into_iter()
            .map(|(section, value)| SectionOp::Set { section, value })
            .collect();
        Self { ops }
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Section names touched by this update, in order.
    pub fn sections(&self) -> impl Iterator<Item = &str> {
        self.ops.iter().map(|op| match op {
            SectionOp::Set { section, .. } => section.as_str(),
        })
    }
}

/// Build the prefill base tree from a fetched form's `data`.
///
/// Uses the nested `form` object when present, otherwise `data` itself, and
/// strips service metadata. Returns `None` when there is no object to start from.
pub fn base_tree(data: &Value) -> Option<Value> {
    let root = data.get("form").filter(|f| f.is_object()).unwrap_or(data);
    let map = root.as_object()?;
    let sections: Map<String, Value> = map
        .iter()
        .filter(|(key, _)| !METADATA_KEYS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    Some(Value::Object(sections))
}

/// Evaluate the form service's reply to a partial update.
///
/// An absent reply or absent `data` is a no-op success; an object `data` is an
/// acknowledged update. Any other shape cannot be processed and counts as failure.
pub fn process_brd_response(response: Option<&FormResponse>) -> bool {
    match response.and_then(|r| r.data.as_ref()) {
        None | Some(Value::Null) => true,
        Some(Value::Object(_)) => true,
        Some(other) => {
            warn!(data = %other, "unexpected form update response");
            false
        }
    }
}
