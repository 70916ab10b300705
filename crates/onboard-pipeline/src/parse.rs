//! Parsing of uploaded rule exports and standard-data baselines.
//!
//! Both arrive as JSON, either as a bare array or wrapped in an envelope
//! object whose key depends on the export kind.

use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

const UTF8_BOM: &[u8; 3] = b"\xEF\xBB\xBF";

/// Framing of an export file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    /// Guidance baseline: `[...]` or `{"data": [...]}`.
    StandardData,
    /// Legacy rule upload: `[...]` or `{"rules": [...]}`.
    UserRules,
}

impl ExportKind {
    fn envelope_key(self) -> &'static str {
        match self {
            Self::StandardData => "data",
            Self::UserRules => "rules",
        }
    }
}

impl fmt::Display for ExportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::StandardData => "standard data",
            Self::UserRules => "user rules",
        })
    }
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("{0} export is empty")]
    Empty(ExportKind),

    #[error("{kind} export has no \"{key}\" array")]
    MissingEnvelope { kind: ExportKind, key: &'static str },

    #[error("{0} export must be a JSON array or object")]
    Shape(ExportKind),

    #[error("malformed export: {0}")]
    Json(#[from] serde_json::Error),
}

/// Parse `bytes` into records of type `T`.
pub fn parse_export<T: DeserializeOwned>(bytes: &[u8], kind: ExportKind) -> Result<Vec<T>, ParseError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(ParseError::Empty(kind));
    }

    let items = match serde_json::from_slice::<Value>(bytes)? {
        array @ Value::Array(_) => array,
        Value::Object(mut map) => {
            let key = kind.envelope_key();
            map.remove(key)
                .ok_or(ParseError::MissingEnvelope { kind, key })?
        }
        _ => return Err(ParseError::Shape(kind)),
    };
    Ok(serde_json::from_value(items)?)
}
