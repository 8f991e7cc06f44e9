//! # Structured-Record Flattener
//!
//! Turns a nested JSON document into a [`FlatRecord`]. Objects are walked
//! recursively with their keys joined by `.`; everything else, arrays
//! included, becomes a single leaf.

use serde_json::{Map, Value};

use super::value::{FlatRecord, LeafValue};
use crate::error::{IngestError, Result};

/// Separator between key path segments
pub const KEY_SEPARATOR: char = '.';

/// Key used when the document itself is not an object
pub const ROOT_KEY: &str = "value";

/// Parse one datagram payload as a JSON document
///
/// # Errors
///
/// Returns `MalformedDocument` if the bytes are not UTF-8 or not valid JSON
pub fn parse_document(bytes: &[u8]) -> Result<Value> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| IngestError::MalformedDocument(format!("invalid UTF-8: {}", e)))?;

    serde_json::from_str(text)
        .map_err(|e| IngestError::MalformedDocument(format!("invalid JSON: {}", e)))
}

/// Flatten a document into dot-joined key paths
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use telemetry_ingest::record::flatten::flatten;
///
/// let record = flatten(&json!({"a": {"b": 1}, "c": [1, 2]}));
/// assert_eq!(record.keys().collect::<Vec<_>>(), vec!["a.b", "c"]);
/// ```
pub fn flatten(document: &Value) -> FlatRecord {
    let mut record = FlatRecord::new();

    match document {
        Value::Object(object) => flatten_into(&mut record, None, object),
        other => {
            record.insert(ROOT_KEY, LeafValue::from_json(other));
        }
    }

    record
}

fn flatten_into(record: &mut FlatRecord, prefix: Option<&str>, object: &Map<String, Value>) {
    for (key, value) in object {
        let path = match prefix {
            Some(parent) => format!("{}{}{}", parent, KEY_SEPARATOR, key),
            None => key.clone(),
        };

        match value {
            Value::Object(child) => flatten_into(record, Some(&path), child),
            leaf => {
                record.insert(path, LeafValue::from_json(leaf));
            }
        }
    }
}
