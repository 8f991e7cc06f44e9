//! # Flat Record Types
//!
//! Tagged leaf values and the ordered single-level record built from them.

use indexmap::IndexMap;
use serde_json::{Map, Number, Value};

/// One leaf of a flattened document
#[derive(Debug, Clone, PartialEq)]
pub enum LeafValue {
    String(String),
    Number(Number),
    Bool(bool),
    Null,

    /// Array (or any other container kept whole), stored as compact JSON text
    Composite(String),
}

impl LeafValue {
    /// Convert a JSON value into a leaf without recursing into it
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::String(s) => LeafValue::String(s.clone()),
            Value::Number(n) => LeafValue::Number(n.clone()),
            Value::Bool(b) => LeafValue::Bool(*b),
            Value::Null => LeafValue::Null,
            Value::Array(_) | Value::Object(_) => LeafValue::Composite(value.to_string()),
        }
    }

    /// Convert back into a JSON value; composites are re-parsed
    pub fn to_json(&self) -> Value {
        match self {
            LeafValue::String(s) => Value::String(s.clone()),
            LeafValue::Number(n) => Value::Number(n.clone()),
            LeafValue::Bool(b) => Value::Bool(*b),
            LeafValue::Null => Value::Null,
            LeafValue::Composite(text) => {
                serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.clone()))
            }
        }
    }

    /// Append this value as one CSV field
    ///
    /// Strings and composites are quoted with embedded quotes doubled,
    /// numbers and booleans are bare literals, null is an empty field.
    pub fn write_csv_field(&self, out: &mut String) {
        match self {
            LeafValue::String(s) | LeafValue::Composite(s) => write_quoted(s, out),
            LeafValue::Number(n) => out.push_str(&n.to_string()),
            LeafValue::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            LeafValue::Null => {}
        }
    }
}

/// Append `text` as a double-quoted CSV field
pub fn write_quoted(text: &str, out: &mut String) {
    out.push('"');
    for c in text.chars() {
        if c == '"' {
            out.push('"');
        }
        out.push(c);
    }
    out.push('"');
}

impl From<&str> for LeafValue {
    fn from(value: &str) -> Self {
        LeafValue::String(value.to_string())
    }
}

impl From<String> for LeafValue {
    fn from(value: String) -> Self {
        LeafValue::String(value)
    }
}

impl From<bool> for LeafValue {
    fn from(value: bool) -> Self {
        LeafValue::Bool(value)
    }
}

impl From<i64> for LeafValue {
    fn from(value: i64) -> Self {
        LeafValue::Number(value.into())
    }
}

impl From<i32> for LeafValue {
    fn from(value: i32) -> Self {
        LeafValue::Number(value.into())
    }
}

impl From<f64> for LeafValue {
    /// Non-finite values have no JSON number form and become `Null`
    fn from(value: f64) -> Self {
        Number::from_f64(value).map_or(LeafValue::Null, LeafValue::Number)
    }
}

impl From<f32> for LeafValue {
    /// Widened through the shortest decimal form so `0.1f32` logs as `0.1`
    fn from(value: f32) -> Self {
        value
            .to_string()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map_or(LeafValue::Null, LeafValue::Number)
    }
}

/// Single-level mapping of dot-joined key paths to leaf values
///
/// Keys keep insertion order. Inserting an existing key replaces its value
/// in place (last write wins, first position kept).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatRecord {
    fields: IndexMap<String, LeafValue>,
}

impl FlatRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `key` to `value`, returning the value it replaced
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<LeafValue>) -> Option<LeafValue> {
        self.fields.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&LeafValue> {
        self.fields.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &LeafValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Re-nest the record by splitting keys on `.`
    ///
    /// Inverse of flattening for documents whose keys contain no dots.
    pub fn unflatten(&self) -> Value {
        let mut root = Map::new();

        for (path, leaf) in &self.fields {
            let mut segments: Vec<&str> = path.split('.').collect();
            let last = segments.pop().unwrap_or_default();

            let mut node = &mut root;
            for segment in segments {
                let entry = node
                    .entry(segment.to_string())
                    .or_insert_with(|| Value::Object(Map::new()));
                if !entry.is_object() {
                    *entry = Value::Object(Map::new());
                }
                node = match entry {
                    Value::Object(map) => map,
                    _ => unreachable!("entry was just made an object"),
                };
            }

            node.insert(last.to_string(), leaf.to_json());
        }

        Value::Object(root)
    }
}

impl<K: Into<String>, V: Into<LeafValue>> Extend<(K, V)> for FlatRecord {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<K: Into<String>, V: Into<LeafValue>> FromIterator<(K, V)> for FlatRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = FlatRecord::new();
        record.extend(iter);
        record
    }
}

impl IntoIterator for FlatRecord {
    type Item = (String, LeafValue);
    type IntoIter = indexmap::map::IntoIter<String, LeafValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}
