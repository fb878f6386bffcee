//! Canonical forms and structural equality.
//!
//! Canonical text is deterministic: keys sorted, fixed indentation. It is what
//! the reporter diffs and what the fixture writer persists.

use serde::Deserialize;
use serde_json::{Map, Number, Value};

/// Pretty JSON, two-space indentation, keys in sorted order.
pub fn canonical_json(value: &Value) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(value)
}

/// Block-style YAML, keys in sorted order.
pub fn canonical_yaml(value: &Value) -> Result<String, serde_yaml::Error> {
    serde_yaml::to_string(value)
}

/// Trims surrounding whitespace and ends the text with exactly one newline.
pub fn normalize_plain_text(text: &str) -> String {
    let mut normalized = text.trim().to_string();
    normalized.push('\n');
    normalized
}

/// Decodes a stream of JSON documents, keeping the last one.
/// An empty stream decodes to `null`.
pub fn decode_json(text: &str) -> Result<Value, serde_json::Error> {
    let mut last = Value::Null;
    for value in serde_json::Deserializer::from_str(text).into_iter::<Value>() {
        last = value?;
    }
    Ok(last)
}

/// Decodes the first document of a YAML stream into the JSON data model.
/// Later documents are ignored; an empty stream decodes to `null`.
pub fn decode_yaml(text: &str) -> Result<Value, serde_yaml::Error> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    match serde_yaml::Deserializer::from_str(text).next() {
        Some(document) => serde_yaml::Value::deserialize(document).map(yaml_to_json),
        None => Ok(Value::Null),
    }
}

/// Converts a YAML value, stringifying non-string mapping keys.
pub fn yaml_to_json(value: serde_yaml::Value) -> Value {
    match value {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Bool(b),
        serde_yaml::Value::Number(n) => yaml_number(&n),
        serde_yaml::Value::String(s) => Value::String(s),
        serde_yaml::Value::Sequence(items) => {
            Value::Array(items.into_iter().map(yaml_to_json).collect())
        }
        serde_yaml::Value::Mapping(mapping) => {
            let mut out = Map::new();
            for (key, value) in mapping {
                out.insert(yaml_key(key), yaml_to_json(value));
            }
            Value::Object(out)
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_json(tagged.value),
    }
}

fn yaml_number(n: &serde_yaml::Number) -> Value {
    if let Some(i) = n.as_u64() {
        Value::Number(i.into())
    } else if let Some(i) = n.as_i64() {
        Value::Number(i.into())
    } else {
        n.as_f64()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

fn yaml_key(key: serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s,
        serde_yaml::Value::Null => "null".to_string(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        other => yaml_to_json(other).to_string(),
    }
}

/// Deep structural equality where integers and floats compare by value.
pub fn structurally_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => {
            if a.is_f64() || b.is_f64() {
                a.as_f64() == b.as_f64()
            } else {
                a == b
            }
        }
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| structurally_equal(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a
                    .iter()
                    .all(|(key, x)| b.get(key).is_some_and(|y| structurally_equal(x, y)))
        }
        (a, b) => a == b,
    }
}
