//! Entity <-> document conversion
//!
//! Entities are serialized to JSON first, then mapped onto [`DocValue`]s:
//! - fields the entity leaves unset are absent from the document, while an
//!   explicit JSON `null` is stored as [`DocValue::Null`]
//! - nested maps that end up empty are dropped
//! - the collection's declared timestamp fields become native timestamps
//!
//! Decoding reverses the mapping, rendering timestamps as RFC 3339 with
//! nanosecond precision so they parse back to the identical instant.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::document::{DocValue, Fields};
use crate::error::{Result, StoreError};
use crate::schema::CollectionSchema;

/// Maximum depth of nested maps/arrays the store accepts inside a document
pub const MAX_NESTING_DEPTH: usize = 20;

/// Encode an entity into the fields of a document in `schema`'s collection
pub fn encode<T: Serialize>(entity: &T, schema: &CollectionSchema) -> Result<Fields> {
    match serde_json::to_value(entity)? {
        Value::Object(object) => encode_object(object, schema),
        other => Err(StoreError::invalid_document(format!(
            "{} documents must be objects, got {}",
            schema.name, other
        ))),
    }
}

/// Encode a JSON object as top-level document fields
pub fn encode_object(object: Map<String, Value>, schema: &CollectionSchema) -> Result<Fields> {
    let mut fields = Fields::new();
    for (key, value) in object {
        let encoded = if schema.is_timestamp(&key) {
            Some(encode_timestamp(&key, value)?)
        } else {
            encode_value(value)
        };
        if let Some(encoded) = encoded {
            fields.insert(key, encoded);
        }
    }
    Ok(fields)
}

fn encode_timestamp(key: &str, value: Value) -> Result<DocValue> {
    match value {
        Value::String(text) => DateTime::parse_from_rfc3339(&text)
            .map(|dt| DocValue::Timestamp(dt.with_timezone(&Utc)))
            .map_err(|e| {
                StoreError::invalid_document(format!("field '{}' is not a timestamp: {}", key, e))
            }),
        Value::Null => Ok(DocValue::Null),
        other => Err(StoreError::invalid_document(format!(
            "field '{}' is not a timestamp: {}",
            key, other
        ))),
    }
}

/// Encode a nested JSON value. Returns `None` for maps that are empty after encoding.
pub fn encode_value(value: Value) -> Option<DocValue> {
    match value {
        Value::Null => Some(DocValue::Null),
        Value::Bool(b) => Some(DocValue::Boolean(b)),
        Value::Number(n) => Some(encode_number(&n)),
        Value::String(s) => Some(DocValue::String(s)),
        Value::Array(items) => Some(DocValue::Array(
            items
                .into_iter()
                .map(|item| match item {
                    // maps inside arrays are kept even when empty
                    Value::Object(object) => DocValue::Map(encode_map(object)),
                    other => encode_value(other).unwrap_or(DocValue::Null),
                })
                .collect(),
        )),
        Value::Object(object) => {
            let fields = encode_map(object);
            if fields.is_empty() {
                None
            } else {
                Some(DocValue::Map(fields))
            }
        }
    }
}

fn encode_map(object: Map<String, Value>) -> Fields {
    object
        .into_iter()
        .filter_map(|(key, value)| encode_value(value).map(|encoded| (key, encoded)))
        .collect()
}

fn encode_number(n: &Number) -> DocValue {
    if let Some(i) = n.as_i64() {
        DocValue::Integer(i)
    } else {
        DocValue::Double(n.as_f64().unwrap_or(0.0))
    }
}

/// Decode document fields back into an entity
pub fn decode<T: DeserializeOwned>(fields: &Fields) -> Result<T> {
    let object: Map<String, Value> = fields
        .iter()
        .map(|(key, value)| (key.clone(), to_json(value)))
        .collect();
    serde_json::from_value(Value::Object(object))
        .map_err(|e| StoreError::invalid_document(e.to_string()))
}

/// Render a document value as plain JSON
pub fn to_json(value: &DocValue) -> Value {
    match value {
        DocValue::Null => Value::Null,
        DocValue::Boolean(b) => Value::Bool(*b),
        DocValue::Integer(i) => Value::Number((*i).into()),
        DocValue::Double(d) => Number::from_f64(*d).map(Value::Number).unwrap_or(Value::Null),
        DocValue::Timestamp(ts) => Value::String(ts.to_rfc3339_opts(SecondsFormat::Nanos, true)),
        DocValue::String(s) => Value::String(s.clone()),
        DocValue::Array(values) => Value::Array(values.iter().map(to_json).collect()),
        DocValue::Map(fields) => Value::Object(
            fields
                .iter()
                .map(|(key, value)| (key.clone(), to_json(value)))
                .collect(),
        ),
    }
}

/// Whether a property key can be stored as a document field name
fn is_storable_key(key: &str) -> bool {
    !key.is_empty() && !key.starts_with("__") && !key.contains('.') && !key.contains('/')
}

/// Clean an event property bag before it is written.
///
/// Keys the store cannot hold are dropped and anything nested deeper than
/// `max_depth` is replaced by its JSON text.
pub fn sanitize_properties(properties: Map<String, Value>, max_depth: usize) -> Map<String, Value> {
    sanitize_map(properties, 1, max_depth)
}

fn sanitize_map(map: Map<String, Value>, depth: usize, max_depth: usize) -> Map<String, Value> {
    map.into_iter()
        .filter(|(key, _)| is_storable_key(key))
        .map(|(key, value)| (key, sanitize_value(value, depth, max_depth)))
        .collect()
}

fn sanitize_value(value: Value, depth: usize, max_depth: usize) -> Value {
    match value {
        Value::Object(_) | Value::Array(_) if depth >= max_depth => Value::String(value.to_string()),
        Value::Object(map) => Value::Object(sanitize_map(map, depth + 1, max_depth)),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| sanitize_value(item, depth + 1, max_depth))
                .collect(),
        ),
        other => other,
    }
}
