//! Document value model
//!
//! Values mirror the wire types of a hosted document database and serialize in
//! its REST shape: every value is a single-key object naming its type, e.g.
//! `{"stringValue": "/blog"}` or `{"mapValue": {"fields": {...}}}`.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use chrono::SecondsFormat;
use folio_core::UtcDateTime;
use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Top-level (or nested map) fields of a document
pub type Fields = BTreeMap<String, DocValue>;

#[derive(Debug, Clone, PartialEq)]
pub enum DocValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    Timestamp(UtcDateTime),
    String(String),
    Array(Vec<DocValue>),
    Map(Fields),
}

/// Wire type names, used in logs and error messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Null,
    Boolean,
    Integer,
    Double,
    Timestamp,
    String,
    Array,
    Map,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Null => write!(f, "null"),
            ValueType::Boolean => write!(f, "boolean"),
            ValueType::Integer => write!(f, "integer"),
            ValueType::Double => write!(f, "double"),
            ValueType::Timestamp => write!(f, "timestamp"),
            ValueType::String => write!(f, "string"),
            ValueType::Array => write!(f, "array"),
            ValueType::Map => write!(f, "map"),
        }
    }
}

impl DocValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            DocValue::Null => ValueType::Null,
            DocValue::Boolean(_) => ValueType::Boolean,
            DocValue::Integer(_) => ValueType::Integer,
            DocValue::Double(_) => ValueType::Double,
            DocValue::Timestamp(_) => ValueType::Timestamp,
            DocValue::String(_) => ValueType::String,
            DocValue::Array(_) => ValueType::Array,
            DocValue::Map(_) => ValueType::Map,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            DocValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            DocValue::Integer(i) => Some(*i),
            DocValue::Double(d) if d.fract() == 0.0 => Some(*d as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DocValue::Integer(i) => Some(*i as f64),
            DocValue::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<UtcDateTime> {
        match self {
            DocValue::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    /// Ordering between two values of comparable types.
    ///
    /// Integers and doubles compare numerically with each other; any other
    /// mix of types is unordered.
    pub fn compare(&self, other: &DocValue) -> Option<Ordering> {
        match (self, other) {
            (DocValue::Null, DocValue::Null) => Some(Ordering::Equal),
            (DocValue::Boolean(a), DocValue::Boolean(b)) => Some(a.cmp(b)),
            (DocValue::Integer(a), DocValue::Integer(b)) => Some(a.cmp(b)),
            (DocValue::Timestamp(a), DocValue::Timestamp(b)) => Some(a.cmp(b)),
            (DocValue::String(a), DocValue::String(b)) => Some(a.cmp(b)),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x.partial_cmp(&y),
                _ => None,
            },
        }
    }
}

impl From<&str> for DocValue {
    fn from(value: &str) -> Self {
        DocValue::String(value.to_string())
    }
}

impl From<String> for DocValue {
    fn from(value: String) -> Self {
        DocValue::String(value)
    }
}

impl From<i64> for DocValue {
    fn from(value: i64) -> Self {
        DocValue::Integer(value)
    }
}

impl From<bool> for DocValue {
    fn from(value: bool) -> Self {
        DocValue::Boolean(value)
    }
}

impl From<UtcDateTime> for DocValue {
    fn from(value: UtcDateTime) -> Self {
        DocValue::Timestamp(value)
    }
}

/// Look up a (possibly dotted) field path, e.g. `device.type`
pub fn field_at<'a>(fields: &'a Fields, path: &str) -> Option<&'a DocValue> {
    let mut segments = path.split('.');
    let mut current = fields.get(segments.next()?)?;
    for segment in segments {
        match current {
            DocValue::Map(inner) => current = inner.get(segment)?,
            _ => return None,
        }
    }
    Some(current)
}

/// A stored document: its id within a collection and its fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    pub fn get(&self, path: &str) -> Option<&DocValue> {
        field_at(&self.fields, path)
    }
}

#[derive(Serialize)]
struct ArrayRef<'a> {
    values: &'a [DocValue],
}

#[derive(Serialize)]
struct MapRef<'a> {
    fields: &'a Fields,
}

impl Serialize for DocValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(1))?;
        match self {
            DocValue::Null => map.serialize_entry("nullValue", &())?,
            DocValue::Boolean(b) => map.serialize_entry("booleanValue", b)?,
            // 64-bit integers travel as strings on the wire
            DocValue::Integer(i) => map.serialize_entry("integerValue", &i.to_string())?,
            DocValue::Double(d) => map.serialize_entry("doubleValue", d)?,
            DocValue::Timestamp(ts) => map.serialize_entry(
                "timestampValue",
                &ts.to_rfc3339_opts(SecondsFormat::Nanos, true),
            )?,
            DocValue::String(s) => map.serialize_entry("stringValue", s)?,
            DocValue::Array(values) => map.serialize_entry("arrayValue", &ArrayRef { values })?,
            DocValue::Map(fields) => map.serialize_entry("mapValue", &MapRef { fields })?,
        }
        map.end()
    }
}

#[derive(Deserialize)]
struct WireArray {
    #[serde(default)]
    values: Vec<DocValue>,
}

#[derive(Deserialize)]
struct WireMap {
    #[serde(default)]
    fields: Fields,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireInteger {
    Text(String),
    Number(i64),
}

#[derive(Deserialize)]
enum Wire {
    #[serde(rename = "nullValue")]
    Null(()),
    #[serde(rename = "booleanValue")]
    Boolean(bool),
    #[serde(rename = "integerValue")]
    Integer(WireInteger),
    #[serde(rename = "doubleValue")]
    Double(f64),
    #[serde(rename = "timestampValue")]
    Timestamp(UtcDateTime),
    #[serde(rename = "stringValue")]
    String(String),
    #[serde(rename = "arrayValue")]
    Array(WireArray),
    #[serde(rename = "mapValue")]
    Map(WireMap),
}

impl<'de> Deserialize<'de> for DocValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = match Wire::deserialize(deserializer)? {
            Wire::Null(()) => DocValue::Null,
            Wire::Boolean(b) => DocValue::Boolean(b),
            Wire::Integer(WireInteger::Number(i)) => DocValue::Integer(i),
            Wire::Integer(WireInteger::Text(s)) => DocValue::Integer(
                s.parse()
                    .map_err(|_| D::Error::custom(format!("invalid integerValue '{}'", s)))?,
            ),
            Wire::Double(d) => DocValue::Double(d),
            Wire::Timestamp(ts) => DocValue::Timestamp(ts),
            Wire::String(s) => DocValue::String(s),
            Wire::Array(array) => DocValue::Array(array.values),
            Wire::Map(map) => DocValue::Map(map.fields),
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono::Utc;

    #[test]
    fn test_wire_shape() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 9, 8, 30, 0).unwrap();
        let mut fields = Fields::new();
        fields.insert("views".to_string(), DocValue::Integer(42));
        fields.insert("startedAt".to_string(), DocValue::Timestamp(ts));
        fields.insert("label".to_string(), DocValue::Null);

        let json = serde_json::to_value(DocValue::Map(fields)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "mapValue": {
                    "fields": {
                        "label": { "nullValue": null },
                        "startedAt": { "timestampValue": "2024-03-09T08:30:00.000000000Z" },
                        "views": { "integerValue": "42" }
                    }
                }
            })
        );
    }

    #[test]
    fn test_wire_round_trip_preserves_nanoseconds() {
        let ts = Utc.timestamp_nanos(1_717_000_000_123_456_789);
        let value = DocValue::Array(vec![
            DocValue::Timestamp(ts),
            DocValue::Double(0.25),
            DocValue::Boolean(true),
            DocValue::String("x".to_string()),
        ]);
        let text = serde_json::to_string(&value).unwrap();
        let back: DocValue = serde_json::from_str(&text).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_integer_accepts_number_or_text() {
        let a: DocValue = serde_json::from_str(r#"{"integerValue": "7"}"#).unwrap();
        let b: DocValue = serde_json::from_str(r#"{"integerValue": 7}"#).unwrap();
        assert_eq!(a, DocValue::Integer(7));
        assert_eq!(a, b);
        assert!(serde_json::from_str::<DocValue>(r#"{"integerValue": "seven"}"#).is_err());
    }

    #[test]
    fn test_compare_mixed_numbers() {
        assert_eq!(
            DocValue::Integer(2).compare(&DocValue::Double(1.5)),
            Some(Ordering::Greater)
        );
        assert_eq!(DocValue::Integer(2).compare(&DocValue::from("2")), None);
    }

    #[test]
    fn test_field_at_dotted_path() {
        let mut device = Fields::new();
        device.insert("type".to_string(), DocValue::from("mobile"));
        let mut fields = Fields::new();
        fields.insert("device".to_string(), DocValue::Map(device));

        assert_eq!(field_at(&fields, "device.type"), Some(&DocValue::from("mobile")));
        assert_eq!(field_at(&fields, "device.os"), None);
        assert_eq!(field_at(&fields, "device.type.inner"), None);
    }
}
