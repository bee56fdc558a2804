//! Document model shared by every store backend.
//!
//! A document is a map of typed [`Value`]s addressed by a [`DocumentPath`]
//! (`collection/id`, where the collection itself may be nested, e.g.
//! `chat_batches/b1/messages`).
//!
//! On the JSON wire, values are plain JSON except timestamps, which are encoded
//! as `{"$timestamp": "<RFC 3339>"}`.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::json;

use crate::error::{CoreError, Result};
use crate::time::Timestamp;

const TIMESTAMP_KEY: &str = "$timestamp";

/// Field map of a document.
pub type Fields = BTreeMap<String, Value>;

/// A typed document field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Timestamp(Timestamp),
    Array(Vec<Value>),
    Map(Fields),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<Timestamp> {
        match self {
            Value::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Double(_))
    }

    /// Orders two values of the same kind. Integers and doubles compare
    /// numerically; any other mix of kinds is unordered.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (Value::Integer(a), Value::Double(b)) => (*a as f64).partial_cmp(b),
            (Value::Double(a), Value::Integer(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Double(a), Value::Double(b)) => a.partial_cmp(b),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Converts wire JSON into a document value.
    pub fn from_json(value: serde_json::Value) -> Result<Value> {
        Ok(match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Double(n.as_f64().ok_or_else(|| {
                    CoreError::invalid_document(format!("number out of range: {n}"))
                })?),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .map(Value::from_json)
                    .collect::<Result<Vec<_>>>()?,
            ),
            serde_json::Value::Object(map) => {
                if map.len() == 1
                    && let Some(serde_json::Value::String(raw)) = map.get(TIMESTAMP_KEY)
                {
                    return Ok(Value::Timestamp(Timestamp::from_str(raw)?));
                }
                Value::Map(fields_from_json_map(map)?)
            }
        })
    }

    /// Converts the value to its wire JSON form.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => json!(b),
            Value::Integer(n) => json!(n),
            Value::Double(d) => json!(d),
            Value::String(s) => json!(s),
            Value::Timestamp(ts) => {
                let mut map = serde_json::Map::with_capacity(1);
                map.insert(TIMESTAMP_KEY.to_string(), json!(ts.to_string()));
                serde_json::Value::Object(map)
            }
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(fields) => fields_to_json(fields),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<Timestamp> for Value {
    fn from(value: Timestamp) -> Self {
        Value::Timestamp(value)
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = serde_json::Value::deserialize(deserializer)?;
        Value::from_json(raw).map_err(serde::de::Error::custom)
    }
}

/// Converts a JSON object into document fields.
pub fn fields_from_json(value: serde_json::Value) -> Result<Fields> {
    match value {
        serde_json::Value::Object(map) => fields_from_json_map(map),
        other => Err(CoreError::invalid_document(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

/// Converts document fields into a JSON object.
pub fn fields_to_json(fields: &Fields) -> serde_json::Value {
    serde_json::Value::Object(
        fields
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect(),
    )
}

/// Contract fields stored as timestamps even when written as RFC 3339 strings.
const TIMESTAMP_FIELDS: [&str; 3] = [
    crate::model::fields::CREATED_AT,
    crate::model::fields::START_TIMESTAMP,
    crate::model::fields::PROCESSED_AT,
];

fn fields_from_json_map(map: serde_json::Map<String, serde_json::Value>) -> Result<Fields> {
    map.into_iter()
        .map(|(k, v)| {
            let value = match Value::from_json(v)? {
                Value::String(raw) if TIMESTAMP_FIELDS.contains(&k.as_str()) => {
                    match Timestamp::from_str(&raw) {
                        Ok(ts) => Value::Timestamp(ts),
                        Err(_) => Value::String(raw),
                    }
                }
                other => other,
            };
            Ok((k, value))
        })
        .collect()
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Address of a single document: `collection/id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentPath {
    collection: String,
    id: String,
}

impl DocumentPath {
    /// Builds a path, rejecting empty segments and ids containing `/`.
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Result<Self> {
        let collection = collection.into();
        let id = id.into();
        if collection.is_empty() || collection.split('/').any(str::is_empty) {
            return Err(CoreError::invalid_path(format!("{collection}/{id}")));
        }
        if id.is_empty() || id.contains('/') {
            return Err(CoreError::invalid_path(format!("{collection}/{id}")));
        }
        Ok(Self { collection, id })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Path of a nested collection owned by this document.
    pub fn child_collection(&self, name: &str) -> String {
        format!("{}/{}/{}", self.collection, self.id, name)
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

impl FromStr for DocumentPath {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let (collection, id) = s
            .rsplit_once('/')
            .ok_or_else(|| CoreError::invalid_path(s))?;
        DocumentPath::new(collection, id)
    }
}

impl Serialize for DocumentPath {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DocumentPath {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        DocumentPath::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// A stored document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub path: DocumentPath,
    pub fields: Fields,
    pub create_time: Timestamp,
    pub update_time: Timestamp,
}

impl Document {
    pub fn id(&self) -> &str {
        self.path.id()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        get_str(&self.fields, field)
    }

    pub fn get_i64(&self, field: &str) -> Option<i64> {
        self.fields.get(field).and_then(Value::as_i64)
    }

    pub fn get_timestamp(&self, field: &str) -> Option<Timestamp> {
        get_timestamp(&self.fields, field)
    }
}

/// Non-empty string field lookup. Empty strings read as absent.
pub fn get_str<'a>(fields: &'a Fields, field: &str) -> Option<&'a str> {
    fields
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

/// Timestamp field lookup. RFC 3339 strings are accepted as well, since
/// external writers do not always use the typed encoding.
pub fn get_timestamp(fields: &Fields, field: &str) -> Option<Timestamp> {
    match fields.get(field)? {
        Value::Timestamp(ts) => Some(*ts),
        Value::String(raw) => Timestamp::from_str(raw).ok(),
        _ => None,
    }
}
