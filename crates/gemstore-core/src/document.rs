//! Schema-flexible documents as held by the document store.
//!
//! A [`Document`] is a store-assigned ID plus a JSON object of fields.
//! Writes are described by a [`DocumentWrite`], which carries the literal
//! fields to set and the names of fields the store must stamp with its own
//! clock (the server-timestamp sentinel).

use std::cmp::Ordering;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

use crate::error::{Error, Result};

/// Field map of a single document.
pub type Fields = serde_json::Map<String, Value>;

/// A stored document: its ID and its fields.
#[derive(Debug, Clone, PartialEq)]
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

    /// Looks up a (possibly dotted) field path, e.g. `dimensions.length`.
    pub fn get(&self, path: &str) -> Option<&Value> {
        lookup(&self.fields, path)
    }

    /// Returns a top-level string field, treating empty strings as absent.
    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.fields
            .get(field)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }
}

/// Serializes as `{ "id": ..., ...fields }`. The store ID wins over any
/// `id` key stored in the fields.
impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let extra = self.fields.len() - usize::from(self.fields.contains_key("id"));
        let mut map = serializer.serialize_map(Some(extra + 1))?;
        map.serialize_entry("id", &self.id)?;
        for (key, value) in &self.fields {
            if key != "id" {
                map.serialize_entry(key, value)?;
            }
        }
        map.end()
    }
}

/// A pending write: literal fields plus fields to stamp server-side.
#[derive(Debug, Clone, Default)]
pub struct DocumentWrite {
    pub fields: Fields,
    pub server_timestamps: Vec<String>,
}

impl DocumentWrite {
    pub fn new(fields: Fields) -> Self {
        Self {
            fields,
            server_timestamps: Vec::new(),
        }
    }

    pub fn set(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(field.to_string(), value.into());
        self
    }

    /// Marks `field` to receive the store's current timestamp.
    pub fn stamp(mut self, field: &str) -> Self {
        self.server_timestamps.push(field.to_string());
        self
    }

    /// Produces the concrete field map, resolving stamps against `now`.
    pub fn resolve(self, now: &str) -> Fields {
        let mut fields = self.fields;
        for field in self.server_timestamps {
            fields.insert(field, Value::String(now.to_string()));
        }
        fields
    }
}

/// Strictly increasing server clock.
///
/// Timestamps are RFC 3339 UTC strings with microsecond precision, so their
/// lexicographic order matches their chronological order. Two calls never
/// return the same value, which keeps newest-first ordering total.
#[derive(Debug)]
pub struct ServerClock {
    last: Mutex<Option<DateTime<Utc>>>,
}

impl ServerClock {
    pub fn new() -> Self {
        Self {
            last: Mutex::new(None),
        }
    }

    pub fn now(&self) -> String {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        let wall = Utc::now();
        let mut now = DateTime::from_timestamp_micros(wall.timestamp_micros()).unwrap_or(wall);
        if let Some(prev) = *last {
            if now <= prev {
                now = prev + Duration::microseconds(1);
            }
        }
        *last = Some(now);
        now.to_rfc3339_opts(SecondsFormat::Micros, true)
    }
}

impl Default for ServerClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves a dotted field path inside a field map.
pub fn lookup<'a>(fields: &'a Fields, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = fields.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Rejects field paths the stores cannot address.
///
/// A path is one or more `.`-separated segments of ASCII letters, digits,
/// and underscores.
pub fn validate_field_path(path: &str) -> Result<()> {
    let valid = !path.is_empty()
        && path.split('.').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_')
        });
    if valid {
        Ok(())
    } else {
        Err(Error::Query(format!("invalid field path: {:?}", path)))
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Returns true when both values are of the same kind and thus comparable
/// by range filters.
pub fn same_kind(a: &Value, b: &Value) -> bool {
    type_rank(a) == type_rank(b)
}

/// Total order over JSON values: null < bool < number < string < array < object.
///
/// Numbers compare numerically (`500` equals `500.0`), strings by byte order.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (l, r) in x.iter().zip(y.iter()) {
                let ord = compare_values(l, r);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Object(x), Value::Object(y)) => x.len().cmp(&y.len()),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}
