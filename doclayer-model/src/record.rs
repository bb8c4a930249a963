use crate::error::{MapperError, MapperResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key under which every record stores its identifier.
pub const ID_FIELD: &str = "_id";

/// A flat, store-native projection of a domain entity.
///
/// Records are plain JSON objects. Nested entities appear as nested objects,
/// arrays of entities as arrays of objects, and foreign ids as strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Returns the record's identifier when it is stored as a string.
    pub fn id(&self) -> Option<&str> {
        self.get_str(ID_FIELD)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Extract a string value by top-level key.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.as_str())
    }

    /// Extract a boolean value by top-level key.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(|v| v.as_bool())
    }

    /// Extract a numeric value by top-level key.
    pub fn get_number(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(|v| v.as_f64())
    }

    /// Look up a nested value using a JSON pointer (e.g., "/meta/author").
    ///
    /// Segments follow RFC 6901, so `~1` stands for `/` and `~0` for `~`.
    pub fn pointer(&self, pointer: &str) -> Option<&Value> {
        let rest = pointer.strip_prefix('/')?;
        let (head, tail) = match rest.split_once('/') {
            Some((head, tail)) => (head, Some(tail)),
            None => (rest, None),
        };
        let value = self.0.get(&head.replace("~1", "/").replace("~0", "~"))?;
        match tail {
            Some(tail) => value.pointer(&format!("/{tail}")),
            None => Some(value),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copies every key of `other` over this record, keeping keys `other` lacks.
    pub fn merge_from(&mut self, other: &Record) {
        for (key, value) in other.iter() {
            self.0.insert(key.clone(), value.clone());
        }
    }

    /// Decodes the record into any deserializable type.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> MapperResult<T> {
        serde_json::from_value(Value::Object(self.0.clone()))
            .map_err(|e| MapperError::Decode(e.to_string()))
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for Record {
    type Error = MapperError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(MapperError::NotAnObject(json_kind(&other))),
        }
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Anything that can present itself as a plain record.
///
/// Live store documents and plain JSON objects both go through this single
/// capability so the mapper never distinguishes between them.
pub trait PlainRecord {
    fn to_plain(&self) -> MapperResult<Record>;
}

impl PlainRecord for Record {
    fn to_plain(&self) -> MapperResult<Record> {
        Ok(self.clone())
    }
}

impl PlainRecord for Value {
    fn to_plain(&self) -> MapperResult<Record> {
        Record::try_from(self.clone())
    }
}

impl PlainRecord for Map<String, Value> {
    fn to_plain(&self) -> MapperResult<Record> {
        Ok(Record(self.clone()))
    }
}

impl<P: PlainRecord + ?Sized> PlainRecord for &P {
    fn to_plain(&self) -> MapperResult<Record> {
        (**self).to_plain()
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
