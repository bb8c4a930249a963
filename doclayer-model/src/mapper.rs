//! Bidirectional conversion between domain entities and persistence records.
//!
//! `to_persistence` walks an entity through the [`Persistable`] visitor:
//! undefined fields are skipped, the identifier is written as a string under
//! [`ID_FIELD`], nested entities and arrays of entities are mapped
//! recursively, and foreign id arrays are stored as string arrays. Every other
//! value is copied unchanged.
//!
//! `to_domain` normalizes anything exposing [`PlainRecord`], coerces the
//! identifier to a string and hands the plain data to the entity constructor.

use crate::entity::{DomainEntity, Field, Persistable};
use crate::error::{MapperError, MapperResult};
use crate::record::{ID_FIELD, PlainRecord, Record, json_kind};
use serde_json::Value;

/// Maps a domain entity to its flat persistence record.
pub fn to_persistence(entity: &dyn Persistable) -> Record {
    map_one(entity)
}

/// Maps a list of entities to an array of records.
pub fn to_persistence_many(entities: &[&dyn Persistable]) -> Vec<Record> {
    entities.iter().map(|e| map_one(*e)).collect()
}

/// Rebuilds a domain entity from a plain record or live store document.
pub fn to_domain<T: DomainEntity>(record: &dyn PlainRecord) -> MapperResult<T> {
    let plain = normalize(record)?;
    T::from_record(plain)
}

/// Produces the plain, id-normalized view of a record.
pub fn normalize(record: &dyn PlainRecord) -> MapperResult<Record> {
    let mut plain = record.to_plain()?;
    if let Some(raw) = plain.remove(ID_FIELD) {
        let id = coerce_id(&raw)?;
        plain.insert(ID_FIELD, Value::String(id));
    }
    Ok(plain)
}

/// Coerces a store identifier to its string form.
///
/// Accepts strings, integers and `{"$oid": "..."}` objects.
pub fn coerce_id(raw: &Value) -> MapperResult<String> {
    match raw {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Object(map) => match map.get("$oid") {
            Some(Value::String(s)) => Ok(s.clone()),
            _ => Err(MapperError::InvalidId(raw.to_string())),
        },
        other => Err(MapperError::InvalidId(format!("{} {other}", json_kind(other)))),
    }
}

fn map_one(entity: &dyn Persistable) -> Record {
    let mut record = Record::new();
    if let Some(id) = entity.persistent_id() {
        record.insert(ID_FIELD, Value::String(id));
    }
    for (key, field) in entity.fields() {
        if let Some(value) = map_field(field) {
            record.insert(key, value);
        }
    }
    record
}

fn map_many(entities: &[&dyn Persistable]) -> Value {
    Value::Array(
        entities
            .iter()
            .map(|e| map_one(*e).into_value())
            .collect(),
    )
}

fn map_field(field: Field<'_>) -> Option<Value> {
    match field {
        Field::Undefined => None,
        Field::Value(value) => Some(value),
        Field::Id(id) => Some(Value::String(id)),
        Field::Ids(ids) => Some(Value::Array(ids.into_iter().map(Value::String).collect())),
        Field::Entity(nested) => Some(map_one(nested).into_value()),
        Field::Entities(nested) => Some(map_many(&nested)),
    }
}
