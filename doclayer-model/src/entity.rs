use crate::error::{MapperResult, RegistryResult};
use crate::record::Record;
use crate::reference::ReferenceDeclarer;
use serde_json::Value;

/// One field of an entity as seen by the persistence mapper.
///
/// `Undefined` fields are left out of the record entirely, which is what
/// makes partial update payloads possible.
pub enum Field<'a> {
    Undefined,
    Value(Value),
    /// A scalar foreign id, stored as a string.
    Id(String),
    /// An array of raw foreign ids, stored as strings.
    Ids(Vec<String>),
    Entity(&'a dyn Persistable),
    Entities(Vec<&'a dyn Persistable>),
}

impl<'a> Field<'a> {
    pub fn value(value: impl Into<Value>) -> Self {
        Self::Value(value.into())
    }

    /// `Undefined` when `value` is `None`.
    pub fn optional<V: Into<Value>>(value: Option<V>) -> Self {
        match value {
            Some(v) => Self::Value(v.into()),
            None => Self::Undefined,
        }
    }

    pub fn id(id: impl ToString) -> Self {
        Self::Id(id.to_string())
    }

    pub fn optional_id<I: ToString>(id: Option<I>) -> Self {
        match id {
            Some(id) => Self::Id(id.to_string()),
            None => Self::Undefined,
        }
    }

    pub fn ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        Self::Ids(ids.into_iter().map(|id| id.to_string()).collect())
    }

    pub fn entity(entity: &'a dyn Persistable) -> Self {
        Self::Entity(entity)
    }

    pub fn entities<P: Persistable>(entities: &'a [P]) -> Self {
        Self::Entities(entities.iter().map(|e| e as &dyn Persistable).collect())
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }
}

/// Capability of being mapped to a persistence record.
///
/// Implemented by aggregates and by nested value objects alike; the mapper
/// recurses into any field that reports itself through [`Field::Entity`] or
/// [`Field::Entities`].
pub trait Persistable {
    /// The entity's identifier, if it has one yet.
    fn persistent_id(&self) -> Option<String> {
        None
    }

    /// Every field of the entity in declaration order.
    fn fields(&self) -> Vec<(&'static str, Field<'_>)>;
}

/// An aggregate stored in its own collection.
pub trait DomainEntity: Persistable + Send + Sync + Sized + 'static {
    /// Collection the entity lives in.
    const COLLECTION: &'static str;

    /// Builds the entity from a normalized plain record.
    ///
    /// Reconstructing nested domain types from nested sub-records is the
    /// constructor's job; the mapper hands over plain data only.
    fn from_record(record: Record) -> MapperResult<Self>;

    /// Declares the entity's references. Called once per registry.
    fn declare_references(refs: &mut ReferenceDeclarer<'_>) -> RegistryResult<()> {
        let _ = refs;
        Ok(())
    }
}
