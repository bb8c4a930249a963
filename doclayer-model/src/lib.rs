//! Domain entity model for doclayer.
//!
//! Defines the types every other doclayer crate depends on:
//! - [`Record`]: the flat, store-native projection of an entity
//! - [`Persistable`] / [`DomainEntity`]: the mapping capability of entities
//! - [`mapper`]: `to_persistence` / `to_domain` conversion
//! - [`ReferenceRegistry`]: declared cross-collection references per type
//! - [`DocumentSchema`]: optional structural checks on write payloads
//!
//! Nothing here performs I/O. Stores live in `doclayer-store`, the write
//! orchestration in `doclayer-repository`.

mod entity;
mod error;
pub mod mapper;
mod record;
mod reference;
mod schema;

pub use entity::{DomainEntity, Field, Persistable};
pub use error::{
    MapperError, MapperResult, RegistryError, RegistryResult, SchemaViolation, ValidationError,
    ViolationKind,
};
pub use mapper::{to_domain, to_persistence};
pub use record::{ID_FIELD, PlainRecord, Record};
pub use reference::{
    PropertyShape, Reference, ReferenceDeclaration, ReferenceDeclarer, ReferenceRegistry,
    singular_of,
};
pub use schema::{DocumentSchema, FieldKind, PARENT_ID_FIELD, SchemaField, SchemaMode, TAGS_FIELD};
