//! Error types for the repository layer.

use doclayer_model::{MapperError, RegistryError, ValidationError};
use doclayer_store::StoreError;
use thiserror::Error;

/// Result type for repository operations.
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Errors that can occur in repository operations.
///
/// Inside bulk flows every variant except `UnreportedItem` is captured into
/// the failing item's result; singular calls return it directly.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RepositoryError {
    /// Payload does not match the repository schema.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A required reference has no value.
    #[error("Required reference {collection}.{foreign_field} is missing for property \"{property}\"")]
    MissingRequiredReference {
        collection: String,
        foreign_field: String,
        property: String,
    },

    /// No collaborator repository is wired for the referenced collection.
    #[error("No repository registered for referenced collection {collection} (property \"{property}\")")]
    ReferenceModelUnavailable { collection: String, property: String },

    /// The referenced record does not exist.
    #[error("Referenced {name} {collection}.{foreign_field}={value} does not exist (property \"{property}\")")]
    DanglingReference {
        name: String,
        collection: String,
        foreign_field: String,
        property: String,
        value: String,
    },

    /// The store rejected one operation of a bulk write.
    #[error("store rejected write operation {index}: {message}")]
    StoreWrite { index: usize, message: String },

    /// A store round-trip failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A finder needs a field the schema does not declare.
    #[error("schema of {collection} does not declare field \"{field}\"")]
    SchemaFieldMissing { collection: String, field: String },

    /// The entity is not bound to a live record of this repository.
    #[error("entity has no document handle attached")]
    NoHandleAttached,

    /// A bulk worker finished without reporting an item.
    #[error("bulk worker never reported item {index}")]
    UnreportedItem { index: usize },

    #[error("mapping error: {0}")]
    Mapping(#[from] MapperError),

    #[error("reference declaration error: {0}")]
    Registry(#[from] RegistryError),

    /// The operation needs the entity's id and it has none.
    #[error("{operation} requires an entity id")]
    MissingId { operation: &'static str },

    /// A written record could not be read back.
    #[error("document {id} not found after write")]
    NotFoundAfterWrite { id: String },

    /// A singular collapse was requested on a batch of another size.
    #[error("expected exactly one input, got {count}")]
    NotSingular { count: usize },
}
