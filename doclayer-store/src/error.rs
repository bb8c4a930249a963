//! Error types for the store layer.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store round-trips.
///
/// Cloneable so one failed round-trip can be recorded against every item it
/// touched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The store could not be reached or refused the call.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A write would violate a unique key.
    #[error("duplicate key on \"{field}\": {value}")]
    DuplicateKey { field: String, value: String },

    /// The query or write operation is malformed.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// A populate path has no resolvable target collection.
    #[error("unknown relation path: {0}")]
    UnknownRelation(String),
}
