//! The document store contract consumed by repositories.

use crate::error::StoreResult;
use crate::filter::Filter;
use crate::query::{PopulatePath, Query};
use async_trait::async_trait;
use doclayer_model::Record;
use serde::{Deserialize, Serialize};

/// One operation of a bulk write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteOp {
    /// Sets the given keys on the record with `id`, keeping the others.
    UpdateOne { id: String, set: Record },
    /// Replaces the record with `id` entirely.
    ReplaceOne { id: String, record: Record },
}

impl WriteOp {
    pub fn id(&self) -> &str {
        match self {
            Self::UpdateOne { id, .. } | Self::ReplaceOne { id, .. } => id,
        }
    }
}

/// A per-operation failure reported by a bulk write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteError {
    /// Position of the failing operation in the submitted list.
    pub index: usize,
    pub message: String,
}

/// Result of a bulk write round-trip.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkWriteOutcome {
    pub matched: u64,
    pub modified: u64,
    pub write_errors: Vec<WriteError>,
}

impl BulkWriteOutcome {
    /// The write error reported for operation `index`, if any.
    pub fn error_for(&self, index: usize) -> Option<&WriteError> {
        self.write_errors.iter().find(|e| e.index == index)
    }
}

/// A client bound to one collection of a document store.
///
/// Every method is one round-trip. Implementations must be safe for
/// concurrent use.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Name of the collection this client is bound to.
    fn collection(&self) -> &str;

    /// Inserts all records, assigning ids to records without one.
    /// Returns the stored records in input order.
    async fn insert_many(&self, records: Vec<Record>) -> StoreResult<Vec<Record>>;

    async fn find(&self, query: &Query) -> StoreResult<Vec<Record>>;

    /// Applies every operation; per-operation failures are reported in
    /// `write_errors` without aborting the others.
    async fn bulk_write(&self, ops: Vec<WriteOp>) -> StoreResult<BulkWriteOutcome>;

    /// Deletes all matching records and returns how many were removed.
    async fn delete_many(&self, filter: &Filter) -> StoreResult<u64>;

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Record>>;

    async fn exists(&self, filter: &Filter) -> StoreResult<bool>;

    /// Hydrates each relation path of `record` in place.
    async fn populate(&self, record: Record, paths: &[PopulatePath]) -> StoreResult<Record>;
}
