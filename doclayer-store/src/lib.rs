//! Document store contract for doclayer.
//!
//! Repositories talk to storage exclusively through [`DocumentStore`], one
//! client per collection. The contract mirrors what document databases offer
//! natively:
//!
//! - `insert_many`: order-preserving batch insert with store-assigned ids
//! - `find`: [`Query`] with projection, sort, skip, limit and populate
//! - `bulk_write`: per-operation `write_errors` by index
//! - `delete_many`, `find_by_id`, `exists`, `populate`
//!
//! [`MemoryDatabase`] is a complete in-memory implementation with per-call
//! counters, used by the test suites and for local development.

mod error;
mod filter;
mod memory;
mod query;
mod store;

pub use error::{StoreError, StoreResult};
pub use filter::{Clause, Condition, Filter, resolve_path};
pub use memory::{MemoryCollection, MemoryDatabase, StoreCallStats};
pub use query::{PopulatePath, Projection, Query, RelationTarget, SortKey, SortOrder};
pub use store::{BulkWriteOutcome, DocumentStore, WriteError, WriteOp};
