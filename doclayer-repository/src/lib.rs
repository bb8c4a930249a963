//! Generic repositories over document stores.
//!
//! A [`DocumentRepository`] maps [`DomainEntity`](doclayer_model::DomainEntity)
//! values to and from store records, checks declared references before
//! writing, and runs every write as one batched store round-trip:
//!
//! - [`bulk`] reports per-item outcomes ([`BulkItemizedResponse`]) or
//!   aggregate counts ([`BulkCountedResponse`])
//! - [`ReferenceValidator`] probes referenced collections through
//!   [`ReferenceProbe`]s, which repositories and stores both provide
//! - every returned entity is a [`Document`] bound to its live record, so it
//!   can later be saved, populated or removed without a fresh lookup

pub mod bulk;
mod error;
mod handle;
mod options;
mod repository;
mod validator;

pub use bulk::{BatchContext, BulkCountedResponse, BulkItemResult, BulkItemizedResponse};
pub use error::{RepositoryError, RepositoryResult};
pub use handle::{Document, DocumentHandle};
pub use options::{DEFAULT_PROBE_CONCURRENCY, RepositoryOptions};
pub use repository::{
    DocumentRepository, EntityBatch, FindOptions, RepositoryBuilder, WriteInput, WriteOutcome,
};
pub use validator::{ReferenceProbe, ReferenceValidator, StoreProbe, ValidationScope};
