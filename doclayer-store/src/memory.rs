//! In-memory document store.
//!
//! Implements the full [`DocumentStore`] contract over plain vectors of
//! records. Collections of one [`MemoryDatabase`] can populate each other.
//! Every collection counts its round-trips so callers can assert which store
//! calls an operation made.

use crate::error::{StoreError, StoreResult};
use crate::filter::Filter;
use crate::query::{PopulatePath, Query};
use crate::store::{BulkWriteOutcome, DocumentStore, WriteError, WriteOp};
use async_trait::async_trait;
use doclayer_model::{ID_FIELD, Record};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;
use uuid::Uuid;

/// Number of round-trips a collection has served, per operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCallStats {
    pub insert_many: usize,
    pub find: usize,
    pub bulk_write: usize,
    pub delete_many: usize,
    pub find_by_id: usize,
    pub exists: usize,
    pub populate: usize,
}

impl StoreCallStats {
    /// Round-trips that could have changed stored data.
    pub fn writes(&self) -> usize {
        self.insert_many + self.bulk_write + self.delete_many
    }

    pub fn total(&self) -> usize {
        self.writes() + self.find + self.find_by_id + self.exists + self.populate
    }
}

#[derive(Default)]
struct CallCounters {
    insert_many: AtomicUsize,
    find: AtomicUsize,
    bulk_write: AtomicUsize,
    delete_many: AtomicUsize,
    find_by_id: AtomicUsize,
    exists: AtomicUsize,
    populate: AtomicUsize,
}

impl CallCounters {
    fn snapshot(&self) -> StoreCallStats {
        StoreCallStats {
            insert_many: self.insert_many.load(Ordering::Relaxed),
            find: self.find.load(Ordering::Relaxed),
            bulk_write: self.bulk_write.load(Ordering::Relaxed),
            delete_many: self.delete_many.load(Ordering::Relaxed),
            find_by_id: self.find_by_id.load(Ordering::Relaxed),
            exists: self.exists.load(Ordering::Relaxed),
            populate: self.populate.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        for counter in [
            &self.insert_many,
            &self.find,
            &self.bulk_write,
            &self.delete_many,
            &self.find_by_id,
            &self.exists,
            &self.populate,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

struct CollectionState {
    name: String,
    records: RwLock<Vec<Record>>,
    unique_fields: RwLock<Vec<String>>,
    counters: CallCounters,
    available: AtomicBool,
}

impl CollectionState {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            records: RwLock::new(Vec::new()),
            unique_fields: RwLock::new(Vec::new()),
            counters: CallCounters::default(),
            available: AtomicBool::new(true),
        }
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Vec<Record>>> {
        self.records
            .read()
            .map_err(|_| StoreError::Unavailable(format!("collection {} is poisoned", self.name)))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Vec<Record>>> {
        self.records
            .write()
            .map_err(|_| StoreError::Unavailable(format!("collection {} is poisoned", self.name)))
    }

    fn unique_fields(&self) -> StoreResult<Vec<String>> {
        self.unique_fields
            .read()
            .map(|fields| fields.clone())
            .map_err(|_| StoreError::Unavailable(format!("collection {} is poisoned", self.name)))
    }

    fn ensure_available(&self) -> StoreResult<()> {
        if self.available.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(StoreError::Unavailable(format!(
                "collection {} is offline",
                self.name
            )))
        }
    }
}

#[derive(Default)]
struct DatabaseInner {
    collections: RwLock<HashMap<String, Arc<CollectionState>>>,
}

/// A set of in-memory collections sharing one namespace.
#[derive(Clone, Default)]
pub struct MemoryDatabase {
    inner: Arc<DatabaseInner>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a client for `name`, creating the collection on first use.
    pub fn collection(&self, name: &str) -> MemoryCollection {
        let state = {
            let mut collections = self
                .inner
                .collections
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            collections
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(CollectionState::new(name)))
                .clone()
        };
        MemoryCollection {
            database: self.clone(),
            state,
        }
    }

    fn lookup(&self, name: &str) -> Option<Arc<CollectionState>> {
        self.inner
            .collections
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(name)
            .cloned()
    }
}

/// Client for one in-memory collection. Cheap to clone; clones share data.
#[derive(Clone)]
pub struct MemoryCollection {
    database: MemoryDatabase,
    state: Arc<CollectionState>,
}

impl MemoryCollection {
    /// Rejects writes that would store two records with the same `field` value.
    pub fn create_unique_index(&self, field: impl Into<String>) {
        let mut fields = self
            .state
            .unique_fields
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        fields.push(field.into());
    }

    /// Simulates an outage: every call fails with `Unavailable` while false.
    pub fn set_available(&self, available: bool) {
        self.state.available.store(available, Ordering::Release);
    }

    pub fn stats(&self) -> StoreCallStats {
        self.state.counters.snapshot()
    }

    pub fn reset_stats(&self) {
        self.state.counters.reset();
    }

    /// Number of stored records. Not counted as a round-trip.
    pub fn len(&self) -> usize {
        self.state.read().map(|records| records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies of all stored records in insertion order. Not counted.
    pub fn snapshot(&self) -> Vec<Record> {
        self.state
            .read()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    fn check_unique(
        &self,
        unique_fields: &[String],
        candidate: &Record,
        others: &[&Record],
    ) -> StoreResult<()> {
        for field in std::iter::once(ID_FIELD).chain(unique_fields.iter().map(String::as_str)) {
            let Some(value) = candidate.get(field).filter(|v| !v.is_null()) else {
                continue;
            };
            if others.iter().any(|other| other.get(field) == Some(value)) {
                return Err(StoreError::DuplicateKey {
                    field: field.to_string(),
                    value: value.to_string(),
                });
            }
        }
        Ok(())
    }

    fn populate_one(&self, mut record: Record, paths: &[PopulatePath]) -> StoreResult<Record> {
        for path in paths {
            let target = path
                .target
                .as_ref()
                .ok_or_else(|| StoreError::UnknownRelation(path.path.clone()))?;
            let Some(current) = record.get(&path.path).cloned() else {
                continue;
            };
            let Some(collection) = self.database.lookup(&target.collection) else {
                return Err(StoreError::UnknownRelation(format!(
                    "{} -> {}",
                    path.path, target.collection
                )));
            };
            let related = collection.read()?;
            let find = |key: &Value| {
                related
                    .iter()
                    .find(|r| r.get(&target.foreign_field) == Some(key))
                    .map(|r| r.clone().into_value())
            };
            let hydrated = match current {
                Value::Array(keys) => Value::Array(keys.iter().filter_map(find).collect()),
                Value::Null => Value::Null,
                key => find(&key).unwrap_or(Value::Null),
            };
            drop(related);
            record.insert(path.path.clone(), hydrated);
        }
        Ok(record)
    }
}

#[async_trait]
impl DocumentStore for MemoryCollection {
    fn collection(&self) -> &str {
        &self.state.name
    }

    async fn insert_many(&self, records: Vec<Record>) -> StoreResult<Vec<Record>> {
        self.state.counters.insert_many.fetch_add(1, Ordering::Relaxed);
        self.state.ensure_available()?;
        let unique_fields = self.state.unique_fields()?;

        let mut stored = self.state.write()?;
        let mut staged: Vec<Record> = Vec::with_capacity(records.len());
        for mut record in records {
            if record.get(ID_FIELD).is_none_or(Value::is_null) {
                record.insert(ID_FIELD, Value::String(Uuid::now_v7().to_string()));
            }
            let others: Vec<&Record> = stored.iter().chain(staged.iter()).collect();
            self.check_unique(&unique_fields, &record, &others)?;
            staged.push(record);
        }

        debug!("Inserted {} record(s) into {}", staged.len(), self.state.name);
        stored.extend(staged.iter().cloned());
        Ok(staged)
    }

    async fn find(&self, query: &Query) -> StoreResult<Vec<Record>> {
        self.state.counters.find.fetch_add(1, Ordering::Relaxed);
        self.state.ensure_available()?;

        let mut matched: Vec<Record> = {
            let stored = self.state.read()?;
            stored
                .iter()
                .filter(|r| query.filter.matches(r))
                .cloned()
                .collect()
        };
        query.sort_records(&mut matched);
        let mut page = query.window(matched);

        if !query.populate.is_empty() {
            page = page
                .into_iter()
                .map(|r| self.populate_one(r, &query.populate))
                .collect::<StoreResult<_>>()?;
        }
        if let Some(projection) = &query.projection {
            page = page.into_iter().map(|r| projection.apply(r)).collect();
        }
        Ok(page)
    }

    async fn bulk_write(&self, ops: Vec<WriteOp>) -> StoreResult<BulkWriteOutcome> {
        self.state.counters.bulk_write.fetch_add(1, Ordering::Relaxed);
        self.state.ensure_available()?;
        let unique_fields = self.state.unique_fields()?;

        let mut stored = self.state.write()?;
        let mut outcome = BulkWriteOutcome::default();
        for (index, op) in ops.into_iter().enumerate() {
            let id = Value::String(op.id().to_string());
            let Some(position) = stored.iter().position(|r| r.get(ID_FIELD) == Some(&id)) else {
                continue;
            };
            outcome.matched += 1;

            let next = match op {
                WriteOp::UpdateOne { set, .. } => {
                    let mut next = stored[position].clone();
                    next.merge_from(&set);
                    next.insert(ID_FIELD, id.clone());
                    next
                }
                WriteOp::ReplaceOne { mut record, .. } => {
                    record.insert(ID_FIELD, id.clone());
                    record
                }
            };

            let others: Vec<&Record> = stored
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != position)
                .map(|(_, r)| r)
                .collect();
            if let Err(err) = self.check_unique(&unique_fields, &next, &others) {
                outcome.write_errors.push(WriteError {
                    index,
                    message: err.to_string(),
                });
                continue;
            }

            if stored[position] != next {
                outcome.modified += 1;
                stored[position] = next;
            }
        }
        Ok(outcome)
    }

    async fn delete_many(&self, filter: &Filter) -> StoreResult<u64> {
        self.state.counters.delete_many.fetch_add(1, Ordering::Relaxed);
        self.state.ensure_available()?;

        let mut stored = self.state.write()?;
        let before = stored.len();
        stored.retain(|r| !filter.matches(r));
        let deleted = (before - stored.len()) as u64;
        debug!("Deleted {} record(s) from {}", deleted, self.state.name);
        Ok(deleted)
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Record>> {
        self.state.counters.find_by_id.fetch_add(1, Ordering::Relaxed);
        self.state.ensure_available()?;

        let stored = self.state.read()?;
        Ok(stored.iter().find(|r| r.id() == Some(id)).cloned())
    }

    async fn exists(&self, filter: &Filter) -> StoreResult<bool> {
        self.state.counters.exists.fetch_add(1, Ordering::Relaxed);
        self.state.ensure_available()?;

        let stored = self.state.read()?;
        Ok(stored.iter().any(|r| filter.matches(r)))
    }

    async fn populate(&self, record: Record, paths: &[PopulatePath]) -> StoreResult<Record> {
        self.state.counters.populate.fetch_add(1, Ordering::Relaxed);
        self.state.ensure_available()?;
        self.populate_one(record, paths)
    }
}
