//! Binding between domain entities and the live records they came from.
//!
//! Every entity a repository returns is wrapped in a [`Document`], which
//! pairs the entity with a [`DocumentHandle`]. Clones of a handle share
//! state: once the record is removed, every clone reports itself detached.

use crate::error::{RepositoryError, RepositoryResult};
use doclayer_model::{
    DomainEntity, MapperError, MapperResult, PlainRecord, Record, to_domain, to_persistence,
};
use doclayer_store::PopulatePath;
use serde_json::Value;
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A reference path whose ids were replaced by the documents they point at.
#[derive(Debug, Clone)]
struct Hydrated {
    /// The stored ids, `None` when the key was absent.
    stored: Option<Value>,
    /// What the entity mapped the path to right after hydration.
    mapped: Option<Value>,
}

struct LiveState {
    record: Record,
    detached: bool,
    hydrated: HashMap<String, Hydrated>,
}

/// Shared reference to a stored record.
#[derive(Clone)]
pub struct DocumentHandle {
    collection: Arc<str>,
    id: Arc<str>,
    state: Arc<Mutex<LiveState>>,
}

impl DocumentHandle {
    pub(crate) fn new(collection: &str, record: Record) -> MapperResult<Self> {
        let id = record
            .id()
            .ok_or_else(|| MapperError::InvalidId("stored record has no _id".into()))?;
        Ok(Self {
            collection: Arc::from(collection),
            id: Arc::from(id),
            state: Arc::new(Mutex::new(LiveState {
                record,
                detached: false,
                hydrated: HashMap::new(),
            })),
        })
    }

    fn lock(&self) -> MutexGuard<'_, LiveState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn is_attached(&self) -> bool {
        !self.lock().detached
    }

    /// Copy of the last known stored state.
    pub fn record(&self) -> Record {
        self.lock().record.clone()
    }

    pub(crate) fn replace_record(&self, record: Record) {
        self.lock().record = record;
    }

    /// Paths currently holding hydrated documents instead of ids.
    pub fn hydrated_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.lock().hydrated.keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Records that `path` was hydrated. The first stored value wins so
    /// repeated hydration keeps the original ids.
    pub(crate) fn mark_hydrated(&self, path: &str, stored: Option<Value>, mapped: Option<Value>) {
        let mut state = self.lock();
        let entry = state.hydrated.entry(path.to_owned()).or_insert(Hydrated {
            stored,
            mapped: None,
        });
        entry.mapped = mapped;
    }

    /// The live record with `path` put back to its stored ids.
    pub(crate) fn record_with_ids_at(&self, path: &str) -> Record {
        let state = self.lock();
        let mut record = state.record.clone();
        if let Some(hydrated) = state.hydrated.get(path) {
            restore(&mut record, path, &hydrated.stored);
        }
        record
    }

    /// Puts stored ids back into `payload` for hydrated paths the entity left
    /// as it was after hydration.
    pub(crate) fn dehydrate_payload(&self, payload: &mut Record) {
        let state = self.lock();
        for (path, hydrated) in &state.hydrated {
            if payload.get(path) == hydrated.mapped.as_ref() {
                restore(payload, path, &hydrated.stored);
            }
        }
    }

    /// Applies a flushed payload to the live record.
    ///
    /// Hydrated paths written back unchanged keep their documents; paths the
    /// entity overwrote stop being hydrated.
    pub(crate) fn record_saved(&self, payload: &Record) {
        let mut guard = self.lock();
        let state = &mut *guard;
        for (key, value) in payload.iter() {
            let overwritten = match state.hydrated.get(key) {
                Some(hydrated) if hydrated.stored.as_ref() == Some(value) => continue,
                Some(_) => true,
                None => false,
            };
            if overwritten {
                state.hydrated.remove(key);
            }
            state.record.insert(key.clone(), value.clone());
        }
    }

    pub(crate) fn detach(&self) {
        self.lock().detached = true;
    }
}

impl std::fmt::Debug for DocumentHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentHandle")
            .field("collection", &self.collection)
            .field("id", &self.id)
            .field("attached", &self.is_attached())
            .finish()
    }
}

impl PlainRecord for DocumentHandle {
    fn to_plain(&self) -> MapperResult<Record> {
        Ok(self.record())
    }
}

/// A domain entity bound to its stored record.
///
/// Derefs to the entity, so fields and methods are reachable directly.
#[derive(Debug, Clone)]
pub struct Document<T> {
    entity: T,
    handle: DocumentHandle,
}

impl<T> Document<T> {
    pub fn entity(&self) -> &T {
        &self.entity
    }

    pub fn entity_mut(&mut self) -> &mut T {
        &mut self.entity
    }

    pub fn handle(&self) -> &DocumentHandle {
        &self.handle
    }

    pub fn id(&self) -> &str {
        self.handle.id()
    }

    pub fn into_inner(self) -> T {
        self.entity
    }

    pub fn into_parts(self) -> (T, DocumentHandle) {
        (self.entity, self.handle)
    }

    pub(crate) fn set_entity(&mut self, entity: T) {
        self.entity = entity;
    }
}

impl<T> Deref for Document<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.entity
    }
}

impl<T> DerefMut for Document<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.entity
    }
}

impl<T: PartialEq> PartialEq for Document<T> {
    fn eq(&self, other: &Self) -> bool {
        self.entity == other.entity && self.handle.id() == other.handle.id()
    }
}

fn restore(record: &mut Record, path: &str, stored: &Option<Value>) {
    match stored {
        Some(value) => {
            record.insert(path, value.clone());
        }
        None => {
            record.remove(path);
        }
    }
}

/// Maps a stored record to its entity and binds a handle to it.
pub(crate) fn bind<T: DomainEntity>(collection: &str, record: Record) -> RepositoryResult<Document<T>> {
    let entity = to_domain::<T>(&record)?;
    let handle = DocumentHandle::new(collection, record)?;
    Ok(Document { entity, handle })
}

/// Like [`bind`], for a record the store returned with `paths` hydrated.
///
/// The stored ids are recovered from each hydrated document's foreign field.
pub(crate) fn bind_hydrated<T: DomainEntity>(
    collection: &str,
    record: Record,
    paths: &[PopulatePath],
) -> RepositoryResult<Document<T>> {
    let document = bind::<T>(collection, record)?;
    if paths.is_empty() {
        return Ok(document);
    }
    let live = document.handle.record();
    let mapped = to_persistence(document.entity());
    for path in paths {
        let Some(target) = &path.target else {
            continue;
        };
        let stored = live
            .get(&path.path)
            .map(|value| foreign_keys(value, &target.foreign_field));
        document
            .handle
            .mark_hydrated(&path.path, stored, mapped.get(&path.path).cloned());
    }
    Ok(document)
}

/// Replaces hydrated documents by their `foreign_field` value.
fn foreign_keys(value: &Value, foreign_field: &str) -> Value {
    match value {
        Value::Object(map) => map.get(foreign_field).cloned().unwrap_or(Value::Null),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| foreign_keys(item, foreign_field))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// The document's handle, if it is live and belongs to `collection`.
pub(crate) fn attached_handle<'d, T>(
    document: &'d Document<T>,
    collection: &str,
) -> RepositoryResult<&'d DocumentHandle> {
    let handle = document.handle();
    if handle.collection() != collection || !handle.is_attached() {
        return Err(RepositoryError::NoHandleAttached);
    }
    Ok(handle)
}
