//! Batched create, update and delete.

use super::{DocumentRepository, WriteInput, WriteOutcome};
use crate::bulk::{self, BatchContext, BulkCountedResponse, BulkItemizedResponse};
use crate::error::{RepositoryError, RepositoryResult};
use crate::handle::{Document, bind};
use crate::validator::ValidationScope;
use doclayer_model::{DomainEntity, ID_FIELD, Record, SchemaMode, to_persistence};
use doclayer_store::{Filter, Query, StoreError, WriteOp};
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Itemized response of a batched create or update.
pub type EntityBatch<T> = BulkItemizedResponse<T, Document<T>>;

impl<T: DomainEntity> DocumentRepository<T> {
    // ── Create ───────────────────────────────────────────────────────

    pub async fn create(
        &self,
        input: WriteInput<T>,
    ) -> RepositoryResult<WriteOutcome<Document<T>, EntityBatch<T>>> {
        match input {
            WriteInput::One(entity) => self.create_one(entity).await.map(WriteOutcome::Single),
            WriteInput::Many(entities) => self.create_many(entities).await.map(WriteOutcome::Batch),
        }
    }

    /// Creates one entity, returning its failure as the error.
    pub async fn create_one(&self, entity: T) -> RepositoryResult<Document<T>> {
        self.create_many(vec![entity]).await?.into_single_outcome()?
    }

    /// Creates every entity with one insert round-trip.
    ///
    /// Items failing reference or schema checks never reach the store.
    pub async fn create_many(&self, entities: Vec<T>) -> RepositoryResult<EntityBatch<T>> {
        let collection = self.collection();
        debug!("Creating {} documents in {}", entities.len(), collection);

        bulk::itemized(entities, |mut ctx| async move {
            let records: Vec<Record> = ctx.items().iter().map(|e| to_persistence(e)).collect();
            let checks = self
                .preflight(records.iter().collect(), ValidationScope::All, SchemaMode::Create)
                .await;

            let mut eligible = Vec::new();
            let mut batch = Vec::new();
            for (index, (record, check)) in records.into_iter().zip(checks).enumerate() {
                match check {
                    Ok(()) => {
                        eligible.push(index);
                        batch.push(record);
                    }
                    Err(error) => {
                        warn!("Create item {} rejected for {}: {}", index, collection, error);
                        ctx.mark_failure(index, error);
                    }
                }
            }
            debug!("{} of {} items eligible for insert", eligible.len(), ctx.len());
            if batch.is_empty() {
                return ctx;
            }

            match self.store.insert_many(batch).await {
                Ok(stored) if stored.len() == eligible.len() => {
                    for (index, record) in eligible.into_iter().zip(stored) {
                        match bind(collection, record) {
                            Ok(document) => ctx.mark_success(index, document),
                            Err(error) => ctx.mark_failure(index, error),
                        }
                    }
                }
                Ok(stored) => {
                    let error = RepositoryError::Store(StoreError::InvalidQuery(format!(
                        "insert returned {} records for {} inputs",
                        stored.len(),
                        eligible.len()
                    )));
                    ctx.fail_all(&eligible, &error);
                }
                Err(error) => {
                    warn!("Batch insert into {} failed for {} items: {}", collection, eligible.len(), error);
                    ctx.fail_all(&eligible, &RepositoryError::Store(error));
                }
            }
            ctx
        })
        .await
    }

    // ── Update ───────────────────────────────────────────────────────

    pub async fn update(
        &self,
        input: WriteInput<T>,
    ) -> RepositoryResult<WriteOutcome<Option<Document<T>>, EntityBatch<T>>> {
        match input {
            WriteInput::One(entity) => self.update_one(entity).await.map(WriteOutcome::Single),
            WriteInput::Many(entities) => self.update_many(entities).await.map(WriteOutcome::Batch),
        }
    }

    /// Updates one entity by id.
    ///
    /// `None` when the target does not exist or the update failed.
    pub async fn update_one(&self, entity: T) -> RepositoryResult<Option<Document<T>>> {
        let id = entity
            .persistent_id()
            .ok_or(RepositoryError::MissingId { operation: "update" })?;
        if self.store.find_by_id(&id).await?.is_none() {
            debug!("Update target {} not found in {}", id, self.collection());
            return Ok(None);
        }
        match self.update_many(vec![entity]).await?.into_single_outcome()? {
            Ok(document) => Ok(Some(document)),
            Err(error) => {
                warn!("Update of {} in {} failed: {}", id, self.collection(), error);
                Ok(None)
            }
        }
    }

    /// Partially updates every entity by id with one bulk write, then
    /// re-reads the written records in one round-trip.
    ///
    /// Only the keys present in each mapped entity are written and
    /// validated.
    pub async fn update_many(&self, entities: Vec<T>) -> RepositoryResult<EntityBatch<T>> {
        let collection = self.collection();
        debug!("Updating {} documents in {}", entities.len(), collection);

        bulk::itemized(entities, |mut ctx| async move {
            let mut payloads = Vec::with_capacity(ctx.len());
            let mut without_id = Vec::new();
            for (index, entity) in ctx.items().iter().enumerate() {
                let mut record = to_persistence(entity);
                match record.remove(ID_FIELD).as_ref().and_then(|id| id.as_str()) {
                    Some(id) => payloads.push((index, id.to_owned(), record)),
                    None => without_id.push(index),
                }
            }
            ctx.fail_all(&without_id, &RepositoryError::MissingId { operation: "update" });

            let checks = self
                .preflight(
                    payloads.iter().map(|(_, _, record)| record).collect(),
                    ValidationScope::PresentOnly,
                    SchemaMode::Update,
                )
                .await;

            let mut ops = Vec::new();
            let mut targets = Vec::new();
            for ((index, id, record), check) in payloads.into_iter().zip(checks) {
                match check {
                    Ok(()) => {
                        targets.push((index, id.clone()));
                        ops.push(WriteOp::UpdateOne { id, set: record });
                    }
                    Err(error) => {
                        warn!("Update item {} rejected for {}: {}", index, collection, error);
                        ctx.mark_failure(index, error);
                    }
                }
            }
            if ops.is_empty() {
                return ctx;
            }

            let outcome = match self.store.bulk_write(ops).await {
                Ok(outcome) => outcome,
                Err(error) => {
                    warn!("Bulk update of {} failed for {} items: {}", collection, targets.len(), error);
                    let indices: Vec<usize> = targets.iter().map(|(index, _)| *index).collect();
                    ctx.fail_all(&indices, &RepositoryError::Store(error));
                    return ctx;
                }
            };

            let mut written = Vec::with_capacity(targets.len());
            for (op_index, (index, id)) in targets.into_iter().enumerate() {
                match outcome.error_for(op_index) {
                    Some(write_error) => ctx.mark_failure(
                        index,
                        RepositoryError::StoreWrite {
                            index: op_index,
                            message: write_error.message.clone(),
                        },
                    ),
                    None => written.push((index, id)),
                }
            }
            if !written.is_empty() {
                self.refetch(&mut ctx, written).await;
            }
            ctx
        })
        .await
    }

    /// Reads back the written ids and reports each item.
    async fn refetch(
        &self,
        ctx: &mut BatchContext<T, Document<T>>,
        written: Vec<(usize, String)>,
    ) {
        let query = Query::new(Filter::by_ids(written.iter().map(|(_, id)| id.as_str())));
        let records = match self.store.find(&query).await {
            Ok(records) => records,
            Err(error) => {
                warn!("Re-fetch after update of {} failed: {}", self.collection(), error);
                let indices: Vec<usize> = written.iter().map(|(index, _)| *index).collect();
                ctx.fail_all(&indices, &RepositoryError::Store(error));
                return;
            }
        };

        let mut by_id = HashMap::with_capacity(records.len());
        for record in records {
            if let Some(id) = record.id() {
                by_id.insert(id.to_owned(), record);
            }
        }
        for (index, id) in written {
            match by_id.get(&id) {
                Some(record) => match bind(self.collection(), record.clone()) {
                    Ok(document) => ctx.mark_success(index, document),
                    Err(error) => ctx.mark_failure(index, error),
                },
                None => ctx.mark_failure(index, RepositoryError::NotFoundAfterWrite { id }),
            }
        }
    }

    // ── Delete ───────────────────────────────────────────────────────

    pub async fn delete(
        &self,
        input: WriteInput<String>,
    ) -> RepositoryResult<WriteOutcome<Option<bool>, BulkCountedResponse>> {
        match input {
            WriteInput::One(id) => self.delete_one(&id).await.map(WriteOutcome::Single),
            WriteInput::Many(ids) => self.delete_many(ids).await.map(WriteOutcome::Batch),
        }
    }

    /// Deletes one record by id.
    ///
    /// `None` without any write when the target does not exist.
    pub async fn delete_one(&self, id: &str) -> RepositoryResult<Option<bool>> {
        if self.store.find_by_id(id).await?.is_none() {
            debug!("Delete target {} not found in {}", id, self.collection());
            return Ok(None);
        }
        let response = self.delete_many(vec![id.to_owned()]).await?;
        Ok(Some(response.success == 1))
    }

    /// Deletes every listed id with one round-trip.
    pub async fn delete_many(&self, ids: Vec<String>) -> RepositoryResult<BulkCountedResponse> {
        debug!("Deleting {} documents from {}", ids.len(), self.collection());
        bulk::counted(ids, |ids| async move {
            let deleted = self.store.delete_many(&Filter::by_ids(ids)).await?;
            Ok::<_, RepositoryError>(usize::try_from(deleted).unwrap_or(usize::MAX))
        })
        .await
    }

    // ── Pre-flight ───────────────────────────────────────────────────

    /// Reference and schema checks for each record, in input order.
    async fn preflight(
        &self,
        records: Vec<&Record>,
        scope: ValidationScope,
        mode: SchemaMode,
    ) -> Vec<RepositoryResult<()>> {
        stream::iter(records)
            .map(|record| self.check_record(record, scope, mode))
            .buffered(self.options.effective_concurrency())
            .collect()
            .await
    }

    async fn check_record(
        &self,
        record: &Record,
        scope: ValidationScope,
        mode: SchemaMode,
    ) -> RepositoryResult<()> {
        if self.options.validate_references {
            self.validator.validate(record, scope).await?;
        }
        if let Some(schema) = &self.schema {
            schema.validate(record, mode)?;
        }
        Ok(())
    }
}
