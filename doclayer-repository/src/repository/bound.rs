//! Operations on documents that carry a live handle.

use super::DocumentRepository;
use crate::error::{RepositoryError, RepositoryResult};
use crate::handle::{Document, attached_handle};
use doclayer_model::{DomainEntity, ID_FIELD, SchemaMode, to_domain, to_persistence};
use doclayer_store::{Filter, PopulatePath, WriteOp};
use tracing::debug;

impl<T: DomainEntity> DocumentRepository<T> {
    /// Writes the keys the entity maps onto its stored record.
    ///
    /// Keys the entity leaves undefined, or that a projected read never
    /// loaded, stay as stored. Hydrated reference paths the entity did not
    /// change are written back as their ids.
    pub async fn save(&self, document: &Document<T>) -> RepositoryResult<()> {
        let handle = attached_handle(document, self.collection())?;
        let id = handle.id().to_owned();

        let mut payload = to_persistence(document.entity());
        payload.remove(ID_FIELD);
        handle.dehydrate_payload(&mut payload);
        if let Some(schema) = &self.schema {
            schema.validate(&payload, SchemaMode::Update)?;
        }

        let outcome = self
            .store
            .bulk_write(vec![WriteOp::UpdateOne {
                id: id.clone(),
                set: payload.clone(),
            }])
            .await?;
        if let Some(write_error) = outcome.error_for(0) {
            return Err(RepositoryError::StoreWrite {
                index: 0,
                message: write_error.message.clone(),
            });
        }
        if outcome.matched == 0 {
            return Err(RepositoryError::NotFoundAfterWrite { id });
        }

        handle.record_saved(&payload);
        debug!("Saved {} in {} ({} keys)", id, self.collection(), payload.len());
        Ok(())
    }

    /// Hydrates one relation path of the document in place.
    ///
    /// The path must be a declared reference property.
    pub async fn populate(&self, document: &mut Document<T>, path: &str) -> RepositoryResult<()> {
        let handle = attached_handle(document, self.collection())?.clone();
        let target = self.resolve_populate(PopulatePath::new(path))?;

        let base = handle.record_with_ids_at(path);
        let stored = base.get(path).cloned();
        let hydrated = self.store.populate(base, &[target]).await?;
        let entity = to_domain::<T>(&hydrated)?;
        let mapped = to_persistence(&entity).get(path).cloned();
        handle.replace_record(hydrated);
        handle.mark_hydrated(path, stored, mapped);
        document.set_entity(entity);
        Ok(())
    }

    /// Deletes the document's record and detaches every clone of its handle.
    ///
    /// Returns whether a record was actually deleted.
    pub async fn remove(&self, document: &Document<T>) -> RepositoryResult<bool> {
        let handle = attached_handle(document, self.collection())?;
        let deleted = self.store.delete_many(&Filter::by_id(handle.id())).await?;
        handle.detach();
        debug!("Removed {} from {} ({} deleted)", handle.id(), self.collection(), deleted);
        Ok(deleted > 0)
    }
}
