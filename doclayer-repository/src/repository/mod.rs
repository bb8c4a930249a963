//! The generic document repository.
//!
//! A [`DocumentRepository`] binds one [`DomainEntity`] type to one store
//! collection. It holds only configuration fixed at construction (store
//! client, schema, reference probes, options), so a single instance can be
//! shared across tasks.

mod bound;
mod write;

pub use write::EntityBatch;

use crate::error::{RepositoryError, RepositoryResult};
use crate::handle::{Document, bind_hydrated};
use crate::options::RepositoryOptions;
use crate::validator::{ReferenceProbe, ReferenceValidator, StoreProbe};
use async_trait::async_trait;
use doclayer_model::{
    DocumentSchema, DomainEntity, PARENT_ID_FIELD, ReferenceDeclaration, ReferenceRegistry,
    TAGS_FIELD,
};
use doclayer_store::{
    DocumentStore, Filter, PopulatePath, Projection, Query, SortKey, SortOrder, StoreError,
};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, warn};

/// Input of the overloaded write operations.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteInput<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> WriteInput<T> {
    pub fn len(&self) -> usize {
        match self {
            Self::One(_) => 1,
            Self::Many(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> From<Vec<T>> for WriteInput<T> {
    fn from(items: Vec<T>) -> Self {
        Self::Many(items)
    }
}

/// Output of the overloaded write operations: a bare result for singular
/// input, a bulk response for a list.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome<S, B> {
    Single(S),
    Batch(B),
}

impl<S, B> WriteOutcome<S, B> {
    pub fn into_single(self) -> Option<S> {
        match self {
            Self::Single(single) => Some(single),
            Self::Batch(_) => None,
        }
    }

    pub fn into_batch(self) -> Option<B> {
        match self {
            Self::Single(_) => None,
            Self::Batch(batch) => Some(batch),
        }
    }

    pub fn is_batch(&self) -> bool {
        matches!(self, Self::Batch(_))
    }
}

/// Sort, window and populate options of [`DocumentRepository::find`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub sort: Vec<SortKey>,
    pub skip: Option<usize>,
    pub limit: Option<usize>,
    /// Relation paths to hydrate, resolved against the entity's reference
    /// declarations.
    pub populate: Vec<String>,
}

impl FindOptions {
    pub fn sort(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort.push(SortKey {
            field: field.into(),
            order,
        });
        self
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn populate(mut self, path: impl Into<String>) -> Self {
        self.populate.push(path.into());
        self
    }

    fn apply(self, mut query: Query) -> Query {
        query.sort = self.sort;
        query.skip = self.skip;
        query.limit = self.limit;
        query.populate = self.populate.into_iter().map(PopulatePath::new).collect();
        query
    }
}

/// Builder for [`DocumentRepository`].
pub struct RepositoryBuilder<T> {
    store: Arc<dyn DocumentStore>,
    schema: Option<DocumentSchema>,
    probes: HashMap<String, Arc<dyn ReferenceProbe>>,
    options: RepositoryOptions,
    _entity: PhantomData<fn() -> T>,
}

impl<T: DomainEntity> RepositoryBuilder<T> {
    pub fn schema(mut self, schema: DocumentSchema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Wires the probe used to validate references into `collection`.
    pub fn reference_model(
        mut self,
        collection: impl Into<String>,
        probe: Arc<dyn ReferenceProbe>,
    ) -> Self {
        self.probes.insert(collection.into(), probe);
        self
    }

    /// Validates references into the store's collection directly.
    pub fn reference_store(self, store: Arc<dyn DocumentStore>) -> Self {
        let collection = store.collection().to_owned();
        self.reference_model(collection, Arc::new(StoreProbe(store)))
    }

    pub fn options(mut self, options: RepositoryOptions) -> Self {
        self.options = options;
        self
    }

    /// Builds against the process-wide reference registry.
    pub fn build(self) -> RepositoryResult<DocumentRepository<T>> {
        self.build_with_registry(ReferenceRegistry::global())
    }

    pub fn build_with_registry(
        self,
        registry: &ReferenceRegistry,
    ) -> RepositoryResult<DocumentRepository<T>> {
        registry.register::<T>()?;
        let declarations = registry.references::<T>();
        if self.store.collection() != T::COLLECTION {
            warn!(
                "Repository for {} is bound to collection {}",
                T::COLLECTION,
                self.store.collection()
            );
        }
        let schema = match self.schema {
            Some(schema) if self.options.strict_schema => Some(schema.strict(true)),
            other => other,
        };
        debug!(
            "Built repository for {} ({} references, schema: {})",
            self.store.collection(),
            declarations.len(),
            schema.is_some()
        );
        Ok(DocumentRepository {
            store: self.store,
            schema,
            validator: ReferenceValidator::new(declarations, self.probes),
            options: self.options,
            _entity: PhantomData,
        })
    }
}

/// Typed repository over one collection.
pub struct DocumentRepository<T> {
    store: Arc<dyn DocumentStore>,
    schema: Option<DocumentSchema>,
    validator: ReferenceValidator,
    options: RepositoryOptions,
    _entity: PhantomData<fn() -> T>,
}

impl<T: DomainEntity> DocumentRepository<T> {
    pub fn builder(store: Arc<dyn DocumentStore>) -> RepositoryBuilder<T> {
        RepositoryBuilder {
            store,
            schema: None,
            probes: HashMap::new(),
            options: RepositoryOptions::default(),
            _entity: PhantomData,
        }
    }

    /// A repository without schema or reference probes.
    pub fn new(store: Arc<dyn DocumentStore>) -> RepositoryResult<Self> {
        Self::builder(store).build()
    }

    pub fn collection(&self) -> &str {
        self.store.collection()
    }

    pub fn schema(&self) -> Option<&DocumentSchema> {
        self.schema.as_ref()
    }

    pub fn options(&self) -> &RepositoryOptions {
        &self.options
    }

    pub fn references(&self) -> &[ReferenceDeclaration] {
        self.validator.declarations()
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub async fn find(
        &self,
        filter: Filter,
        projection: Option<Projection>,
        options: FindOptions,
    ) -> RepositoryResult<Vec<Document<T>>> {
        let mut query = options.apply(self.create_query(filter));
        query.projection = projection;
        self.execute_query(query).await
    }

    /// First match, or `None`.
    pub async fn find_one(&self, filter: Filter) -> RepositoryResult<Option<Document<T>>> {
        let found = self
            .find(filter, None, FindOptions::default().limit(1))
            .await?;
        Ok(found.into_iter().next())
    }

    pub async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Document<T>>> {
        self.find_one(Filter::by_id(id)).await
    }

    /// Fails with `SchemaFieldMissing` before querying when the schema has
    /// no `parentId` field.
    pub async fn find_by_parent_id(&self, parent_id: &str) -> RepositoryResult<Vec<Document<T>>> {
        self.require_schema_field(PARENT_ID_FIELD)?;
        self.find(
            Filter::eq(PARENT_ID_FIELD, parent_id),
            None,
            FindOptions::default(),
        )
        .await
    }

    /// Entities sharing at least one tag with `tags`. Requires a `tags`
    /// schema field.
    pub async fn find_by_tags<I, S>(&self, tags: I) -> RepositoryResult<Vec<Document<T>>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.require_schema_field(TAGS_FIELD)?;
        let tags: Vec<String> = tags.into_iter().map(Into::into).collect();
        self.find(Filter::any_of(TAGS_FIELD, tags), None, FindOptions::default())
            .await
    }

    pub async fn exists(&self, filter: &Filter) -> RepositoryResult<bool> {
        Ok(self.store.exists(filter).await?)
    }

    pub async fn count(&self, filter: Filter) -> RepositoryResult<usize> {
        let query = self
            .create_query(filter)
            .projection(Projection::default());
        Ok(self.store.find(&query).await?.len())
    }

    /// Raw query over this collection, for [`execute_query`](Self::execute_query).
    pub fn create_query(&self, filter: Filter) -> Query {
        Query::new(filter)
    }

    /// Runs a raw query and binds every result.
    pub async fn execute_query(&self, mut query: Query) -> RepositoryResult<Vec<Document<T>>> {
        query.populate = query
            .populate
            .into_iter()
            .map(|path| self.resolve_populate(path))
            .collect::<RepositoryResult<_>>()?;
        let records = self.store.find(&query).await?;
        debug!("Query on {} returned {} records", self.collection(), records.len());
        records
            .into_iter()
            .map(|record| bind_hydrated(self.collection(), record, &query.populate))
            .collect()
    }

    fn require_schema_field(&self, field: &str) -> RepositoryResult<()> {
        match &self.schema {
            Some(schema) if schema.has_field(field) => Ok(()),
            _ => Err(RepositoryError::SchemaFieldMissing {
                collection: self.collection().to_owned(),
                field: field.to_owned(),
            }),
        }
    }

    /// Fills in a populate path's target from the reference declarations.
    fn resolve_populate(&self, path: PopulatePath) -> RepositoryResult<PopulatePath> {
        if path.target.is_some() {
            return Ok(path);
        }
        match self.validator.declaration_for(&path.path) {
            Some(declaration) => Ok(PopulatePath::to(
                path.path,
                declaration.target_collection.clone(),
                declaration.foreign_field.clone(),
            )),
            None => Err(StoreError::UnknownRelation(path.path).into()),
        }
    }
}

#[async_trait]
impl<T: DomainEntity> ReferenceProbe for DocumentRepository<T> {
    async fn exists(&self, filter: &Filter) -> RepositoryResult<bool> {
        DocumentRepository::exists(self, filter).await
    }
}
