//! Shared fixtures: a `Parent` collection and a `Child` collection whose
//! `parentId` must point at an existing parent.

#![allow(dead_code)]

use doclayer_model::{
    DocumentSchema, DomainEntity, Field, MapperResult, Persistable, PropertyShape, Record,
    Reference, ReferenceDeclarer, RegistryResult, SchemaField,
};
use doclayer_repository::{DocumentRepository, RepositoryOptions};
use doclayer_store::{DocumentStore, MemoryCollection, MemoryDatabase};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, PartialEq)]
pub struct Parent {
    pub id: Option<String>,
    pub name: String,
}

impl Parent {
    pub fn named(name: &str) -> Self {
        Self {
            id: None,
            name: name.into(),
        }
    }

    pub fn with_id(id: &str, name: &str) -> Self {
        Self {
            id: Some(id.into()),
            name: name.into(),
        }
    }
}

impl Persistable for Parent {
    fn persistent_id(&self) -> Option<String> {
        self.id.clone()
    }

    fn fields(&self) -> Vec<(&'static str, Field<'_>)> {
        vec![("name", Field::value(self.name.clone()))]
    }
}

impl DomainEntity for Parent {
    const COLLECTION: &'static str = "parents";

    fn from_record(record: Record) -> MapperResult<Self> {
        Ok(Self {
            id: record.id().map(str::to_owned),
            name: record.get_str("name").unwrap_or_default().to_owned(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Child {
    pub id: Option<String>,
    pub name: Option<String>,
    pub parent_id: Option<String>,
    pub tags: Option<Vec<String>>,
    pub label_ids: Option<Vec<String>>,
    /// Filled in when `parentId` has been populated.
    pub parent: Option<Parent>,
}

impl Child {
    pub fn new(name: &str, parent_id: &str) -> Self {
        Self {
            name: Some(name.into()),
            parent_id: Some(parent_id.into()),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = Some(tags.iter().map(|t| t.to_string()).collect());
        self
    }

    pub fn with_labels(mut self, labels: &[&str]) -> Self {
        self.label_ids = Some(labels.iter().map(|l| l.to_string()).collect());
        self
    }

    /// An update payload that only touches `name`.
    pub fn rename(id: &str, name: &str) -> Self {
        Self {
            id: Some(id.into()),
            name: Some(name.into()),
            ..Self::default()
        }
    }
}

impl Persistable for Child {
    fn persistent_id(&self) -> Option<String> {
        self.id.clone()
    }

    fn fields(&self) -> Vec<(&'static str, Field<'_>)> {
        vec![
            ("name", Field::optional(self.name.clone())),
            ("parentId", Field::optional_id(self.parent_id.as_ref())),
            ("tags", Field::optional(self.tags.clone())),
            (
                "labelIds",
                match &self.label_ids {
                    Some(ids) => Field::ids(ids),
                    None => Field::Undefined,
                },
            ),
        ]
    }
}

impl DomainEntity for Child {
    const COLLECTION: &'static str = "children";

    fn from_record(record: Record) -> MapperResult<Self> {
        let (parent_id, parent) = match record.get("parentId") {
            Some(Value::String(id)) => (Some(id.clone()), None),
            Some(Value::Object(map)) => {
                let parent = Parent::from_record(Record::from(map.clone()))?;
                (parent.id.clone(), Some(parent))
            }
            _ => (None, None),
        };
        Ok(Self {
            id: record.id().map(str::to_owned),
            name: record.get_str("name").map(str::to_owned),
            parent_id,
            tags: record.get("tags").and_then(string_list),
            label_ids: record.get("labelIds").and_then(string_list),
            parent,
        })
    }

    fn declare_references(refs: &mut ReferenceDeclarer<'_>) -> RegistryResult<()> {
        refs.declare("parentId", PropertyShape::Scalar, Reference::to("parents"))?;
        refs.declare(
            "labelIds",
            PropertyShape::IdList,
            Reference::to("labels").optional(),
        )
    }
}

fn string_list(value: &Value) -> Option<Vec<String>> {
    value.as_array().map(|items| {
        items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_owned))
            .collect()
    })
}

pub fn child_schema() -> DocumentSchema {
    DocumentSchema::new(vec![
        SchemaField::text("name"),
        SchemaField::reference("parentId"),
        SchemaField::tags("tags").optional(),
        SchemaField::references("labelIds").optional(),
    ])
}

pub struct Fixture {
    pub db: MemoryDatabase,
    pub parent_store: MemoryCollection,
    pub child_store: MemoryCollection,
    pub parents: Arc<DocumentRepository<Parent>>,
    pub children: DocumentRepository<Child>,
}

impl Fixture {
    /// Resets every collection's call counters.
    pub fn reset_stats(&self) {
        self.parent_store.reset_stats();
        self.child_store.reset_stats();
    }
}

/// Children validated against the parents repository, with the child schema.
pub fn fixture() -> Fixture {
    fixture_with(Some(child_schema()), RepositoryOptions::default())
}

/// Routes repository logs to the test output; `RUST_LOG` picks the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn fixture_with(schema: Option<DocumentSchema>, options: RepositoryOptions) -> Fixture {
    init_tracing();
    let db = MemoryDatabase::new();
    let parent_store = db.collection("parents");
    let child_store = db.collection("children");

    let parents = Arc::new(
        DocumentRepository::<Parent>::new(Arc::new(parent_store.clone())).unwrap(),
    );
    let mut builder = DocumentRepository::<Child>::builder(Arc::new(child_store.clone()))
        .reference_model("parents", parents.clone())
        .options(options);
    if let Some(schema) = schema {
        builder = builder.schema(schema);
    }
    let children = builder.build().unwrap();

    Fixture {
        db,
        parent_store,
        child_store,
        parents,
        children,
    }
}

/// Creates a parent with a fixed id and returns the id.
pub async fn seed_parent(fixture: &Fixture, id: &str, name: &str) -> String {
    fixture
        .parents
        .create_one(Parent::with_id(id, name))
        .await
        .unwrap()
        .id()
        .to_owned()
}

/// Seeds a `labels` collection and returns a children repository that
/// validates `labelIds` against it.
pub async fn labelled_children(fixture: &Fixture, ids: &[&str]) -> DocumentRepository<Child> {
    let labels = fixture.db.collection("labels");
    let records = ids
        .iter()
        .map(|id| {
            Record::from_iter([
                ("_id".to_owned(), json!(id)),
                ("name".to_owned(), json!(format!("label {id}"))),
            ])
        })
        .collect();
    labels.insert_many(records).await.unwrap();

    DocumentRepository::<Child>::builder(Arc::new(fixture.child_store.clone()))
        .schema(child_schema())
        .reference_model("parents", fixture.parents.clone())
        .reference_store(Arc::new(labels))
        .build()
        .unwrap()
}
