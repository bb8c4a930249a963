//! Tests for the reference validator.

use async_trait::async_trait;
use doclayer_model::{Record, ReferenceDeclaration};
use doclayer_repository::{
    ReferenceProbe, ReferenceValidator, RepositoryError, RepositoryResult, ValidationScope,
};
use doclayer_store::{Condition, Filter, StoreError};
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Knows a fixed set of values and counts how often it is asked.
#[derive(Default)]
struct KnownValues {
    values: HashSet<String>,
    calls: AtomicUsize,
    offline: bool,
}

impl KnownValues {
    fn with(values: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            values: values.iter().map(|v| v.to_string()).collect(),
            ..Self::default()
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReferenceProbe for KnownValues {
    async fn exists(&self, filter: &Filter) -> RepositoryResult<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline {
            return Err(StoreError::Unavailable("probe offline".into()).into());
        }
        Ok(filter.clauses().iter().all(|clause| match &clause.condition {
            Condition::Eq(Value::String(v)) => self.values.contains(v),
            _ => false,
        }))
    }
}

fn declaration(property: &str, collection: &str, required: bool) -> ReferenceDeclaration {
    ReferenceDeclaration {
        property_key: property.into(),
        target_collection: collection.into(),
        required,
        foreign_field: "_id".into(),
        name: doclayer_model::singular_of(collection),
    }
}

fn record(value: Value) -> Record {
    Record::try_from(value).unwrap()
}

fn validator(
    declarations: Vec<ReferenceDeclaration>,
    probes: &[(&str, Arc<KnownValues>)],
) -> ReferenceValidator {
    let probes: HashMap<String, Arc<dyn ReferenceProbe>> = probes
        .iter()
        .map(|(name, probe)| (name.to_string(), probe.clone() as Arc<dyn ReferenceProbe>))
        .collect();
    ReferenceValidator::new(declarations, probes)
}

// ── Required / optional ──────────────────────────────────────────

#[tokio::test]
async fn null_required_reference_is_missing() {
    let folders = KnownValues::with(&["f1"]);
    let v = validator(vec![declaration("folderId", "folders", true)], &[("folders", folders.clone())]);

    let err = v
        .validate(&record(json!({"folderId": null})), ValidationScope::All)
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::MissingRequiredReference { .. }));
    assert_eq!(folders.calls(), 0);
}

#[tokio::test]
async fn absent_optional_reference_is_skipped() {
    let v = validator(vec![declaration("folderId", "folders", false)], &[]);
    v.validate(&record(json!({})), ValidationScope::All).await.unwrap();
}

#[tokio::test]
async fn present_only_scope_skips_absent_properties() {
    let v = validator(vec![declaration("folderId", "folders", true)], &[]);
    v.validate(&record(json!({"name": "x"})), ValidationScope::PresentOnly)
        .await
        .unwrap();

    let err = v
        .validate(&record(json!({"folderId": null})), ValidationScope::PresentOnly)
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::MissingRequiredReference { .. }));
}

// ── Probing ──────────────────────────────────────────────────────

#[tokio::test]
async fn first_failing_declaration_wins() {
    let folders = KnownValues::with(&[]);
    let owners = KnownValues::with(&[]);
    let v = validator(
        vec![
            declaration("folderId", "folders", true),
            declaration("ownerId", "owners", true),
        ],
        &[("folders", folders.clone()), ("owners", owners.clone())],
    );

    let err = v
        .validate(&record(json!({"folderId": "f9", "ownerId": "o9"})), ValidationScope::All)
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::DanglingReference { ref property, .. } if property == "folderId"));
    assert_eq!(folders.calls(), 1);
    assert_eq!(owners.calls(), 0);
}

#[tokio::test]
async fn existing_reference_passes() {
    let folders = KnownValues::with(&["f1"]);
    let v = validator(vec![declaration("folderId", "folders", true)], &[("folders", folders.clone())]);
    v.validate(&record(json!({"folderId": "f1"})), ValidationScope::All)
        .await
        .unwrap();
    assert_eq!(folders.calls(), 1);
}

#[tokio::test]
async fn dangling_reference_names_the_target() {
    let v = validator(
        vec![declaration("categoryId", "categories", true)],
        &[("categories", KnownValues::with(&[]))],
    );
    let err = v
        .validate(&record(json!({"categoryId": "c1"})), ValidationScope::All)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        RepositoryError::DanglingReference {
            name: "category".into(),
            collection: "categories".into(),
            foreign_field: "_id".into(),
            property: "categoryId".into(),
            value: "c1".into(),
        }
    );
}

#[tokio::test]
async fn every_array_element_is_probed() {
    let tags = KnownValues::with(&["a", "b"]);
    let v = validator(vec![declaration("tagIds", "tags", true)], &[("tags", tags.clone())]);

    v.validate(&record(json!({"tagIds": ["a", "b"]})), ValidationScope::All)
        .await
        .unwrap();
    assert_eq!(tags.calls(), 2);

    let err = v
        .validate(&record(json!({"tagIds": ["a", "z", "b"]})), ValidationScope::All)
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::DanglingReference { ref value, .. } if value == "z"));
}

#[tokio::test]
async fn probe_errors_propagate() {
    let offline = Arc::new(KnownValues {
        offline: true,
        ..KnownValues::default()
    });
    let v = validator(vec![declaration("folderId", "folders", true)], &[("folders", offline)]);
    let err = v
        .validate(&record(json!({"folderId": "f1"})), ValidationScope::All)
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::Store(StoreError::Unavailable(_))));
}
