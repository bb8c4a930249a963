use doclayer_model::Record;
use doclayer_store::{
    DocumentStore, Filter, MemoryDatabase, PopulatePath, Projection, Query, SortOrder,
    StoreError, WriteOp,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn record(value: serde_json::Value) -> Record {
    Record::try_from(value).unwrap()
}

async fn seeded() -> (MemoryDatabase, doclayer_store::MemoryCollection) {
    let db = MemoryDatabase::new();
    let notes = db.collection("notes");
    notes
        .insert_many(vec![
            record(json!({"_id": "n1", "title": "b", "rank": 2, "tags": ["x", "y"]})),
            record(json!({"_id": "n2", "title": "a", "rank": 3, "tags": ["y"]})),
            record(json!({"_id": "n3", "title": "c", "rank": 1, "tags": []})),
        ])
        .await
        .unwrap();
    notes.reset_stats();
    (db, notes)
}

// ── insert_many ──────────────────────────────────────────────────

#[tokio::test]
async fn insert_assigns_missing_ids_in_order() {
    let db = MemoryDatabase::new();
    let notes = db.collection("notes");
    let stored = notes
        .insert_many(vec![
            record(json!({"title": "first"})),
            record(json!({"_id": "given", "title": "second"})),
        ])
        .await
        .unwrap();

    assert_eq!(stored.len(), 2);
    assert!(stored[0].id().is_some_and(|id| !id.is_empty()));
    assert_eq!(stored[0].get_str("title"), Some("first"));
    assert_eq!(stored[1].id(), Some("given"));
    assert_eq!(notes.len(), 2);
}

#[tokio::test]
async fn insert_with_duplicate_id_stores_nothing() {
    let (_db, notes) = seeded().await;
    let err = notes
        .insert_many(vec![
            record(json!({"_id": "n9", "title": "ok"})),
            record(json!({"_id": "n1", "title": "dup"})),
        ])
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::DuplicateKey { ref field, .. } if field == "_id"));
    assert_eq!(notes.len(), 3);
}

#[tokio::test]
async fn insert_respects_unique_index_within_batch() {
    let db = MemoryDatabase::new();
    let users = db.collection("users");
    users.create_unique_index("email");
    let err = users
        .insert_many(vec![
            record(json!({"email": "a@x"})),
            record(json!({"email": "a@x"})),
        ])
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::DuplicateKey { ref field, .. } if field == "email"));
    assert!(users.is_empty());
}

// ── find ─────────────────────────────────────────────────────────

#[tokio::test]
async fn find_filters_sorts_and_windows() {
    let (_db, notes) = seeded().await;
    let query = Query::new(Filter::all())
        .sort("rank", SortOrder::Descending)
        .skip(1)
        .limit(1);
    let found = notes.find(&query).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id(), Some("n1"));
    assert_eq!(notes.stats().find, 1);
}

#[tokio::test]
async fn find_matches_array_fields_by_element() {
    let (_db, notes) = seeded().await;
    let found = notes
        .find(&Query::new(Filter::eq("tags", "y")).sort("title", SortOrder::Ascending))
        .await
        .unwrap();
    let ids: Vec<_> = found.iter().filter_map(|r| r.id()).collect();
    assert_eq!(ids, vec!["n2", "n1"]);
}

#[tokio::test]
async fn find_any_of_intersects_arrays() {
    let (_db, notes) = seeded().await;
    let found = notes
        .find(&Query::new(Filter::any_of("tags", ["x", "z"])))
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id(), Some("n1"));
}

#[tokio::test]
async fn find_applies_projection_keeping_id() {
    let (_db, notes) = seeded().await;
    let found = notes
        .find(&Query::new(Filter::by_id("n2")).projection(Projection::include(["title"])))
        .await
        .unwrap();
    assert_eq!(found[0].clone().into_value(), json!({"_id": "n2", "title": "a"}));
}

#[tokio::test]
async fn find_empty_result_is_ok() {
    let (_db, notes) = seeded().await;
    let found = notes.find(&Query::new(Filter::by_id("nope"))).await.unwrap();
    assert!(found.is_empty());
}

#[tokio::test]
async fn find_by_ids_and_exists() {
    let (_db, notes) = seeded().await;
    let found = notes
        .find(&Query::new(Filter::by_ids(["n3", "n1", "zz"])))
        .await
        .unwrap();
    assert_eq!(found.len(), 2);
    assert!(notes.exists(&Filter::eq("title", "c")).await.unwrap());
    assert!(!notes.exists(&Filter::eq("title", "zzz")).await.unwrap());
    assert!(notes.find_by_id("n2").await.unwrap().is_some());
    assert!(notes.find_by_id("zz").await.unwrap().is_none());
}

// ── bulk_write ───────────────────────────────────────────────────

#[tokio::test]
async fn bulk_update_sets_fields_and_counts() {
    let (_db, notes) = seeded().await;
    let outcome = notes
        .bulk_write(vec![
            WriteOp::UpdateOne {
                id: "n1".into(),
                set: record(json!({"title": "B"})),
            },
            WriteOp::UpdateOne {
                id: "missing".into(),
                set: record(json!({"title": "?"})),
            },
            WriteOp::UpdateOne {
                id: "n2".into(),
                set: record(json!({"title": "a"})),
            },
        ])
        .await
        .unwrap();

    assert_eq!(outcome.matched, 2);
    assert_eq!(outcome.modified, 1);
    assert!(outcome.write_errors.is_empty());
    let n1 = notes.find_by_id("n1").await.unwrap().unwrap();
    assert_eq!(n1.get_str("title"), Some("B"));
    assert_eq!(n1.get_number("rank"), Some(2.0));
}

#[tokio::test]
async fn bulk_write_reports_errors_by_index() {
    let db = MemoryDatabase::new();
    let users = db.collection("users");
    users.create_unique_index("email");
    users
        .insert_many(vec![
            record(json!({"_id": "u1", "email": "a@x"})),
            record(json!({"_id": "u2", "email": "b@x"})),
        ])
        .await
        .unwrap();

    let outcome = users
        .bulk_write(vec![
            WriteOp::UpdateOne {
                id: "u1".into(),
                set: record(json!({"name": "A"})),
            },
            WriteOp::UpdateOne {
                id: "u2".into(),
                set: record(json!({"email": "a@x"})),
            },
        ])
        .await
        .unwrap();

    assert_eq!(outcome.write_errors.len(), 1);
    assert_eq!(outcome.write_errors[0].index, 1);
    assert!(outcome.error_for(1).is_some());
    assert!(outcome.error_for(0).is_none());
    let u2 = users.find_by_id("u2").await.unwrap().unwrap();
    assert_eq!(u2.get_str("email"), Some("b@x"));
}

#[tokio::test]
async fn replace_drops_unset_fields() {
    let (_db, notes) = seeded().await;
    notes
        .bulk_write(vec![WriteOp::ReplaceOne {
            id: "n3".into(),
            record: record(json!({"title": "only"})),
        }])
        .await
        .unwrap();
    let n3 = notes.find_by_id("n3").await.unwrap().unwrap();
    assert_eq!(n3.into_value(), json!({"_id": "n3", "title": "only"}));
}

// ── delete_many ──────────────────────────────────────────────────

#[tokio::test]
async fn delete_many_returns_count() {
    let (_db, notes) = seeded().await;
    let deleted = notes
        .delete_many(&Filter::by_ids(["n1", "n3", "ghost"]))
        .await
        .unwrap();
    assert_eq!(deleted, 2);
    assert_eq!(notes.len(), 1);
    assert_eq!(notes.stats().delete_many, 1);
}

// ── populate ─────────────────────────────────────────────────────

#[tokio::test]
async fn populate_hydrates_scalar_and_array_paths() {
    let (db, _notes) = seeded().await;
    let folders = db.collection("folders");
    folders
        .insert_many(vec![record(json!({"_id": "f1", "name": "Inbox"}))])
        .await
        .unwrap();

    let item = record(json!({"_id": "i1", "folderId": "f1", "noteIds": ["n2", "gone", "n1"]}));
    let populated = folders
        .populate(
            item,
            &[
                PopulatePath::to("folderId", "folders", "_id"),
                PopulatePath::to("noteIds", "notes", "_id"),
            ],
        )
        .await
        .unwrap();

    assert_eq!(populated.pointer("/folderId/name"), Some(&json!("Inbox")));
    let notes = populated.get("noteIds").and_then(|v| v.as_array()).unwrap();
    assert_eq!(notes.len(), 2);
    assert_eq!(notes[0]["_id"], "n2");
}

#[tokio::test]
async fn populate_without_target_fails() {
    let (_db, notes) = seeded().await;
    let err = notes
        .populate(record(json!({"x": "1"})), &[PopulatePath::new("x")])
        .await
        .unwrap_err();
    assert_eq!(err, StoreError::UnknownRelation("x".into()));
}

#[tokio::test]
async fn find_populates_requested_paths() {
    let db = MemoryDatabase::new();
    let parents = db.collection("parents");
    let children = db.collection("children");
    parents
        .insert_many(vec![record(json!({"_id": "p1", "name": "P"}))])
        .await
        .unwrap();
    children
        .insert_many(vec![record(json!({"_id": "c1", "parentId": "p1"}))])
        .await
        .unwrap();

    let found = children
        .find(&Query::new(Filter::all()).populate(PopulatePath::to("parentId", "parents", "_id")))
        .await
        .unwrap();
    assert_eq!(found[0].pointer("/parentId/name"), Some(&json!("P")));
}

// ── Availability & stats ─────────────────────────────────────────

#[tokio::test]
async fn offline_collection_fails_every_call() {
    let (_db, notes) = seeded().await;
    notes.set_available(false);
    assert!(matches!(
        notes.find(&Query::default()).await,
        Err(StoreError::Unavailable(_))
    ));
    assert!(notes.insert_many(vec![Record::new()]).await.is_err());
    notes.set_available(true);
    assert_eq!(notes.find(&Query::default()).await.unwrap().len(), 3);
}

#[tokio::test]
async fn stats_track_each_round_trip() {
    let (_db, notes) = seeded().await;
    assert_eq!(notes.stats().total(), 0);
    notes.exists(&Filter::all()).await.unwrap();
    notes.find_by_id("n1").await.unwrap();
    let stats = notes.stats();
    assert_eq!(stats.exists, 1);
    assert_eq!(stats.find_by_id, 1);
    assert_eq!(stats.writes(), 0);
}

#[tokio::test]
async fn clients_of_same_collection_share_data() {
    let db = MemoryDatabase::new();
    let a = db.collection("shared");
    let b = db.collection("shared");
    a.insert_many(vec![record(json!({"_id": "s1"}))]).await.unwrap();
    assert_eq!(b.len(), 1);
    assert_eq!(b.collection(), "shared");
}
