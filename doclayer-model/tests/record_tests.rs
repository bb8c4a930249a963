use doclayer_model::{MapperError, PlainRecord, Record};
use serde_json::json;

fn make_record(data: serde_json::Value) -> Record {
    Record::try_from(data).unwrap()
}

// ── Accessors ────────────────────────────────────────────────────

#[test]
fn typed_accessors() {
    let r = make_record(json!({"_id": "r1", "title": "Hi", "done": true, "count": 4}));
    assert_eq!(r.id(), Some("r1"));
    assert_eq!(r.get_str("title"), Some("Hi"));
    assert_eq!(r.get_bool("done"), Some(true));
    assert_eq!(r.get_number("count"), Some(4.0));
    assert_eq!(r.get_str("count"), None);
    assert_eq!(r.get_str("missing"), None);
}

#[test]
fn numeric_id_is_not_a_string_id() {
    let r = make_record(json!({"_id": 5}));
    assert_eq!(r.id(), None);
}

#[test]
fn pointer_reaches_nested_values() {
    let r = make_record(json!({"meta": {"author": {"name": "Alice"}}, "tags": ["a", "b"]}));
    assert_eq!(r.pointer("/meta/author/name"), Some(&json!("Alice")));
    assert_eq!(r.pointer("/tags/1"), Some(&json!("b")));
    assert_eq!(r.pointer("/meta"), Some(&json!({"author": {"name": "Alice"}})));
    assert_eq!(r.pointer("/meta/missing"), None);
    assert_eq!(r.pointer(""), None);
}

#[test]
fn pointer_unescapes_segments() {
    let r = make_record(json!({"a/b": {"c~d": 1}, "x": 2}));
    assert_eq!(r.pointer("/a~1b"), Some(&json!({"c~d": 1})));
    assert_eq!(r.pointer("/a~1b/c~0d"), Some(&json!(1)));
    assert_eq!(r.pointer("x"), None);
}

#[test]
fn merge_from_overwrites_and_keeps() {
    let mut base = make_record(json!({"a": 1, "b": 2}));
    base.merge_from(&make_record(json!({"b": 3, "c": 4})));
    assert_eq!(base.into_value(), json!({"a": 1, "b": 3, "c": 4}));
}

#[test]
fn insert_and_remove() {
    let mut r = Record::new();
    assert!(r.is_empty());
    r.insert("k", json!("v"));
    assert!(r.contains_key("k"));
    assert_eq!(r.len(), 1);
    assert_eq!(r.remove("k"), Some(json!("v")));
    assert!(r.is_empty());
}

// ── Conversions ──────────────────────────────────────────────────

#[test]
fn try_from_rejects_non_objects() {
    assert_eq!(
        Record::try_from(json!(3)).unwrap_err(),
        MapperError::NotAnObject("number")
    );
    assert_eq!(
        Record::try_from(json!(null)).unwrap_err(),
        MapperError::NotAnObject("null")
    );
}

#[test]
fn record_serializes_as_plain_object() {
    let r = make_record(json!({"_id": "x", "n": 1}));
    assert_eq!(serde_json::to_value(&r).unwrap(), json!({"_id": "x", "n": 1}));
}

#[test]
fn plain_views_are_identical() {
    let value = json!({"_id": "x", "n": 1});
    let record = make_record(value.clone());
    let map = record.as_map().clone();
    assert_eq!(value.to_plain().unwrap(), record.to_plain().unwrap());
    assert_eq!(map.to_plain().unwrap(), record);
}

#[test]
fn decode_into_struct() {
    #[derive(serde::Deserialize)]
    struct Row {
        n: i64,
    }
    let r = make_record(json!({"n": 9}));
    let row: Row = r.decode().unwrap();
    assert_eq!(row.n, 9);
    assert!(matches!(r.decode::<Vec<i64>>(), Err(MapperError::Decode(_))));
}
