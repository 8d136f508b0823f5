use docimport_schema::{FieldType, RawDocument, RawValue, Schema};
use docimport_store::{CallContext, CollectionStore, DirStore, ErrorKind, StoreLimits};
use tempfile::TempDir;

fn raw(json: &str) -> RawDocument {
    RawValue::from_string(json.to_string()).unwrap()
}

const EVENTS: &str = r#"{
    "title": "events",
    "properties": {
        "seq": {"type": "integer", "autoGenerate": true},
        "kind": {"type": "string"},
        "at": {"type": "string", "format": "date-time"}
    },
    "primary_key": ["seq"]
}"#;

#[test]
fn test_collections_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let ctx = CallContext::background();

    {
        let mut store = DirStore::open(dir.path(), StoreLimits::default()).unwrap();
        store.create_or_update_collection(&ctx, "events", EVENTS).unwrap();
        store
            .insert(
                &ctx,
                "events",
                &[raw(r#"{"kind":"start","at":"2022-03-04T05:06:07Z"}"#), raw(r#"{"kind":"stop"}"#)],
            )
            .unwrap();
    }

    assert!(dir.path().join("events").join("schema.json").is_file());
    assert!(dir.path().join("events").join("documents.jsonl").is_file());

    let mut store = DirStore::open(dir.path(), StoreLimits::default()).unwrap();
    let documents = store.catalog().documents("events").unwrap();
    assert_eq!(documents.len(), 2);
    assert_eq!(documents[1]["seq"].as_i64(), Some(2));

    // the generator continues after the restored maximum
    store.insert(&ctx, "events", &[raw(r#"{"kind":"again"}"#)]).unwrap();
    assert_eq!(store.catalog().documents("events").unwrap()[2]["seq"].as_i64(), Some(3));

    let schema = Schema::from_json(&store.describe_collection(&ctx, "events").unwrap()).unwrap();
    assert_eq!(schema.primary_key, Some(vec!["seq".to_string()]));
}

#[test]
fn test_rejected_insert_is_not_persisted() {
    let dir = TempDir::new().unwrap();
    let ctx = CallContext::background();

    {
        let mut store = DirStore::open(dir.path(), StoreLimits::default()).unwrap();
        store.create_or_update_collection(&ctx, "events", EVENTS).unwrap();
        let err = store
            .insert(&ctx, "events", &[raw(r#"{"kind":"ok"}"#), raw(r#"{"kind":7}"#)])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    let store = DirStore::open(dir.path(), StoreLimits::default()).unwrap();
    assert_eq!(store.catalog().documents("events").unwrap().len(), 0);
}

#[test]
fn test_schema_update_is_persisted() {
    let dir = TempDir::new().unwrap();
    let ctx = CallContext::background();

    {
        let mut store = DirStore::open(dir.path(), StoreLimits::default()).unwrap();
        store
            .create_or_update_collection(&ctx, "metrics", r#"{"properties":{"value":{"type":"integer"}}}"#)
            .unwrap();
        store
            .create_or_update_collection(&ctx, "metrics", r#"{"properties":{"value":{"type":"number"}}}"#)
            .unwrap();
    }

    let store = DirStore::open(dir.path(), StoreLimits::default()).unwrap();
    let schema = store.catalog().schema("metrics").unwrap();
    assert_eq!(schema.name, "metrics");
    assert_eq!(schema.fields["value"].field_type, FieldType::Number);
}

#[test]
fn test_missing_collection_is_not_found() {
    let dir = TempDir::new().unwrap();
    let ctx = CallContext::background();
    let mut store = DirStore::open(dir.path().join("nested").join("root"), StoreLimits::default()).unwrap();

    assert_eq!(store.describe_collection(&ctx, "nope").unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(store.insert(&ctx, "nope", &[raw("{}")]).unwrap_err().kind(), ErrorKind::NotFound);
}

#[test]
fn test_failed_append_leaves_catalog_unchanged() {
    let dir = TempDir::new().unwrap();
    let ctx = CallContext::background();
    let documents_path = dir.path().join("users").join("documents.jsonl");

    {
        let mut store = DirStore::open(dir.path(), StoreLimits::default()).unwrap();
        store
            .create_or_update_collection(
                &ctx,
                "users",
                r#"{"properties":{"id":{"type":"integer"}},"primary_key":["id"]}"#,
            )
            .unwrap();

        // a directory in place of the documents file makes the append fail
        std::fs::create_dir_all(&documents_path).unwrap();
        let err = store.insert(&ctx, "users", &[raw(r#"{"id":1}"#)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(store.catalog().documents("users").unwrap().len(), 0);
        assert_eq!(store.catalog().stats().inserts, 0);

        std::fs::remove_dir(&documents_path).unwrap();
        store.insert(&ctx, "users", &[raw(r#"{"id":1}"#)]).unwrap();
        assert_eq!(store.catalog().documents("users").unwrap().len(), 1);
    }

    let store = DirStore::open(dir.path(), StoreLimits::default()).unwrap();
    assert_eq!(store.catalog().documents("users").unwrap().len(), 1);
}

#[test]
fn test_failed_schema_write_leaves_catalog_unchanged() {
    let dir = TempDir::new().unwrap();
    let ctx = CallContext::background();
    let mut store = DirStore::open(dir.path(), StoreLimits::default()).unwrap();

    store
        .create_or_update_collection(&ctx, "metrics", r#"{"properties":{"value":{"type":"integer"}}}"#)
        .unwrap();
    std::fs::create_dir_all(dir.path().join("metrics").join("schema.json.tmp")).unwrap();

    let err = store
        .create_or_update_collection(&ctx, "metrics", r#"{"properties":{"value":{"type":"number"}}}"#)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
    assert_eq!(
        store.catalog().schema("metrics").unwrap().fields["value"].field_type,
        FieldType::Integer
    );

    std::fs::create_dir_all(dir.path().join("fresh").join("schema.json.tmp")).unwrap();
    let err = store
        .create_or_update_collection(&ctx, "fresh", r#"{"properties":{"a":{"type":"string"}}}"#)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
    assert_eq!(store.describe_collection(&ctx, "fresh").unwrap_err().kind(), ErrorKind::NotFound);
}
