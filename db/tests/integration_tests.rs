use std::sync::Arc;
use std::thread;

use content_schema_core::{
    ContentData, ContentItem, Field, Schema, SchemaFilter, SchemaKind,
};
use content_schema_db::{
    ContentItemStore, EngineConfig, LocalStore, SchemaStore, Snapshot, StorageBackend,
    StoreError,
};
use serde_json::json;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn posts_schema() -> Schema {
    let mut schema = Schema::new("Blog Post", SchemaKind::Collection)
        .with_id("posts")
        .with_description("Articles for the blog")
        .with_field(Field::text("title", "Title").required())
        .with_field(Field::enumeration("category", "Category", ["A", "B"]));
    schema.version = 1;
    schema
}

fn post(title: &str) -> ContentItem {
    let mut data = ContentData::new();
    data.insert("title".into(), json!(title));
    ContentItem::new("posts".into(), title, data)
}

// ---------------------------------------------------------------------------
// Local store
// ---------------------------------------------------------------------------

#[test]
fn test_local_store_round_trip_through_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("content.json");

    {
        let store = LocalStore::open(&path);
        store.put_schema(posts_schema()).unwrap();
        store.put_item(post("one")).unwrap();
        store.put_item(post("two")).unwrap();
    }

    let snapshot = Snapshot::from_file(&path).unwrap();
    assert_eq!(snapshot.schemas.len(), 1);
    assert_eq!(snapshot.items.len(), 2);

    let store = LocalStore::open(&path);
    let items = store.get_items_by_schema(&"posts".into()).unwrap();
    assert_eq!(items.len(), 2);
}

#[test]
fn test_version_conflict_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("content.json");
    LocalStore::open(&path).put_schema(posts_schema()).unwrap();

    let store = LocalStore::open(&path);
    let err = store.put_schema(posts_schema()).unwrap_err();
    assert!(matches!(err, StoreError::VersionConflict { stored: 1, .. }));
}

#[test]
fn test_stale_write_after_delete_does_not_restore_schema() {
    let store = LocalStore::in_memory();
    store.put_schema(posts_schema()).unwrap();
    store.delete_schema(&"posts".into()).unwrap();

    let mut stale = posts_schema();
    stale.version = 2;
    stale.name = "Stale edit".into();
    let err = store.put_schema(stale).unwrap_err();
    assert!(matches!(
        err,
        StoreError::VersionConflict {
            stored: 0,
            incoming: 2,
            ..
        }
    ));
    assert!(store.get_schema(&"posts".into()).unwrap().is_none());
}

#[test]
fn test_filter_by_kind_and_archived() {
    let store = LocalStore::in_memory();
    store.put_schema(posts_schema()).unwrap();

    let mut settings = Schema::new("Site Settings", SchemaKind::Single).with_id("settings");
    settings.version = 1;
    store.put_schema(settings).unwrap();

    let mut archived = Schema::new("Old Posts", SchemaKind::Collection).with_id("old");
    archived.version = 1;
    archived.archived_at = Some(chrono::Utc::now());
    store.put_schema(archived).unwrap();

    let all = store.list_schemas(&SchemaFilter::default()).unwrap();
    assert_eq!(all.len(), 2);

    let singles = store
        .list_schemas(&SchemaFilter::default().with_kind(SchemaKind::Single))
        .unwrap();
    assert_eq!(singles.len(), 1);
    assert_eq!(singles[0].id.as_str(), "settings");

    let with_archived = store
        .list_schemas(&SchemaFilter::default().including_archived())
        .unwrap();
    assert_eq!(with_archived.len(), 3);

    let by_description = store
        .list_schemas(&SchemaFilter::default().with_text("articles"))
        .unwrap();
    assert_eq!(by_description.len(), 1);
}

#[test]
fn test_concurrent_item_writes() {
    let store = Arc::new(LocalStore::in_memory());
    let handles: Vec<_> = (0..8)
        .map(|n| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                store.put_item(post(&format!("post {n}"))).unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.get_items_by_schema(&"posts".into()).unwrap().len(), 8);
}

// ---------------------------------------------------------------------------
// Snapshot documents
// ---------------------------------------------------------------------------

#[test]
fn test_legacy_item_files_are_normalized() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("legacy.json"),
        json!({
            "id": "legacy-1",
            "schema_id": "posts",
            "title": "Imported",
            "status": "published",
            "content": { "title": "Imported" },
            "created_at": "2023-05-01T10:00:00Z",
            "updated_at": "2023-05-02T10:00:00Z",
            "published_at": "2023-05-02T10:00:00Z"
        })
        .to_string(),
    )
    .unwrap();

    let snapshot = Snapshot::load(dir.path()).unwrap();
    let item = &snapshot.items[0];
    assert_eq!(item.id.as_str(), "legacy-1");
    assert!(item.published_at.is_some());
    assert_eq!(item.data.get("title"), Some(&json!("Imported")));
}

#[test]
fn test_invalid_document_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.json");
    std::fs::write(&path, "\"just a string\"").unwrap();

    assert!(matches!(
        Snapshot::from_file(&path),
        Err(StoreError::InvalidSnapshot(_))
    ));
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[test]
fn test_config_defaults_and_save() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("content-schema.yaml");

    let mut config = EngineConfig::default();
    assert_eq!(config.storage.backend, StorageBackend::Sqlite);
    config.storage.backend = StorageBackend::Local;
    config.content.review_workflow = true;
    config.save(&path).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("backend: local"));
    assert!(text.contains("review_workflow: true"));

    assert_eq!(EngineConfig::load(&path).unwrap(), config);
}
