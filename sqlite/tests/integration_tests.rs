//! Integration tests for the content-schema-sqlite crate.

use content_schema_core::{
    ContentData, ContentItem, ContentStatus, Field, RelationCardinality, Schema, SchemaFilter,
    SchemaKind,
};
use content_schema_db::{ContentItemStore, SchemaStore, Snapshot, StoreError};
use content_schema_sqlite::{Migration, SqliteStore};
use rusqlite::Connection;
use serde_json::json;
use tempfile::TempDir;

fn migrated(prefix: &str) -> Migration {
    let conn = Connection::open_in_memory().unwrap();
    let mut migration = Migration::new(conn, prefix).unwrap();
    migration.up().unwrap();
    migration
}

fn blog_schema() -> Schema {
    let mut schema = Schema::new("Blog Post", SchemaKind::Collection)
        .with_id("posts")
        .with_description("Long-form articles")
        .with_field(Field::text("title", "Title").required())
        .with_field(Field::enumeration("category", "Category", ["A", "B"]))
        .with_field(Field::relation(
            "author",
            "Author",
            "people",
            RelationCardinality::One,
        ));
    schema.version = 1;
    schema
}

fn post(title: &str) -> ContentItem {
    let mut data = ContentData::new();
    data.insert("title".into(), json!(title));
    data.insert("category".into(), json!("A"));
    ContentItem::new("posts".into(), title, data)
}

#[test]
fn test_schema_put_get_round_trip() {
    let migration = migrated("cms_");
    let store = SqliteStore::new(migration.connection(), "cms_").unwrap();

    let schema = blog_schema();
    store.put_schema(schema.clone()).unwrap();

    let loaded = store.get_schema(&schema.id).unwrap().unwrap();
    assert_eq!(loaded.name, schema.name);
    assert_eq!(loaded.description, schema.description);
    assert_eq!(loaded.fields, schema.fields);
    assert_eq!(loaded.version, 1);
}

#[test]
fn test_schema_version_compare_and_swap() {
    let migration = migrated("cms_");
    let store = SqliteStore::new(migration.connection(), "cms_").unwrap();
    let schema = blog_schema();
    store.put_schema(schema.clone()).unwrap();

    // Same version again: stale.
    let err = store.put_schema(schema.clone()).unwrap_err();
    assert!(matches!(
        err,
        StoreError::VersionConflict {
            stored: 1,
            incoming: 1,
            ..
        }
    ));

    // Next version with a field removed and reordered.
    let mut next = schema;
    next.version = 2;
    next.fields.remove(1);
    next.fields.reverse();
    store.put_schema(next.clone()).unwrap();

    let loaded = store.get_schema(&next.id).unwrap().unwrap();
    assert_eq!(loaded.version, 2);
    let ids: Vec<&str> = loaded.fields.iter().map(|f| f.id.as_str()).collect();
    assert_eq!(ids, vec!["author", "title"]);
}

#[test]
fn test_stale_write_after_delete_does_not_restore_schema() {
    let migration = migrated("cms_");
    let store = SqliteStore::new(migration.connection(), "cms_").unwrap();
    store.put_schema(blog_schema()).unwrap();
    store.delete_schema(&"posts".into()).unwrap();

    let mut stale = blog_schema();
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

    // A fresh version 1 write is still a valid insert.
    store.put_schema(blog_schema()).unwrap();
    assert_eq!(store.get_schema(&"posts".into()).unwrap().unwrap().version, 1);
}

#[test]
fn test_list_schemas_applies_filter() {
    let migration = migrated("cms_");
    let store = SqliteStore::new(migration.connection(), "cms_").unwrap();
    store.put_schema(blog_schema()).unwrap();

    let mut settings = Schema::new("Settings", SchemaKind::Single).with_id("settings");
    settings.version = 1;
    settings.archived_at = Some(chrono::Utc::now());
    store.put_schema(settings).unwrap();

    assert_eq!(store.list_schemas(&SchemaFilter::default()).unwrap().len(), 1);
    let all = store
        .list_schemas(&SchemaFilter::default().including_archived())
        .unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].name, "Blog Post");

    let singles = store
        .list_schemas(
            &SchemaFilter::default()
                .including_archived()
                .with_kind(SchemaKind::Single),
        )
        .unwrap();
    assert_eq!(singles.len(), 1);
}

#[test]
fn test_delete_schema_cascades_fields() {
    let migration = migrated("cms_");
    let store = SqliteStore::new(migration.connection(), "cms_").unwrap();
    store.put_schema(blog_schema()).unwrap();
    assert_eq!(migration.status().unwrap().field_count, 3);

    store.delete_schema(&"posts".into()).unwrap();
    assert!(store.get_schema(&"posts".into()).unwrap().is_none());
    assert_eq!(migration.status().unwrap().field_count, 0);

    assert!(matches!(
        store.delete_schema(&"posts".into()),
        Err(StoreError::SchemaNotFound(_))
    ));
}

#[test]
fn test_item_lifecycle() {
    let migration = migrated("cms_");
    let store = SqliteStore::new(migration.connection(), "cms_").unwrap();

    let item = store.put_item(post("Hello")).unwrap();
    let mut updated = item.clone();
    updated.status = ContentStatus::PendingReview;
    updated.data.remove("category");
    store.put_item(updated).unwrap();

    let loaded = store.get_item(&item.id).unwrap().unwrap();
    assert_eq!(loaded.status, ContentStatus::PendingReview);
    assert!(!loaded.data.contains_key("category"));

    let mut deleted = loaded;
    deleted.deleted_at = Some(chrono::Utc::now());
    store.put_item(deleted).unwrap();
    let status = migration.status().unwrap();
    assert_eq!(status.item_count, 0);
    assert_eq!(status.deleted_item_count, 1);

    store.delete_item(&item.id).unwrap();
    assert!(store.get_item(&item.id).unwrap().is_none());
    assert!(matches!(
        store.delete_item(&item.id),
        Err(StoreError::ItemNotFound(_))
    ));
}

#[test]
fn test_prefixes_are_isolated() {
    let conn = Connection::open_in_memory().unwrap();
    let mut first = Migration::new(conn, "a_").unwrap();
    first.up().unwrap();
    let conn = first.into_connection();
    let mut second = Migration::new(conn, "b_").unwrap();
    second.up().unwrap();

    let a = SqliteStore::new(second.connection(), "a_").unwrap();
    let b = SqliteStore::new(second.connection(), "b_").unwrap();
    a.put_schema(blog_schema()).unwrap();

    assert!(a.get_schema(&"posts".into()).unwrap().is_some());
    assert!(b.get_schema(&"posts".into()).unwrap().is_none());
}

#[test]
fn test_seed_and_refresh_from_snapshot_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("snapshot.json");
    let snapshot = Snapshot {
        schemas: vec![blog_schema()],
        items: vec![post("one"), post("two")],
    };
    snapshot.save(&path).unwrap();

    let mut migration = migrated("cms_");
    let report = migration.seed(&path).unwrap();
    assert_eq!(report.schemas_inserted, 1);
    assert_eq!(report.fields_inserted, 3);
    assert_eq!(report.options_inserted, 2);
    assert_eq!(report.items_inserted, 2);

    // Seeding twice replaces rather than duplicating.
    migration.seed(&path).unwrap();
    let status = migration.status().unwrap();
    assert_eq!(status.schema_count, 1);
    assert_eq!(status.item_count, 2);

    migration.refresh(&path).unwrap();
    assert_eq!(migration.status().unwrap().item_count, 2);
}

#[test]
fn test_seed_normalizes_legacy_items() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("legacy.json"),
        json!([{ "id": "old", "schema_id": "posts", "content": { "title": "Old" } }]).to_string(),
    )
    .unwrap();

    let mut migration = migrated("cms_");
    migration.seed(dir.path()).unwrap();

    let store = SqliteStore::new(migration.connection(), "cms_").unwrap();
    let item = store.get_item(&"old".into()).unwrap().unwrap();
    assert_eq!(item.data.get("title"), Some(&json!("Old")));
}

#[test]
fn test_file_database_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("content.db");

    {
        let mut migration = Migration::new(Connection::open(&path).unwrap(), "cms_").unwrap();
        migration.up().unwrap();
        let store = SqliteStore::new(migration.connection(), "cms_").unwrap();
        store.put_schema(blog_schema()).unwrap();
    }

    let conn = Connection::open(&path).unwrap();
    let store = SqliteStore::new(&conn, "cms_").unwrap();
    assert!(store.get_schema(&"posts".into()).unwrap().is_some());
}
