//! In-process fallback store.
//!
//! [`LocalStore`] implements both store contracts over two ordered maps. It
//! is used when no database is configured and in tests. State is loaded on
//! first use: from the backing JSON file if one was given and exists,
//! otherwise empty. Every successful write rewrites the whole file.
//!
//! The store is guarded by a [`Mutex`] and is safe to share between threads
//! of one process. Two processes pointing at the same file will overwrite
//! each other.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use content_schema_core::{ContentItem, ItemId, Schema, SchemaFilter, SchemaId};
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::snapshot::Snapshot;
use crate::store::{ContentItemStore, SchemaStore, check_schema_version};

#[derive(Debug, Clone, Default)]
struct State {
    schemas: BTreeMap<SchemaId, Schema>,
    items: BTreeMap<ItemId, ContentItem>,
}

impl State {
    fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut state = Self::default();
        for schema in snapshot.schemas {
            state.schemas.insert(schema.id.clone(), schema);
        }
        for item in snapshot.items {
            state.items.insert(item.id.clone(), item);
        }
        state
    }

    fn to_snapshot(&self) -> Snapshot {
        Snapshot {
            schemas: self.schemas.values().cloned().collect(),
            items: self.items.values().cloned().collect(),
        }
    }
}

/// Map-backed implementation of [`SchemaStore`] and [`ContentItemStore`].
///
/// # Examples
///
/// ```
/// use content_schema_core::{Schema, SchemaFilter, SchemaKind};
/// use content_schema_db::{LocalStore, SchemaStore};
///
/// let store = LocalStore::in_memory();
/// let mut schema = Schema::new("Posts", SchemaKind::Collection);
/// schema.version = 1;
/// store.put_schema(schema).unwrap();
///
/// assert_eq!(store.list_schemas(&SchemaFilter::default()).unwrap().len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct LocalStore {
    path: Option<PathBuf>,
    state: Mutex<Option<State>>,
}

impl LocalStore {
    /// Creates a store that lives only as long as the value.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Creates a store persisted to `path`.
    ///
    /// The file is not touched until the first operation.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            state: Mutex::new(None),
        }
    }

    /// Backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Returns a copy of everything stored.
    pub fn snapshot(&self) -> Result<Snapshot> {
        self.read(|state| Ok(state.to_snapshot()))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<State>>> {
        self.state
            .lock()
            .map_err(|_| StoreError::Backend("local store lock poisoned".to_string()))
    }

    fn load_state(&self) -> Result<State> {
        match &self.path {
            Some(path) if path.exists() => {
                debug!(path = %path.display(), "Loading local store");
                Ok(State::from_snapshot(Snapshot::from_file(path)?))
            }
            _ => Ok(State::default()),
        }
    }

    fn ensure_loaded<'g>(&self, slot: &'g mut Option<State>) -> Result<&'g mut State> {
        if slot.is_none() {
            *slot = Some(self.load_state()?);
        }
        Ok(slot.get_or_insert_with(State::default))
    }

    fn persist(&self, state: &State) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let tmp = path.with_extension("json.tmp");
        state.to_snapshot().save(&tmp)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    fn read<R>(&self, f: impl FnOnce(&State) -> Result<R>) -> Result<R> {
        let mut guard = self.lock()?;
        let state = self.ensure_loaded(&mut guard)?;
        f(state)
    }

    /// Applies `f` to a copy of the state and commits it only once the copy
    /// has been persisted.
    fn write<R>(&self, f: impl FnOnce(&mut State) -> Result<R>) -> Result<R> {
        let mut guard = self.lock()?;
        let state = self.ensure_loaded(&mut guard)?;
        let mut next = state.clone();
        let out = f(&mut next)?;
        self.persist(&next)?;
        *state = next;
        Ok(out)
    }
}

impl SchemaStore for LocalStore {
    fn get_schema(&self, id: &SchemaId) -> Result<Option<Schema>> {
        self.read(|state| Ok(state.schemas.get(id).cloned()))
    }

    fn list_schemas(&self, filter: &SchemaFilter) -> Result<Vec<Schema>> {
        self.read(|state| {
            let mut schemas: Vec<Schema> = state
                .schemas
                .values()
                .filter(|s| filter.matches(s))
                .cloned()
                .collect();
            schemas.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
            Ok(schemas)
        })
    }

    fn put_schema(&self, schema: Schema) -> Result<Schema> {
        self.write(|state| {
            let stored = state.schemas.get(&schema.id).map(|s| s.version);
            check_schema_version(&schema.id, stored, schema.version)?;
            state.schemas.insert(schema.id.clone(), schema.clone());
            Ok(schema)
        })
    }

    fn delete_schema(&self, id: &SchemaId) -> Result<()> {
        self.write(|state| match state.schemas.remove(id) {
            Some(_) => Ok(()),
            None => Err(StoreError::SchemaNotFound(id.clone())),
        })
    }
}

impl ContentItemStore for LocalStore {
    fn get_item(&self, id: &ItemId) -> Result<Option<ContentItem>> {
        self.read(|state| Ok(state.items.get(id).cloned()))
    }

    fn get_items_by_schema(&self, schema_id: &SchemaId) -> Result<Vec<ContentItem>> {
        self.read(|state| {
            Ok(state
                .items
                .values()
                .filter(|item| &item.schema_id == schema_id)
                .cloned()
                .collect())
        })
    }

    fn put_item(&self, item: ContentItem) -> Result<ContentItem> {
        self.write(|state| {
            state.items.insert(item.id.clone(), item.clone());
            Ok(item)
        })
    }

    fn delete_item(&self, id: &ItemId) -> Result<()> {
        self.write(|state| match state.items.remove(id) {
            Some(_) => Ok(()),
            None => Err(StoreError::ItemNotFound(id.clone())),
        })
    }
}

#[cfg(test)]
mod tests {
    use content_schema_core::{ContentData, SchemaKind};
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    fn stored_schema(name: &str, id: &str) -> Schema {
        let mut schema = Schema::new(name, SchemaKind::Collection).with_id(id);
        schema.version = 1;
        schema
    }

    #[test]
    fn test_put_and_get_schema() {
        let store = LocalStore::in_memory();
        store.put_schema(stored_schema("Posts", "posts")).unwrap();

        let loaded = store.get_schema(&"posts".into()).unwrap().unwrap();
        assert_eq!(loaded.name, "Posts");
        assert!(store.get_schema(&"missing".into()).unwrap().is_none());
    }

    #[test]
    fn test_stale_schema_write_is_rejected() {
        let store = LocalStore::in_memory();
        let schema = stored_schema("Posts", "posts");
        store.put_schema(schema.clone()).unwrap();

        let err = store.put_schema(schema.clone()).unwrap_err();
        assert!(matches!(
            err,
            StoreError::VersionConflict {
                stored: 1,
                incoming: 1,
                ..
            }
        ));

        let mut next = schema;
        next.version = 2;
        assert_eq!(store.put_schema(next).unwrap().version, 2);
    }

    #[test]
    fn test_new_schema_must_start_at_version_one() {
        let store = LocalStore::in_memory();
        let mut schema = stored_schema("Posts", "posts");
        schema.version = 2;

        let err = store.put_schema(schema).unwrap_err();
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
    fn test_list_is_sorted_and_filtered() {
        let store = LocalStore::in_memory();
        store.put_schema(stored_schema("Zeta", "z")).unwrap();
        store.put_schema(stored_schema("Alpha", "a")).unwrap();

        let names: Vec<String> = store
            .list_schemas(&SchemaFilter::default())
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["Alpha", "Zeta"]);

        let filtered = store
            .list_schemas(&SchemaFilter::default().with_text("zet"))
            .unwrap();
        assert_eq!(filtered.len(), 1);
    }

    #[test]
    fn test_delete_missing_records() {
        let store = LocalStore::in_memory();
        assert!(matches!(
            store.delete_schema(&"nope".into()),
            Err(StoreError::SchemaNotFound(_))
        ));
        assert!(matches!(
            store.delete_item(&"nope".into()),
            Err(StoreError::ItemNotFound(_))
        ));
    }

    #[test]
    fn test_items_by_schema() {
        let store = LocalStore::in_memory();
        let posts: SchemaId = "posts".into();
        let pages: SchemaId = "pages".into();
        store
            .put_item(ContentItem::new(posts.clone(), "a", ContentData::new()))
            .unwrap();
        store
            .put_item(ContentItem::new(posts.clone(), "b", ContentData::new()))
            .unwrap();
        store
            .put_item(ContentItem::new(pages, "c", ContentData::new()))
            .unwrap();

        assert_eq!(store.get_items_by_schema(&posts).unwrap().len(), 2);
    }

    #[test]
    fn test_file_persistence_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("content.json");

        let store = LocalStore::open(&path);
        assert!(!path.exists());
        store.put_schema(stored_schema("Posts", "posts")).unwrap();
        let mut data = ContentData::new();
        data.insert("title".into(), json!("Hello"));
        let item = store
            .put_item(ContentItem::new("posts".into(), "Hello", data))
            .unwrap();
        assert!(path.exists());
        drop(store);

        let reopened = LocalStore::open(&path);
        assert!(reopened.get_schema(&"posts".into()).unwrap().is_some());
        let loaded = reopened.get_item(&item.id).unwrap().unwrap();
        assert_eq!(loaded.data, item.data);
    }

    #[test]
    fn test_legacy_file_is_normalized_on_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("content.json");
        std::fs::write(
            &path,
            json!({
                "schemas": [],
                "items": [{ "id": "old", "schemaId": "posts", "content": { "title": "x" } }]
            })
            .to_string(),
        )
        .unwrap();

        let store = LocalStore::open(&path);
        let item = store.get_item(&"old".into()).unwrap().unwrap();
        assert_eq!(item.data.get("title"), Some(&json!("x")));
    }

    #[test]
    fn test_failed_write_leaves_state_untouched() {
        let store = LocalStore::in_memory();
        store.put_schema(stored_schema("Posts", "posts")).unwrap();
        let mut renamed = stored_schema("Renamed", "posts");
        renamed.version = 5;
        assert!(store.put_schema(renamed).is_err());

        let loaded = store.get_schema(&"posts".into()).unwrap().unwrap();
        assert_eq!(loaded.name, "Posts");
    }
}
