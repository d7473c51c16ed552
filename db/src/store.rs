//! Storage contracts consumed by the content engine.
//!
//! The engine never talks to a database directly. It reads and writes
//! through [`SchemaStore`] and [`ContentItemStore`], which may be backed by a
//! remote service, SQLite, or the in-process [`LocalStore`](crate::LocalStore).
//!
//! Methods take `&self`; implementations use interior mutability where they
//! need it.

use content_schema_core::{ContentItem, ItemId, Schema, SchemaFilter, SchemaId};

use crate::error::{Result, StoreError};

/// Persistence for schema definitions.
pub trait SchemaStore {
    /// Loads a schema by id.
    fn get_schema(&self, id: &SchemaId) -> Result<Option<Schema>>;

    /// Lists schemas matching `filter`, ordered by name.
    fn list_schemas(&self, filter: &SchemaFilter) -> Result<Vec<Schema>>;

    /// Inserts or replaces a schema.
    ///
    /// Writes are a compare-and-swap on [`Schema::version`]: a new record
    /// must carry version 1, and replacing a stored schema requires
    /// `schema.version == stored.version + 1`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::VersionConflict`] for a stale write.
    fn put_schema(&self, schema: Schema) -> Result<Schema>;

    /// Removes a schema record entirely.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::SchemaNotFound`] if no such schema exists.
    fn delete_schema(&self, id: &SchemaId) -> Result<()>;
}

/// Persistence for content items.
pub trait ContentItemStore {
    /// Loads an item by id, including soft-deleted items.
    fn get_item(&self, id: &ItemId) -> Result<Option<ContentItem>>;

    /// Loads every item of a schema, including soft-deleted items.
    ///
    /// No ordering is guaranteed.
    fn get_items_by_schema(&self, schema_id: &SchemaId) -> Result<Vec<ContentItem>>;

    /// Inserts or replaces an item. A single item write is atomic.
    fn put_item(&self, item: ContentItem) -> Result<ContentItem>;

    /// Removes an item record entirely.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ItemNotFound`] if no such item exists.
    fn delete_item(&self, id: &ItemId) -> Result<()>;
}

impl<T: SchemaStore + ?Sized> SchemaStore for &T {
    fn get_schema(&self, id: &SchemaId) -> Result<Option<Schema>> {
        (**self).get_schema(id)
    }

    fn list_schemas(&self, filter: &SchemaFilter) -> Result<Vec<Schema>> {
        (**self).list_schemas(filter)
    }

    fn put_schema(&self, schema: Schema) -> Result<Schema> {
        (**self).put_schema(schema)
    }

    fn delete_schema(&self, id: &SchemaId) -> Result<()> {
        (**self).delete_schema(id)
    }
}

impl<T: ContentItemStore + ?Sized> ContentItemStore for &T {
    fn get_item(&self, id: &ItemId) -> Result<Option<ContentItem>> {
        (**self).get_item(id)
    }

    fn get_items_by_schema(&self, schema_id: &SchemaId) -> Result<Vec<ContentItem>> {
        (**self).get_items_by_schema(schema_id)
    }

    fn put_item(&self, item: ContentItem) -> Result<ContentItem> {
        (**self).put_item(item)
    }

    fn delete_item(&self, id: &ItemId) -> Result<()> {
        (**self).delete_item(id)
    }
}

/// Checks the version stamp of a schema write against the stored version.
///
/// A new record (`stored` is `None`) must be version 1; an existing record
/// accepts exactly the next version. A missing record is treated as stored
/// version 0, so a stale write that arrives after a delete is refused.
///
/// # Examples
///
/// ```
/// use content_schema_db::check_schema_version;
///
/// let id = "posts".into();
/// assert!(check_schema_version(&id, None, 1).is_ok());
/// assert!(check_schema_version(&id, Some(3), 4).is_ok());
/// assert!(check_schema_version(&id, Some(3), 3).is_err());
/// assert!(check_schema_version(&id, None, 2).is_err());
/// ```
pub fn check_schema_version(id: &SchemaId, stored: Option<u64>, incoming: u64) -> Result<()> {
    let stored = stored.unwrap_or(0);
    if incoming == stored + 1 {
        Ok(())
    } else {
        Err(StoreError::VersionConflict {
            schema: id.clone(),
            stored,
            incoming,
        })
    }
}
