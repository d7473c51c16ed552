//! Store contracts implemented over SQLite.
//!
//! [`SqliteStore`] borrows a connection and implements
//! [`SchemaStore`] and [`ContentItemStore`] on top of the normalized tables
//! created by [`Migration::up`](crate::Migration::up).
//!
//! Schema writes run in one transaction: the `schemas` row is replaced with
//! `UPDATE … WHERE version = ?` so a concurrent writer holding the same
//! stale version loses, then the field rows are rewritten. Item writes are a
//! single statement.
//!
//! # Example
//!
//! ```no_run
//! use content_schema_core::{Schema, SchemaKind};
//! use content_schema_db::SchemaStore;
//! use content_schema_sqlite::{Migration, SqliteStore};
//! use rusqlite::Connection;
//!
//! let conn = Connection::open("content.db").unwrap();
//! let mut migration = Migration::new(conn, "cms_").unwrap();
//! migration.up().unwrap();
//!
//! let store = SqliteStore::new(migration.connection(), "cms_").unwrap();
//! let mut schema = Schema::new("Posts", SchemaKind::Collection);
//! schema.version = 1;
//! store.put_schema(schema).unwrap();
//! ```

use content_schema_core::{ContentItem, ItemId, Schema, SchemaFilter, SchemaId};
use content_schema_db::{ContentItemStore, SchemaStore, StoreError, check_schema_version};
use rusqlite::{Connection, params};
use tracing::debug;

use crate::convert;
use crate::error::{Result, SqliteError};
use crate::schema::validate_prefix;

/// SQLite-backed implementation of the store contracts.
pub struct SqliteStore<'a> {
    conn: &'a Connection,
    prefix: String,
}

impl<'a> SqliteStore<'a> {
    /// Creates a store over `conn` using tables named with `prefix`.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::InvalidPrefix`] if the prefix is invalid.
    pub fn new(conn: &'a Connection, prefix: impl Into<String>) -> Result<Self> {
        let prefix = prefix.into();
        validate_prefix(&prefix)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self { conn, prefix })
    }

    /// Returns a reference to the underlying connection.
    pub fn connection(&self) -> &Connection {
        self.conn
    }

    /// Writes a schema under the version compare-and-swap.
    pub fn save_schema(&self, schema: &Schema) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;

        let stored = convert::schema_version(&tx, &self.prefix, &schema.id)?;
        check_schema_version(&schema.id, stored, schema.version)?;
        match stored {
            None => convert::insert_schema_row(&tx, &self.prefix, schema)?,
            Some(stored) => {
                let rows = convert::update_schema_row(&tx, &self.prefix, schema, stored)?;
                if rows == 0 {
                    return Err(SqliteError::Store(StoreError::VersionConflict {
                        schema: schema.id.clone(),
                        stored,
                        incoming: schema.version,
                    }));
                }
                convert::delete_fields(&tx, &self.prefix, &schema.id)?;
            }
        }
        let counts = convert::insert_fields(&tx, &self.prefix, schema)?;

        tx.commit()?;
        debug!(schema = %schema.id, version = schema.version, fields = counts.fields, "Schema written");
        Ok(())
    }

    /// Removes a schema and its field rows.
    pub fn remove_schema(&self, id: &SchemaId) -> Result<()> {
        let rows = self.conn.execute(
            &format!("DELETE FROM {}schemas WHERE id = ?1", self.prefix),
            params![id.as_str()],
        )?;
        if rows == 0 {
            return Err(SqliteError::Store(StoreError::SchemaNotFound(id.clone())));
        }
        Ok(())
    }

    /// Removes an item row.
    pub fn remove_item(&self, id: &ItemId) -> Result<()> {
        let rows = self.conn.execute(
            &format!("DELETE FROM {}items WHERE id = ?1", self.prefix),
            params![id.as_str()],
        )?;
        if rows == 0 {
            return Err(SqliteError::Store(StoreError::ItemNotFound(id.clone())));
        }
        Ok(())
    }
}

impl SchemaStore for SqliteStore<'_> {
    fn get_schema(&self, id: &SchemaId) -> content_schema_db::Result<Option<Schema>> {
        Ok(convert::load_schema(self.conn, &self.prefix, id)?)
    }

    fn list_schemas(&self, filter: &SchemaFilter) -> content_schema_db::Result<Vec<Schema>> {
        let schemas = convert::load_all_schemas(self.conn, &self.prefix)?;
        Ok(schemas.into_iter().filter(|s| filter.matches(s)).collect())
    }

    fn put_schema(&self, schema: Schema) -> content_schema_db::Result<Schema> {
        self.save_schema(&schema)?;
        Ok(schema)
    }

    fn delete_schema(&self, id: &SchemaId) -> content_schema_db::Result<()> {
        Ok(self.remove_schema(id)?)
    }
}

impl ContentItemStore for SqliteStore<'_> {
    fn get_item(&self, id: &ItemId) -> content_schema_db::Result<Option<ContentItem>> {
        Ok(convert::load_item(self.conn, &self.prefix, id)?)
    }

    fn get_items_by_schema(
        &self,
        schema_id: &SchemaId,
    ) -> content_schema_db::Result<Vec<ContentItem>> {
        Ok(convert::load_items_by_schema(
            self.conn,
            &self.prefix,
            schema_id,
        )?)
    }

    fn put_item(&self, item: ContentItem) -> content_schema_db::Result<ContentItem> {
        convert::upsert_item(self.conn, &self.prefix, &item)?;
        Ok(item)
    }

    fn delete_item(&self, id: &ItemId) -> content_schema_db::Result<()> {
        Ok(self.remove_item(id)?)
    }
}
