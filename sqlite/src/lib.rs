//! SQLite storage backend for content schemas and items.
//!
//! This crate provides a normalized SQLite layout for storing
//! [`Schema`](content_schema_core::Schema) and
//! [`ContentItem`](content_schema_core::ContentItem) records with full
//! round-trip fidelity, migration lifecycle management, and an
//! implementation of the store contracts from `content-schema-db`.
//!
//! # Architecture
//!
//! - **`schema`**: SQL generation with customizable table prefixes
//! - **`migration`**: Lifecycle operations (up/down/seed/refresh/status)
//! - **`convert`**: Record ↔ SQL row transformations
//! - **`store`**: [`SqliteStore`], the `SchemaStore`/`ContentItemStore`
//!   implementation
//!
//! # Quick start
//!
//! ```no_run
//! use content_schema_sqlite::{Migration, SqliteStore};
//! use content_schema_db::ContentItemStore;
//! use rusqlite::Connection;
//!
//! let conn = Connection::open("content.db").unwrap();
//! let mut migration = Migration::new(conn, "cms_").unwrap();
//! migration.up().unwrap();
//! migration.seed("snapshot.json").unwrap();
//!
//! let store = SqliteStore::new(migration.connection(), "cms_").unwrap();
//! let items = store.get_items_by_schema(&"posts".into()).unwrap();
//! println!("{} posts", items.len());
//! ```
//!
//! # Table prefix customization
//!
//! All table and index names are prefixed with a configurable string,
//! allowing multiple isolated content sets within the same SQLite database.
//! Prefixes must contain only alphanumeric characters and underscores.

mod convert;
mod error;
mod migration;
mod schema;
mod store;

pub use error::{Result, SqliteError};
pub use migration::{Migration, MigrationStatus, SeedReport};
pub use store::SqliteStore;
