//! Storage contracts, local fallback store, and configuration for the
//! content engine.
//!
//! This crate sits between the pure rules in `content-schema-core` and any
//! concrete persistence:
//!
//! - [`SchemaStore`] / [`ContentItemStore`]: the contracts the engine
//!   reads and writes through. Schema writes are a compare-and-swap on the
//!   schema's version stamp.
//! - [`LocalStore`]: an in-process implementation with optional JSON file
//!   persistence.
//! - [`Snapshot`]: the `{ schemas, items }` exchange document, with legacy
//!   item normalization ([`normalize_legacy_item`]) applied on every read.
//! - [`EngineConfig`]: YAML configuration.
//!
//! # Quick start
//!
//! ```
//! use content_schema_core::{ContentData, ContentItem, SchemaId};
//! use content_schema_db::{ContentItemStore, LocalStore};
//!
//! let store = LocalStore::in_memory();
//! let item = ContentItem::new(SchemaId::from("posts"), "Hello", ContentData::new());
//! store.put_item(item.clone()).unwrap();
//!
//! let items = store.get_items_by_schema(&item.schema_id).unwrap();
//! assert_eq!(items.len(), 1);
//! ```

mod config;
mod error;
mod ingest;
mod local;
mod snapshot;
mod store;

pub use config::{
    ContentConfig, DEFAULT_CONFIG_FILE, EngineConfig, StorageBackend, StorageConfig,
};
pub use error::{Result, StoreError};
pub use ingest::{normalize_legacy_item, parse_document};
pub use local::LocalStore;
pub use snapshot::Snapshot;
pub use store::{ContentItemStore, SchemaStore, check_schema_version};
