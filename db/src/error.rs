//! Error types for store operations.
//!
//! Every failure a store can report is a [`StoreError`]. From the engine's
//! point of view these are transport failures: recoverable by retrying, and
//! never swallowed.

use content_schema_core::{ItemId, SchemaId};
use thiserror::Error;

/// Errors that can occur while reading or writing a store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// File I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON parsing or serialization failure.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// YAML parsing or serialization failure.
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// A schema write carried a stale version stamp.
    #[error("version conflict on schema {schema}: stored version is {stored}, write carried {incoming}")]
    VersionConflict {
        /// Schema being written.
        schema: SchemaId,
        /// Version currently stored.
        stored: u64,
        /// Version carried by the write.
        incoming: u64,
    },

    /// Deleting a schema that does not exist.
    #[error("schema not found: {0}")]
    SchemaNotFound(SchemaId),

    /// Deleting an item that does not exist.
    #[error("content item not found: {0}")]
    ItemNotFound(ItemId),

    /// A snapshot or legacy document could not be interpreted.
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    /// Backend-specific failure (database driver, lock poisoning).
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Convenience alias for results with [`StoreError`].
pub type Result<T> = std::result::Result<T, StoreError>;
