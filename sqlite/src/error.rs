//! Error types for SQLite storage operations.
//!
//! Provides a unified error type covering database access, conversion,
//! migration, and validation failures. At the store trait boundary every
//! [`SqliteError`] becomes a [`StoreError`].

use content_schema_db::StoreError;
use thiserror::Error;

/// Errors that can occur during SQLite storage operations.
#[derive(Debug, Error)]
pub enum SqliteError {
    /// SQLite database operation failure.
    #[error("database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    /// Row-to-record conversion failure.
    #[error("conversion error: {0}")]
    ConversionError(String),

    /// Migration lifecycle operation failure.
    #[error("migration error: {0}")]
    MigrationError(String),

    /// Table prefix contains invalid characters.
    #[error("invalid prefix '{0}': must contain only alphanumeric characters and underscores")]
    InvalidPrefix(String),

    /// Store-level failure (version conflict, missing record, snapshot loading).
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<serde_json::Error> for SqliteError {
    fn from(err: serde_json::Error) -> Self {
        SqliteError::ConversionError(err.to_string())
    }
}

impl From<SqliteError> for StoreError {
    fn from(err: SqliteError) -> Self {
        match err {
            SqliteError::Store(inner) => inner,
            other => StoreError::Backend(other.to_string()),
        }
    }
}

/// Convenience alias for results with [`SqliteError`].
pub type Result<T> = std::result::Result<T, SqliteError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_pass_through() {
        let err = SqliteError::Store(StoreError::SchemaNotFound("posts".into()));
        assert!(matches!(
            StoreError::from(err),
            StoreError::SchemaNotFound(_)
        ));
    }

    #[test]
    fn test_other_errors_become_backend() {
        let err = SqliteError::InvalidPrefix("bad-".to_string());
        match StoreError::from(err) {
            StoreError::Backend(message) => assert!(message.contains("bad-")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
