//! SQL schema generation with customizable table prefixes.
//!
//! Generates normalized `CREATE TABLE` and `CREATE INDEX` statements for
//! storing content schemas and items in SQLite. All table names are
//! prefixed with a configurable string to allow multiple isolated content
//! sets in the same database.
//!
//! # Table structure
//!
//! - `{prefix}schemas`: schema metadata and version stamp
//! - `{prefix}fields`: fields with their position in the schema's order
//! - `{prefix}field_options`: ordered allowed values for `enum` fields
//! - `{prefix}items`: content items; `data` is a JSON object
//!
//! Items deliberately carry no foreign key to `{prefix}schemas`: items of a
//! retained or imported schema may arrive before the schema itself.

use crate::error::{Result, SqliteError};

/// Validates that a table prefix contains only alphanumeric characters and underscores.
pub(crate) fn validate_prefix(prefix: &str) -> Result<()> {
    if prefix.is_empty() {
        return Err(SqliteError::InvalidPrefix(prefix.to_string()));
    }
    if !prefix.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Err(SqliteError::InvalidPrefix(prefix.to_string()));
    }
    Ok(())
}

/// Generates the complete SQL schema for all tables with the given prefix.
///
/// # Errors
///
/// Returns [`SqliteError::InvalidPrefix`] if the prefix contains characters
/// other than alphanumerics and underscores, or if it is empty.
pub fn generate_schema_sql(prefix: &str) -> Result<String> {
    validate_prefix(prefix)?;

    let sql = format!(
        r#"
CREATE TABLE IF NOT EXISTS {prefix}schemas (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT,
    kind TEXT NOT NULL DEFAULT 'collection' CHECK (kind IN ('collection', 'single')),
    archived_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    version INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS {prefix}fields (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    schema_id TEXT NOT NULL,
    field_id TEXT NOT NULL,
    position INTEGER NOT NULL,
    label TEXT NOT NULL,
    field_type TEXT NOT NULL,
    required INTEGER NOT NULL DEFAULT 0,
    default_value TEXT,
    relation_target TEXT,
    relation_cardinality TEXT CHECK (relation_cardinality IN ('one', 'many')),
    description TEXT,
    UNIQUE (schema_id, field_id),
    FOREIGN KEY (schema_id) REFERENCES {prefix}schemas(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS {prefix}field_options (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    field_row_id INTEGER NOT NULL,
    value TEXT NOT NULL,
    FOREIGN KEY (field_row_id) REFERENCES {prefix}fields(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS {prefix}items (
    id TEXT PRIMARY KEY,
    schema_id TEXT NOT NULL,
    title TEXT NOT NULL DEFAULT '',
    status TEXT NOT NULL DEFAULT 'draft' CHECK (status IN ('draft', 'pending_review', 'published')),
    data TEXT NOT NULL DEFAULT '{{}}',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    published_at TEXT,
    deleted_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_{prefix}fields_schema ON {prefix}fields(schema_id);
CREATE INDEX IF NOT EXISTS idx_{prefix}field_options_field ON {prefix}field_options(field_row_id);
CREATE INDEX IF NOT EXISTS idx_{prefix}items_schema ON {prefix}items(schema_id);
CREATE INDEX IF NOT EXISTS idx_{prefix}schemas_kind ON {prefix}schemas(kind);
"#,
        prefix = prefix
    );

    Ok(sql)
}

/// Generates SQL to drop all tables in reverse dependency order.
///
/// # Errors
///
/// Returns [`SqliteError::InvalidPrefix`] if the prefix is invalid.
pub fn generate_drop_sql(prefix: &str) -> Result<String> {
    validate_prefix(prefix)?;

    let sql = format!(
        r#"
DROP TABLE IF EXISTS {prefix}items;
DROP TABLE IF EXISTS {prefix}field_options;
DROP TABLE IF EXISTS {prefix}fields;
DROP TABLE IF EXISTS {prefix}schemas;
"#,
        prefix = prefix
    );

    Ok(sql)
}
