//! Table lifecycle for the SQLite backend: create, drop, seed, refresh.
//!
//! Seeding bypasses the engine. Snapshot records are written as they are,
//! replacing rows with the same id, so a seeded database can hold data the
//! engine would refuse (retained keys, legacy payloads).
//!
//! ```no_run
//! use content_schema_sqlite::Migration;
//! use rusqlite::Connection;
//!
//! let conn = Connection::open("content.db").unwrap();
//! let mut migration = Migration::new(conn, "cms_").unwrap();
//! migration.up().unwrap();
//! assert!(migration.status().unwrap().tables_exist);
//!
//! let report = migration.seed("fixtures/").unwrap();
//! println!("{} schemas, {} items", report.schemas_inserted, report.items_inserted);
//! ```

use std::path::Path;

use content_schema_db::Snapshot;
use rusqlite::Connection;
use tracing::info;

use crate::convert;
use crate::error::{Result, SqliteError};
use crate::schema::{generate_drop_sql, generate_schema_sql, validate_prefix};

/// Owns the connection and the table prefix the content tables live under.
pub struct Migration {
    conn: Connection,
    prefix: String,
}

impl Migration {
    /// Wraps `conn` and turns on foreign key enforcement.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::InvalidPrefix`] for a prefix that is not a
    /// plain SQL identifier.
    pub fn new(conn: Connection, prefix: impl Into<String>) -> Result<Self> {
        let prefix = prefix.into();
        validate_prefix(&prefix)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self { conn, prefix })
    }

    /// Creates the schema, field, option, and item tables. Existing tables
    /// are left alone.
    pub fn up(&mut self) -> Result<()> {
        let sql = generate_schema_sql(&self.prefix)?;
        self.run_batch(&sql, "create")?;
        info!(prefix = %self.prefix, "Content tables ready");
        Ok(())
    }

    /// Drops the content tables, items first.
    pub fn down(&mut self) -> Result<()> {
        let sql = generate_drop_sql(&self.prefix)?;
        self.run_batch(&sql, "drop")?;
        info!(prefix = %self.prefix, "Content tables dropped");
        Ok(())
    }

    fn run_batch(&mut self, sql: &str, action: &str) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute_batch(sql)
            .map_err(|e| SqliteError::MigrationError(format!("failed to {action} tables: {e}")))?;
        tx.commit()?;
        Ok(())
    }

    /// Reports whether the tables exist and how many rows they hold.
    pub fn status(&self) -> Result<MigrationStatus> {
        if !self.tables_exist()? {
            return Ok(MigrationStatus::default());
        }

        Ok(MigrationStatus {
            tables_exist: true,
            schema_count: self.count_rows("schemas", None)?,
            field_count: self.count_rows("fields", None)?,
            item_count: self.count_rows("items", Some("deleted_at IS NULL"))?,
            deleted_item_count: self.count_rows("items", Some("deleted_at IS NOT NULL"))?,
        })
    }

    /// Seeds the database from a snapshot file or a directory of JSON
    /// documents (see [`Snapshot::load`]).
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::Store`] if the source cannot be read, or
    /// [`SqliteError::DatabaseError`] if insertion fails.
    pub fn seed(&mut self, source: impl AsRef<Path>) -> Result<SeedReport> {
        let snapshot = Snapshot::load(source)?;
        self.seed_snapshot(&snapshot)
    }

    /// Writes every schema and item of `snapshot` in one transaction.
    ///
    /// Records with an id already present are replaced. Schemas that were
    /// never stamped get version 1.
    pub fn seed_snapshot(&mut self, snapshot: &Snapshot) -> Result<SeedReport> {
        let tx = self.conn.transaction()?;
        let mut report = SeedReport::default();

        for schema in &snapshot.schemas {
            let mut schema = schema.clone();
            schema.version = schema.version.max(1);
            tx.execute(
                &format!("DELETE FROM {}schemas WHERE id = ?1", self.prefix),
                [schema.id.as_str()],
            )?;
            convert::insert_schema_row(&tx, &self.prefix, &schema)?;
            let counts = convert::insert_fields(&tx, &self.prefix, &schema)?;
            report.schemas_inserted += 1;
            report.fields_inserted += counts.fields;
            report.options_inserted += counts.options;
        }

        for item in &snapshot.items {
            convert::upsert_item(&tx, &self.prefix, item)?;
            report.items_inserted += 1;
        }

        tx.commit()?;
        info!(
            schemas = report.schemas_inserted,
            items = report.items_inserted,
            "Seeded content tables"
        );
        Ok(report)
    }

    /// [`down`](Self::down), [`up`](Self::up), then [`seed`](Self::seed).
    pub fn refresh(&mut self, source: impl AsRef<Path>) -> Result<SeedReport> {
        self.down()?;
        self.up()?;
        self.seed(source)
    }

    /// The wrapped connection, for building a [`SqliteStore`](crate::SqliteStore).
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Unwraps the connection.
    pub fn into_connection(self) -> Connection {
        self.conn
    }

    /// Both the schema and the item table must be present.
    fn tables_exist(&self) -> Result<bool> {
        let found: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN (?1, ?2)",
            [
                format!("{}schemas", self.prefix),
                format!("{}items", self.prefix),
            ],
            |row| row.get(0),
        )?;
        Ok(found == 2)
    }

    fn count_rows(&self, table: &str, condition: Option<&str>) -> Result<usize> {
        let sql = format!(
            "SELECT COUNT(*) FROM {}{table} WHERE {}",
            self.prefix,
            condition.unwrap_or("1")
        );
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}

/// Row counts reported by [`Migration::status`].
#[derive(Debug, Clone, Default)]
pub struct MigrationStatus {
    /// Whether the tables exist in the database.
    pub tables_exist: bool,
    /// Number of schemas stored.
    pub schema_count: usize,
    /// Number of active fields across all schemas.
    pub field_count: usize,
    /// Number of live content items.
    pub item_count: usize,
    /// Number of soft-deleted content items.
    pub deleted_item_count: usize,
}

/// What [`Migration::seed`] wrote.
#[derive(Debug, Clone, Default)]
pub struct SeedReport {
    /// Number of schemas written.
    pub schemas_inserted: usize,
    /// Number of field rows written.
    pub fields_inserted: usize,
    /// Number of enum option rows written.
    pub options_inserted: usize,
    /// Number of items written.
    pub items_inserted: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_new_validates_prefix() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(Migration::new(conn, "valid_prefix_").is_ok());

        let conn = Connection::open_in_memory().unwrap();
        assert!(Migration::new(conn, "").is_err());

        let conn = Connection::open_in_memory().unwrap();
        assert!(Migration::new(conn, "drop;--").is_err());
    }

    #[test]
    fn test_status_on_empty_database() {
        let conn = Connection::open_in_memory().unwrap();
        let migration = Migration::new(conn, "cms_").unwrap();
        let status = migration.status().unwrap();
        assert!(!status.tables_exist);
        assert_eq!(status.schema_count, 0);
    }

    #[test]
    fn test_up_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        let mut migration = Migration::new(conn, "cms_").unwrap();
        migration.up().unwrap();
        migration.up().unwrap();
        let status = migration.status().unwrap();
        assert!(status.tables_exist);
        assert_eq!(status.item_count, 0);
    }

    #[test]
    fn test_down_removes_tables() {
        let conn = Connection::open_in_memory().unwrap();
        let mut migration = Migration::new(conn, "cms_").unwrap();
        migration.up().unwrap();
        migration.down().unwrap();
        assert!(!migration.status().unwrap().tables_exist);
        migration.down().unwrap();
    }
}
