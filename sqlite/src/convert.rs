//! Bidirectional conversion between content records and SQLite rows.
//!
//! Schemas are split across `schemas`, `fields`, and `field_options`;
//! items live in a single row with `data` stored as a JSON object.
//! Timestamps are stored as RFC 3339 text.
//!
//! # Round-trip guarantees
//!
//! Every attribute of [`Schema`], [`Field`], and [`ContentItem`] survives an
//! insert → load cycle, including field order, enum option order, explicit
//! defaults, and soft-delete stamps.

use chrono::{DateTime, SecondsFormat, Utc};
use content_schema_core::{
    ContentItem, ContentStatus, Field, FieldType, ItemId, RelationCardinality, Schema, SchemaId,
    SchemaKind,
};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde_json::Value;

use crate::error::{Result, SqliteError};

/// Row counts produced by an insert.
#[derive(Debug, Clone, Copy, Default)]
pub struct InsertCounts {
    /// Field rows written.
    pub fields: usize,
    /// Enum option rows written.
    pub options: usize,
}

pub(crate) fn format_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_time(text: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| SqliteError::ConversionError(format!("invalid timestamp '{text}': {e}")))
}

fn parse_optional_time(text: Option<String>) -> Result<Option<DateTime<Utc>>> {
    text.as_deref().map(parse_time).transpose()
}

pub(crate) fn string_to_kind(s: &str) -> Result<SchemaKind> {
    match s {
        "collection" => Ok(SchemaKind::Collection),
        "single" => Ok(SchemaKind::Single),
        other => Err(SqliteError::ConversionError(format!(
            "unknown schema kind: {other}"
        ))),
    }
}

pub(crate) fn string_to_field_type(s: &str) -> Result<FieldType> {
    match s {
        "text" => Ok(FieldType::Text),
        "number" => Ok(FieldType::Number),
        "boolean" => Ok(FieldType::Boolean),
        "date" => Ok(FieldType::Date),
        "enum" => Ok(FieldType::Enum),
        "relation" => Ok(FieldType::Relation),
        "asset" => Ok(FieldType::Asset),
        "json" => Ok(FieldType::Json),
        other => Err(SqliteError::ConversionError(format!(
            "unknown field type: {other}"
        ))),
    }
}

pub(crate) fn string_to_cardinality(s: &str) -> Result<RelationCardinality> {
    match s {
        "one" => Ok(RelationCardinality::One),
        "many" => Ok(RelationCardinality::Many),
        other => Err(SqliteError::ConversionError(format!(
            "unknown relation cardinality: {other}"
        ))),
    }
}

pub(crate) fn string_to_status(s: &str) -> Result<ContentStatus> {
    match s {
        "draft" => Ok(ContentStatus::Draft),
        "pending_review" => Ok(ContentStatus::PendingReview),
        "published" => Ok(ContentStatus::Published),
        other => Err(SqliteError::ConversionError(format!(
            "unknown content status: {other}"
        ))),
    }
}

/// Inserts the `schemas` row of a schema.
pub fn insert_schema_row(conn: &Connection, prefix: &str, schema: &Schema) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO {prefix}schemas (id, name, description, kind, archived_at, created_at, updated_at, version) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
        ),
        params![
            schema.id.as_str(),
            schema.name,
            schema.description,
            schema.kind.as_str(),
            schema.archived_at.as_ref().map(format_time),
            format_time(&schema.created_at),
            format_time(&schema.updated_at),
            schema.version as i64,
        ],
    )?;
    Ok(())
}

/// Replaces the `schemas` row of a schema if its stored version is
/// `expected`. Returns the number of rows changed (0 or 1).
pub fn update_schema_row(
    conn: &Connection,
    prefix: &str,
    schema: &Schema,
    expected: u64,
) -> Result<usize> {
    let rows = conn.execute(
        &format!(
            "UPDATE {prefix}schemas SET name = ?2, description = ?3, kind = ?4, archived_at = ?5, \
             created_at = ?6, updated_at = ?7, version = ?8 \
             WHERE id = ?1 AND version = ?9"
        ),
        params![
            schema.id.as_str(),
            schema.name,
            schema.description,
            schema.kind.as_str(),
            schema.archived_at.as_ref().map(format_time),
            format_time(&schema.created_at),
            format_time(&schema.updated_at),
            schema.version as i64,
            expected as i64,
        ],
    )?;
    Ok(rows)
}

/// Writes the fields of a schema, in order, with their enum options.
///
/// Existing field rows of the schema must already have been removed.
pub fn insert_fields(conn: &Connection, prefix: &str, schema: &Schema) -> Result<InsertCounts> {
    let mut counts = InsertCounts::default();

    for (position, field) in schema.fields.iter().enumerate() {
        let default_value = field
            .default_value
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        conn.execute(
            &format!(
                "INSERT INTO {prefix}fields (schema_id, field_id, position, label, field_type, required, \
                 default_value, relation_target, relation_cardinality, description) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
            ),
            params![
                schema.id.as_str(),
                field.id.as_str(),
                position as i64,
                field.label,
                field.field_type.as_str(),
                field.required as i32,
                default_value,
                field.relation_target.as_ref().map(|t| t.as_str()),
                field.relation_cardinality.map(|c| c.as_str()),
                field.description,
            ],
        )?;
        let field_row_id = conn.last_insert_rowid();
        counts.fields += 1;

        for option in field.option_values() {
            conn.execute(
                &format!("INSERT INTO {prefix}field_options (field_row_id, value) VALUES (?1, ?2)"),
                params![field_row_id, option],
            )?;
            counts.options += 1;
        }
    }

    Ok(counts)
}

/// Removes every field row of a schema (options cascade).
pub fn delete_fields(conn: &Connection, prefix: &str, schema_id: &SchemaId) -> Result<()> {
    conn.execute(
        &format!("DELETE FROM {prefix}fields WHERE schema_id = ?1"),
        params![schema_id.as_str()],
    )?;
    Ok(())
}

/// Returns the stored version of a schema, if it exists.
pub fn schema_version(conn: &Connection, prefix: &str, id: &SchemaId) -> Result<Option<u64>> {
    let version = conn
        .query_row(
            &format!("SELECT version FROM {prefix}schemas WHERE id = ?1"),
            params![id.as_str()],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    Ok(version.map(|v| v as u64))
}

type SchemaRow = (
    String,
    String,
    Option<String>,
    String,
    Option<String>,
    String,
    String,
    i64,
);

fn read_schema_row(row: &Row<'_>) -> rusqlite::Result<SchemaRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn schema_from_row(conn: &Connection, prefix: &str, row: SchemaRow) -> Result<Schema> {
    let (id, name, description, kind, archived_at, created_at, updated_at, version) = row;
    let id = SchemaId::new(id);
    let fields = load_fields(conn, prefix, &id)?;
    Ok(Schema {
        fields,
        name,
        description,
        kind: string_to_kind(&kind)?,
        archived_at: parse_optional_time(archived_at)?,
        created_at: parse_time(&created_at)?,
        updated_at: parse_time(&updated_at)?,
        version: version as u64,
        id,
    })
}

const SCHEMA_COLUMNS: &str =
    "id, name, description, kind, archived_at, created_at, updated_at, version";

/// Loads a complete schema by id, including fields and options.
pub fn load_schema(conn: &Connection, prefix: &str, id: &SchemaId) -> Result<Option<Schema>> {
    let row = conn
        .query_row(
            &format!("SELECT {SCHEMA_COLUMNS} FROM {prefix}schemas WHERE id = ?1"),
            params![id.as_str()],
            read_schema_row,
        )
        .optional()?;

    row.map(|row| schema_from_row(conn, prefix, row)).transpose()
}

/// Loads every schema, ordered by name then id.
pub fn load_all_schemas(conn: &Connection, prefix: &str) -> Result<Vec<Schema>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SCHEMA_COLUMNS} FROM {prefix}schemas ORDER BY name, id"
    ))?;
    let rows: Vec<SchemaRow> = stmt
        .query_map([], read_schema_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|row| schema_from_row(conn, prefix, row))
        .collect()
}

/// Loads the fields of a schema in position order.
fn load_fields(conn: &Connection, prefix: &str, schema_id: &SchemaId) -> Result<Vec<Field>> {
    type FieldRow = (
        i64,
        String,
        String,
        String,
        bool,
        Option<String>,
        Option<String>,
        Option<String>,
        Option<String>,
    );

    let mut stmt = conn.prepare(&format!(
        "SELECT id, field_id, label, field_type, required, default_value, relation_target, \
         relation_cardinality, description \
         FROM {prefix}fields WHERE schema_id = ?1 ORDER BY position"
    ))?;
    let raw_rows: Vec<FieldRow> = stmt
        .query_map(params![schema_id.as_str()], |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
                row.get(7)?,
                row.get(8)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut fields = Vec::with_capacity(raw_rows.len());
    for (
        row_id,
        field_id,
        label,
        field_type,
        required,
        default_value,
        relation_target,
        relation_cardinality,
        description,
    ) in raw_rows
    {
        let options = load_options(conn, prefix, row_id)?;
        let default_value = default_value
            .as_deref()
            .map(serde_json::from_str::<Value>)
            .transpose()?;

        fields.push(Field {
            id: field_id.into(),
            label,
            field_type: string_to_field_type(&field_type)?,
            required,
            default_value,
            options: (!options.is_empty()).then_some(options),
            relation_target: relation_target.map(SchemaId::new),
            relation_cardinality: relation_cardinality
                .as_deref()
                .map(string_to_cardinality)
                .transpose()?,
            description,
        });
    }

    Ok(fields)
}

fn load_options(conn: &Connection, prefix: &str, field_row_id: i64) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT value FROM {prefix}field_options WHERE field_row_id = ?1 ORDER BY id"
    ))?;
    let rows = stmt.query_map(params![field_row_id], |row| row.get::<_, String>(0))?;
    let mut options = Vec::new();
    for row in rows {
        options.push(row?);
    }
    Ok(options)
}

/// Inserts or replaces an item row.
pub fn upsert_item(conn: &Connection, prefix: &str, item: &ContentItem) -> Result<()> {
    let data = serde_json::to_string(&item.data)?;
    conn.execute(
        &format!(
            "INSERT OR REPLACE INTO {prefix}items (id, schema_id, title, status, data, created_at, \
             updated_at, published_at, deleted_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
        ),
        params![
            item.id.as_str(),
            item.schema_id.as_str(),
            item.title,
            item.status.as_str(),
            data,
            format_time(&item.created_at),
            format_time(&item.updated_at),
            item.published_at.as_ref().map(format_time),
            item.deleted_at.as_ref().map(format_time),
        ],
    )?;
    Ok(())
}

type ItemRow = (
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
);

const ITEM_COLUMNS: &str =
    "id, schema_id, title, status, data, created_at, updated_at, published_at, deleted_at";

fn read_item_row(row: &Row<'_>) -> rusqlite::Result<ItemRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
    ))
}

fn item_from_row(row: ItemRow) -> Result<ContentItem> {
    let (id, schema_id, title, status, data, created_at, updated_at, published_at, deleted_at) =
        row;
    Ok(ContentItem {
        id: ItemId::new(id),
        schema_id: SchemaId::new(schema_id),
        title,
        status: string_to_status(&status)?,
        data: serde_json::from_str(&data)?,
        created_at: parse_time(&created_at)?,
        updated_at: parse_time(&updated_at)?,
        published_at: parse_optional_time(published_at)?,
        deleted_at: parse_optional_time(deleted_at)?,
    })
}

/// Loads an item by id.
pub fn load_item(conn: &Connection, prefix: &str, id: &ItemId) -> Result<Option<ContentItem>> {
    conn.query_row(
        &format!("SELECT {ITEM_COLUMNS} FROM {prefix}items WHERE id = ?1"),
        params![id.as_str()],
        read_item_row,
    )
    .optional()?
    .map(item_from_row)
    .transpose()
}

/// Loads every item of a schema, oldest first.
pub fn load_items_by_schema(
    conn: &Connection,
    prefix: &str,
    schema_id: &SchemaId,
) -> Result<Vec<ContentItem>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ITEM_COLUMNS} FROM {prefix}items WHERE schema_id = ?1 ORDER BY created_at, id"
    ))?;
    let rows: Vec<ItemRow> = stmt
        .query_map(params![schema_id.as_str()], read_item_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter().map(item_from_row).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::generate_schema_sql;
    use content_schema_core::ContentData;
    use serde_json::json;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        conn.execute_batch(&generate_schema_sql("t_").unwrap())
            .unwrap();
        conn
    }

    #[test]
    fn test_enum_string_round_trips() {
        for ty in FieldType::ALL {
            assert_eq!(string_to_field_type(ty.as_str()).unwrap(), ty);
        }
        for status in [
            ContentStatus::Draft,
            ContentStatus::PendingReview,
            ContentStatus::Published,
        ] {
            assert_eq!(string_to_status(status.as_str()).unwrap(), status);
        }
        assert!(string_to_kind("singleton").is_err());
        assert!(string_to_cardinality("some").is_err());
    }

    #[test]
    fn test_time_round_trip_keeps_micros() {
        let now = Utc::now();
        let parsed = parse_time(&format_time(&now)).unwrap();
        assert_eq!(parsed.timestamp_micros(), now.timestamp_micros());
        assert!(parse_time("yesterday").is_err());
    }

    #[test]
    fn test_schema_round_trip() {
        let conn = setup();
        let mut schema = Schema::new("Posts", SchemaKind::Collection)
            .with_id("posts")
            .with_field(Field::text("title", "Title").required().with_default(json!("Untitled")))
            .with_field(Field::enumeration("category", "Category", ["B", "A"]))
            .with_field(Field::relation(
                "related",
                "Related",
                "posts",
                RelationCardinality::Many,
            ));
        schema.version = 1;

        insert_schema_row(&conn, "t_", &schema).unwrap();
        let counts = insert_fields(&conn, "t_", &schema).unwrap();
        assert_eq!(counts.fields, 3);
        assert_eq!(counts.options, 2);

        let loaded = load_schema(&conn, "t_", &schema.id).unwrap().unwrap();
        assert_eq!(loaded.fields, schema.fields);
        assert_eq!(loaded.version, 1);
        assert_eq!(schema_version(&conn, "t_", &schema.id).unwrap(), Some(1));
    }

    #[test]
    fn test_update_schema_row_requires_expected_version() {
        let conn = setup();
        let mut schema = Schema::new("Posts", SchemaKind::Collection).with_id("posts");
        schema.version = 1;
        insert_schema_row(&conn, "t_", &schema).unwrap();

        schema.version = 2;
        assert_eq!(update_schema_row(&conn, "t_", &schema, 5).unwrap(), 0);
        assert_eq!(update_schema_row(&conn, "t_", &schema, 1).unwrap(), 1);
        assert_eq!(schema_version(&conn, "t_", &schema.id).unwrap(), Some(2));
    }

    #[test]
    fn test_item_round_trip() {
        let conn = setup();
        let mut data = ContentData::new();
        data.insert("title".into(), json!("Hello"));
        data.insert("tags".into(), json!(["a", "b"]));
        let mut item = ContentItem::new("posts".into(), "Hello", data);
        item.status = ContentStatus::Published;
        item.published_at = Some(item.created_at);

        upsert_item(&conn, "t_", &item).unwrap();
        let loaded = load_item(&conn, "t_", &item.id).unwrap().unwrap();
        assert_eq!(loaded.data, item.data);
        assert_eq!(loaded.status, ContentStatus::Published);
        assert!(loaded.published_at.is_some());

        assert_eq!(
            load_items_by_schema(&conn, "t_", &"posts".into()).unwrap().len(),
            1
        );
        assert!(load_item(&conn, "t_", &"missing".into()).unwrap().is_none());
    }
}
