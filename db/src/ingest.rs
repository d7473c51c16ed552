//! Normalization of stored records at the storage boundary.
//!
//! Older clients wrote content items with the payload under `content`
//! instead of `data`, and with snake_case attribute names. Everything read
//! from outside the process passes through [`normalize_legacy_item`] so the
//! rest of the engine only ever sees the canonical shape.
//!
//! # Examples
//!
//! ```
//! use content_schema_db::normalize_legacy_item;
//! use serde_json::json;
//!
//! let legacy = json!({
//!     "id": "i1",
//!     "schema_id": "posts",
//!     "title": "Hello",
//!     "content": { "title": "Hello" },
//!     "created_at": "2024-01-01T00:00:00Z",
//!     "updated_at": "2024-01-01T00:00:00Z"
//! });
//! let item = normalize_legacy_item(legacy).unwrap();
//! assert_eq!(item.schema_id.as_str(), "posts");
//! assert!(item.data.contains_key("title"));
//! ```

use chrono::{SecondsFormat, Utc};
use content_schema_core::ContentItem;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::snapshot::Snapshot;

/// Legacy snake_case attribute names and their canonical replacements.
const LEGACY_KEYS: &[(&str, &str)] = &[
    ("schema_id", "schemaId"),
    ("created_at", "createdAt"),
    ("updated_at", "updatedAt"),
    ("published_at", "publishedAt"),
    ("deleted_at", "deletedAt"),
];

/// Rewrites a stored item object into the canonical shape and parses it.
///
/// - `content` becomes `data`; when both are present, `data` wins and
///   `content` is discarded.
/// - snake_case timestamp and schema keys become camelCase.
/// - missing `createdAt`/`updatedAt` are filled with the current time.
///
/// # Errors
///
/// Returns [`StoreError::InvalidSnapshot`] if `value` is not an object, or
/// [`StoreError::JsonError`] if the normalized object is not a valid item.
pub fn normalize_legacy_item(value: Value) -> Result<ContentItem> {
    let Value::Object(mut object) = value else {
        return Err(StoreError::InvalidSnapshot(
            "content item must be a JSON object".to_string(),
        ));
    };

    if let Some(content) = object.remove("content") {
        if object.contains_key("data") {
            debug!("Discarding legacy `content` key shadowed by `data`");
        } else {
            object.insert("data".to_string(), content);
        }
    }

    for (legacy, canonical) in LEGACY_KEYS {
        if let Some(value) = object.remove(*legacy) {
            object.entry(canonical.to_string()).or_insert(value);
        }
    }

    let now = Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true));
    if !object.contains_key("createdAt") {
        object.insert("createdAt".to_string(), now.clone());
    }
    if !object.contains_key("updatedAt") {
        let created = object.get("createdAt").cloned().unwrap_or(now);
        object.insert("updatedAt".to_string(), created);
    }

    Ok(serde_json::from_value(Value::Object(object))?)
}

/// Interprets an arbitrary JSON document as a [`Snapshot`].
///
/// Accepted shapes:
///
/// - a snapshot object with `schemas` and/or `items` arrays;
/// - a single schema object (has `fields`);
/// - a single item object (has `schemaId` or `schema_id`);
/// - an array of item objects.
///
/// # Errors
///
/// Returns [`StoreError::InvalidSnapshot`] for any other shape.
pub fn parse_document(value: Value) -> Result<Snapshot> {
    match value {
        Value::Array(items) => Ok(Snapshot {
            schemas: Vec::new(),
            items: normalize_items(items)?,
        }),
        Value::Object(object) if is_snapshot(&object) => parse_snapshot_object(object),
        Value::Object(object) if object.contains_key("fields") => Ok(Snapshot {
            schemas: vec![serde_json::from_value(Value::Object(object))?],
            items: Vec::new(),
        }),
        Value::Object(object)
            if object.contains_key("schemaId") || object.contains_key("schema_id") =>
        {
            Ok(Snapshot {
                schemas: Vec::new(),
                items: vec![normalize_legacy_item(Value::Object(object))?],
            })
        }
        other => Err(StoreError::InvalidSnapshot(format!(
            "unrecognized document shape: {}",
            content_schema_core::json_kind(&other)
        ))),
    }
}

fn is_snapshot(object: &Map<String, Value>) -> bool {
    object.contains_key("schemas") || object.contains_key("items")
}

fn parse_snapshot_object(mut object: Map<String, Value>) -> Result<Snapshot> {
    let schemas = match object.remove("schemas") {
        Some(value) => serde_json::from_value(value)?,
        None => Vec::new(),
    };
    let items = match object.remove("items") {
        Some(Value::Array(items)) => normalize_items(items)?,
        Some(Value::Null) | None => Vec::new(),
        Some(_) => {
            return Err(StoreError::InvalidSnapshot(
                "`items` must be an array".to_string(),
            ));
        }
    };
    Ok(Snapshot { schemas, items })
}

fn normalize_items(items: Vec<Value>) -> Result<Vec<ContentItem>> {
    items.into_iter().map(normalize_legacy_item).collect()
}
