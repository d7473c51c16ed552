//! Snapshot bundles of schemas and content items.
//!
//! A [`Snapshot`] is the on-disk exchange format of the engine: the local
//! store persists itself as one, and the SQLite migration seeds from one.
//!
//! # Loading patterns
//!
//! ```no_run
//! use content_schema_db::Snapshot;
//!
//! // A single snapshot (or legacy item) file
//! let snapshot = Snapshot::from_file("content.json").unwrap();
//!
//! // A directory of JSON documents, merged in file-name order
//! let snapshot = Snapshot::from_dir("fixtures/").unwrap();
//!
//! // Either of the above, picked by path type
//! let snapshot = Snapshot::load("fixtures/").unwrap();
//! println!("{} schemas, {} items", snapshot.schemas.len(), snapshot.items.len());
//! ```

use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use content_schema_core::{ContentItem, Schema};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::Result;
use crate::ingest::parse_document;

/// A self-contained set of schemas and items.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Schema definitions.
    #[serde(default)]
    pub schemas: Vec<Schema>,
    /// Content items, including soft-deleted ones.
    #[serde(default)]
    pub items: Vec<ContentItem>,
}

impl Snapshot {
    /// Creates an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the snapshot holds neither schemas nor items.
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty() && self.items.is_empty()
    }

    /// Interprets a parsed JSON document, normalizing legacy items.
    ///
    /// See [`parse_document`](crate::parse_document) for accepted shapes.
    pub fn from_value(value: Value) -> Result<Self> {
        parse_document(value)
    }

    /// Loads a snapshot from a single JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::IoError`](crate::StoreError::IoError) if the
    /// file cannot be read, [`StoreError::JsonError`](crate::StoreError::JsonError)
    /// if it is not valid JSON, or
    /// [`StoreError::InvalidSnapshot`](crate::StoreError::InvalidSnapshot) if
    /// the document has an unrecognized shape.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        let reader = BufReader::new(file);
        let value: Value = serde_json::from_reader(reader)?;
        Self::from_value(value)
    }

    /// Loads and merges every `*.json` file in a directory.
    ///
    /// Files are read in file-name order so later files win on id clashes
    /// when the snapshot is applied.
    pub fn from_dir(path: impl AsRef<Path>) -> Result<Self> {
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(path.as_ref())? {
            let file_path = entry?.path();
            if file_path.extension().and_then(|e| e.to_str()) == Some("json") {
                paths.push(file_path);
            }
        }
        paths.sort();

        let mut snapshot = Self::new();
        for file_path in paths {
            debug!(path = %file_path.display(), "Loading snapshot document");
            snapshot.extend(Self::from_file(&file_path)?);
        }
        Ok(snapshot)
    }

    /// Loads from a directory or a file, whichever `path` is.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.is_dir() {
            Self::from_dir(path)
        } else {
            Self::from_file(path)
        }
    }

    /// Writes the snapshot as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    /// Appends the contents of another snapshot.
    pub fn extend(&mut self, other: Snapshot) {
        self.schemas.extend(other.schemas);
        self.items.extend(other.items);
    }
}

#[cfg(test)]
mod tests {
    use content_schema_core::{ContentData, Field, SchemaKind};
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    fn sample() -> Snapshot {
        let schema = Schema::new("Posts", SchemaKind::Collection)
            .with_id("posts")
            .with_field(Field::text("title", "Title").required());
        let mut data = ContentData::new();
        data.insert("title".into(), json!("Hello"));
        let item = ContentItem::new(schema.id.clone(), "Hello", data);
        Snapshot {
            schemas: vec![schema],
            items: vec![item],
        }
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("snapshot.json");
        let original = sample();
        original.save(&path).unwrap();

        let loaded = Snapshot::from_file(&path).unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_from_dir_merges_documents() {
        let dir = TempDir::new().unwrap();
        let snapshot = sample();
        std::fs::write(
            dir.path().join("a-schema.json"),
            serde_json::to_string(&snapshot.schemas[0]).unwrap(),
        )
        .unwrap();
        std::fs::write(
            dir.path().join("b-items.json"),
            json!([{ "id": "legacy", "schema_id": "posts", "content": { "title": "Old" } }])
                .to_string(),
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let loaded = Snapshot::load(dir.path()).unwrap();
        assert_eq!(loaded.schemas.len(), 1);
        assert_eq!(loaded.items.len(), 1);
        assert_eq!(loaded.items[0].data.get("title"), Some(&json!("Old")));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = Snapshot::from_file("/nonexistent/snapshot.json");
        assert!(matches!(result, Err(crate::StoreError::IoError(_))));
    }

    #[test]
    fn test_extend_and_is_empty() {
        let mut snapshot = Snapshot::new();
        assert!(snapshot.is_empty());
        snapshot.extend(sample());
        assert!(!snapshot.is_empty());
        assert_eq!(snapshot.items.len(), 1);
    }
}
