//! Type definitions for schema-driven content modeling.
//!
//! This module defines the data model shared by every other crate in the
//! workspace: schemas and their ordered field lists, content items, and the
//! small enums that drive lifecycle and migration behavior. The types
//! serialize to JSON objects with camelCase attribute names so that records
//! written by other clients of the same stores can be read back unchanged.

use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps an existing identifier.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Generates a fresh random identifier.
            pub fn generate() -> Self {
                Self(Uuid::new_v4().simple().to_string())
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns `true` if the identifier is empty or whitespace-only.
            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Identifier of a [`Schema`].
    SchemaId
);
string_id!(
    /// Identifier of a [`Field`]. Immutable once the field exists.
    FieldId
);
string_id!(
    /// Identifier of a [`ContentItem`].
    ItemId
);

/// Field values of a content item, keyed by field id.
///
/// A `BTreeMap` keeps serialization deterministic, so an item that is not
/// touched by an operation serializes to the same bytes before and after.
pub type ContentData = BTreeMap<FieldId, Value>;

/// Whether a schema describes many items or exactly one.
///
/// # Examples
///
/// ```
/// use content_schema_core::SchemaKind;
///
/// assert_eq!(SchemaKind::default(), SchemaKind::Collection);
/// assert_eq!("single".parse::<SchemaKind>(), Ok(SchemaKind::Single));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SchemaKind {
    /// Any number of items (blog posts, products).
    #[default]
    Collection,
    /// At most one non-deleted item (homepage, site settings).
    Single,
}

impl SchemaKind {
    /// Returns the storage/wire name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaKind::Collection => "collection",
            SchemaKind::Single => "single",
        }
    }
}

impl fmt::Display for SchemaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SchemaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "collection" => Ok(SchemaKind::Collection),
            "single" => Ok(SchemaKind::Single),
            other => Err(format!("unknown schema kind: {other}")),
        }
    }
}

/// The closed set of field types.
///
/// Every behavior that depends on the type of a field (defaults, value
/// checks, storage names) is an exhaustive `match` over this enum, so adding
/// a variant is a compile error everywhere it is not yet handled.
///
/// The legacy tags `markdown` and `image` deserialize to [`FieldType::Text`]
/// and [`FieldType::Asset`].
///
/// # Examples
///
/// ```
/// use content_schema_core::FieldType;
///
/// let t: FieldType = serde_json::from_str("\"markdown\"").unwrap();
/// assert_eq!(t, FieldType::Text);
/// assert_eq!(FieldType::ALL.len(), 8);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Plain text or markdown.
    #[serde(alias = "markdown")]
    Text,
    /// Finite number.
    Number,
    /// Exactly `true` or `false`.
    Boolean,
    /// RFC 3339 timestamp or `YYYY-MM-DD` date.
    Date,
    /// One of the field's `options`.
    Enum,
    /// Reference(s) to items of another (or the same) schema.
    Relation,
    /// Reference to an image or other stored asset.
    #[serde(alias = "image")]
    Asset,
    /// Arbitrary JSON.
    Json,
}

impl FieldType {
    /// All field types, in catalog order.
    pub const ALL: [FieldType; 8] = [
        FieldType::Text,
        FieldType::Number,
        FieldType::Boolean,
        FieldType::Date,
        FieldType::Enum,
        FieldType::Relation,
        FieldType::Asset,
        FieldType::Json,
    ];

    /// Returns the storage/wire tag of the type.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::Enum => "enum",
            FieldType::Relation => "relation",
            FieldType::Asset => "asset",
            FieldType::Json => "json",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FieldType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "markdown" => Ok(FieldType::Text),
            "number" => Ok(FieldType::Number),
            "boolean" => Ok(FieldType::Boolean),
            "date" => Ok(FieldType::Date),
            "enum" => Ok(FieldType::Enum),
            "relation" => Ok(FieldType::Relation),
            "asset" | "image" => Ok(FieldType::Asset),
            "json" => Ok(FieldType::Json),
            other => Err(format!("unknown field type: {other}")),
        }
    }
}

/// How many items a relation field points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RelationCardinality {
    /// A single item id.
    #[default]
    One,
    /// A list of item ids.
    Many,
}

impl RelationCardinality {
    /// Returns the storage/wire name of the cardinality.
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationCardinality::One => "one",
            RelationCardinality::Many => "many",
        }
    }
}

/// One typed slot within a schema.
///
/// The `id` is the key under which item data is stored and never changes;
/// the `label` is display-only and may be renamed freely.
///
/// # Examples
///
/// ```
/// use content_schema_core::{Field, FieldType, RelationCardinality};
///
/// let title = Field::text("title", "Title").required();
/// assert!(title.required);
///
/// let category = Field::enumeration("category", "Category", ["A", "B"]);
/// assert_eq!(category.options.as_deref(), Some(&["A".to_string(), "B".to_string()][..]));
///
/// let author = Field::relation("author", "Author", "people", RelationCardinality::One);
/// assert_eq!(author.field_type, FieldType::Relation);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    /// Immutable storage key.
    pub id: FieldId,
    /// Display label.
    pub label: String,
    /// Field type.
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Whether a non-empty value is required.
    #[serde(default)]
    pub required: bool,
    /// Explicit default, overriding the type default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    /// Allowed values (enum fields only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    /// Target schema (relation fields only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation_target: Option<SchemaId>,
    /// Cardinality (relation fields only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation_cardinality: Option<RelationCardinality>,
    /// Help text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Field {
    /// Creates an optional field of the given type.
    pub fn new(id: impl Into<FieldId>, label: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            field_type,
            required: false,
            default_value: None,
            options: None,
            relation_target: None,
            relation_cardinality: None,
            description: None,
        }
    }

    /// Creates a text field.
    pub fn text(id: impl Into<FieldId>, label: impl Into<String>) -> Self {
        Self::new(id, label, FieldType::Text)
    }

    /// Creates an enum field with the given options.
    pub fn enumeration<I, S>(id: impl Into<FieldId>, label: impl Into<String>, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut field = Self::new(id, label, FieldType::Enum);
        field.options = Some(options.into_iter().map(Into::into).collect());
        field
    }

    /// Creates a relation field pointing at `target`.
    pub fn relation(
        id: impl Into<FieldId>,
        label: impl Into<String>,
        target: impl Into<SchemaId>,
        cardinality: RelationCardinality,
    ) -> Self {
        let mut field = Self::new(id, label, FieldType::Relation);
        field.relation_target = Some(target.into());
        field.relation_cardinality = Some(cardinality);
        field
    }

    /// Marks the field as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Sets an explicit default value.
    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    /// Adds a description.
    pub fn with_description(mut self, desc: &str) -> Self {
        self.description = Some(desc.to_string());
        self
    }

    /// Returns the enum options, or an empty slice for other types.
    pub fn option_values(&self) -> &[String] {
        self.options.as_deref().unwrap_or(&[])
    }

    /// Returns the relation cardinality, defaulting to [`RelationCardinality::One`].
    pub fn cardinality(&self) -> RelationCardinality {
        self.relation_cardinality.unwrap_or_default()
    }
}

/// A named definition of a content shape.
///
/// `fields` order is significant: it is persisted as given and is the order
/// in which validation reports problems.
///
/// # Examples
///
/// ```
/// use content_schema_core::{Field, FieldType, Schema, SchemaKind};
///
/// let schema = Schema::new("Blog Post", SchemaKind::Collection)
///     .with_field(Field::text("title", "Title").required())
///     .with_field(Field::new("published", "Published", FieldType::Boolean));
///
/// assert_eq!(schema.fields.len(), 2);
/// assert!(schema.find_field("title").is_some());
/// assert!(!schema.is_archived());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    /// Schema identifier.
    pub id: SchemaId,
    /// Display name.
    pub name: String,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Collection or single.
    #[serde(default)]
    pub kind: SchemaKind,
    /// Active fields, in display order.
    #[serde(default)]
    pub fields: Vec<Field>,
    /// Set while the schema is archived.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<DateTime<Utc>>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
    /// Optimistic concurrency stamp. `0` means "never stored".
    #[serde(default)]
    pub version: u64,
}

impl Schema {
    /// Creates an unsaved schema with a fresh id and no fields.
    pub fn new(name: impl Into<String>, kind: SchemaKind) -> Self {
        let now = Utc::now();
        Self {
            id: SchemaId::generate(),
            name: name.into(),
            description: None,
            kind,
            fields: Vec::new(),
            archived_at: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// Replaces the generated id.
    pub fn with_id(mut self, id: impl Into<SchemaId>) -> Self {
        self.id = id.into();
        self
    }

    /// Adds a description.
    pub fn with_description(mut self, desc: &str) -> Self {
        self.description = Some(desc.to_string());
        self
    }

    /// Appends a field.
    pub fn with_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Finds an active field by id.
    pub fn find_field(&self, id: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.id.as_str() == id)
    }

    /// Returns the position of a field in the order, if active.
    pub fn field_position(&self, id: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.id.as_str() == id)
    }

    /// Returns the active field ids, in order.
    pub fn field_ids(&self) -> impl Iterator<Item = &FieldId> {
        self.fields.iter().map(|f| &f.id)
    }

    /// Returns `true` while the schema is archived.
    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }
}

/// Lifecycle state of a content item.
///
/// Parsing from a string accepts exactly the three named states; anything
/// else is rejected (see [`BusinessRuleError::UnknownStatus`](crate::BusinessRuleError::UnknownStatus)).
///
/// # Examples
///
/// ```
/// use content_schema_core::ContentStatus;
///
/// assert_eq!("pending_review".parse::<ContentStatus>().unwrap(), ContentStatus::PendingReview);
/// assert!("archived".parse::<ContentStatus>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ContentStatus {
    /// Work in progress (the default).
    #[default]
    Draft,
    /// Submitted for review.
    PendingReview,
    /// Live.
    Published,
}

impl ContentStatus {
    /// Returns the storage/wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentStatus::Draft => "draft",
            ContentStatus::PendingReview => "pending_review",
            ContentStatus::Published => "published",
        }
    }
}

impl fmt::Display for ContentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ContentStatus {
    type Err = crate::BusinessRuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "draft" => Ok(ContentStatus::Draft),
            "pending_review" | "pendingreview" => Ok(ContentStatus::PendingReview),
            "published" => Ok(ContentStatus::Published),
            _ => Err(crate::BusinessRuleError::UnknownStatus(s.to_string())),
        }
    }
}

/// One instance of data conforming to a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    /// Item identifier.
    pub id: ItemId,
    /// Schema the item belongs to.
    pub schema_id: SchemaId,
    /// Display title.
    #[serde(default)]
    pub title: String,
    /// Lifecycle state.
    #[serde(default)]
    pub status: ContentStatus,
    /// Field values keyed by field id.
    #[serde(default)]
    pub data: ContentData,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
    /// Time of the most recent publication.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    /// Set while the item is soft-deleted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ContentItem {
    /// Creates a draft item with a fresh id.
    pub fn new(schema_id: SchemaId, title: impl Into<String>, data: ContentData) -> Self {
        let now = Utc::now();
        Self {
            id: ItemId::generate(),
            schema_id,
            title: title.into(),
            status: ContentStatus::Draft,
            data,
            created_at: now,
            updated_at: now,
            published_at: None,
            deleted_at: None,
        }
    }

    /// Returns `true` while the item is soft-deleted.
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// What happens to stored item data when a field is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldMigrationPolicy {
    /// Remove the field's key from every item of the schema.
    Purge,
    /// Leave stored values in place; the field is only hidden.
    Retain,
}

/// Criteria for listing schemas.
///
/// The default filter matches every non-archived schema.
///
/// # Examples
///
/// ```
/// use content_schema_core::{Schema, SchemaFilter, SchemaKind};
///
/// let schema = Schema::new("Homepage", SchemaKind::Single)
///     .with_description("Landing page content");
///
/// assert!(SchemaFilter::default().matches(&schema));
/// assert!(SchemaFilter::default().with_text("landing").matches(&schema));
/// assert!(!SchemaFilter::default().with_kind(SchemaKind::Collection).matches(&schema));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaFilter {
    /// Only schemas of this kind.
    pub kind: Option<SchemaKind>,
    /// Case-insensitive substring of the name or description.
    pub text: Option<String>,
    /// Include archived schemas.
    pub include_archived: bool,
}

impl SchemaFilter {
    /// Restricts to one kind.
    pub fn with_kind(mut self, kind: SchemaKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Restricts to schemas whose name or description contains `text`.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Includes archived schemas.
    pub fn including_archived(mut self) -> Self {
        self.include_archived = true;
        self
    }

    /// Returns `true` if `schema` satisfies every criterion.
    pub fn matches(&self, schema: &Schema) -> bool {
        if !self.include_archived && schema.is_archived() {
            return false;
        }
        if let Some(kind) = self.kind {
            if schema.kind != kind {
                return false;
            }
        }
        if let Some(text) = self.text.as_deref() {
            let needle = text.trim().to_lowercase();
            if needle.is_empty() {
                return true;
            }
            let in_name = schema.name.to_lowercase().contains(&needle);
            let in_description = schema
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&needle));
            if !in_name && !in_description {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_serializes_with_camel_case_keys() {
        let schema = Schema::new("Blog Post", SchemaKind::Collection)
            .with_id("blog")
            .with_field(Field::enumeration("category", "Category", ["A", "B"]).required());
        let json = serde_json::to_value(&schema).unwrap();

        assert_eq!(json["id"], "blog");
        assert_eq!(json["kind"], "collection");
        assert!(json.get("createdAt").is_some());
        assert!(json.get("archivedAt").is_none());
        assert_eq!(json["fields"][0]["type"], "enum");
        assert_eq!(json["fields"][0]["options"], serde_json::json!(["A", "B"]));
    }

    #[test]
    fn test_field_legacy_type_aliases() {
        let json = serde_json::json!({ "id": "body", "label": "Body", "type": "markdown" });
        let field: Field = serde_json::from_value(json).unwrap();
        assert_eq!(field.field_type, FieldType::Text);

        let json = serde_json::json!({ "id": "hero", "label": "Hero", "type": "image" });
        let field: Field = serde_json::from_value(json).unwrap();
        assert_eq!(field.field_type, FieldType::Asset);
    }

    #[test]
    fn test_status_rejects_unknown_values() {
        assert_eq!(
            "Pending-Review".parse::<ContentStatus>().unwrap(),
            ContentStatus::PendingReview
        );
        assert!("archived".parse::<ContentStatus>().is_err());
        assert!(serde_json::from_str::<ContentStatus>("\"scheduled\"").is_err());
    }

    #[test]
    fn test_filter_excludes_archived_by_default() {
        let mut schema = Schema::new("Old", SchemaKind::Collection);
        schema.archived_at = Some(Utc::now());

        assert!(!SchemaFilter::default().matches(&schema));
        assert!(SchemaFilter::default().including_archived().matches(&schema));
    }

    #[test]
    fn test_content_data_lookup_by_str() {
        let mut data = ContentData::new();
        data.insert(FieldId::from("title"), Value::from("Hello"));
        assert_eq!(data.get("title"), Some(&Value::from("Hello")));
    }
}
