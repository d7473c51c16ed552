//! Core types, field type catalog, and validation for schema-driven content.
//!
//! This crate defines the data model and every pure rule of the content
//! engine:
//!
//! - [`Schema`]: a named, ordered list of [`Field`]s of kind
//!   [`SchemaKind::Collection`] or [`SchemaKind::Single`].
//! - [`Field`]: a typed slot with an immutable [`FieldId`] and a mutable
//!   label; its [`FieldType`] is one of a closed set of eight.
//! - [`ContentItem`]: data keyed by field id, with a [`ContentStatus`].
//!
//! The field type catalog ([`check_value`], [`default_value`]) decides which
//! values a field accepts and what it defaults to. Schema definitions are
//! checked by [`validate_schema`]; item payloads by [`validate_content`].
//! Business rules ([`check_field_order`], [`TransitionPolicy`]) report
//! [`BusinessRuleError`]s.
//!
//! Nothing here performs I/O; storage and orchestration live in the
//! `content-schema-db` and `content-schema-engine` crates.
//!
//! # Example
//!
//! ```
//! use content_schema_core::*;
//! use serde_json::json;
//!
//! let schema = Schema::new("Blog Post", SchemaKind::Collection)
//!     .with_field(Field::text("title", "Title").required())
//!     .with_field(Field::enumeration("category", "Category", ["A", "B"]));
//! assert!(validate_schema(&schema).is_empty());
//!
//! let mut data = ContentData::new();
//! data.insert("title".into(), json!("x"));
//! data.insert("category".into(), json!("C"));
//!
//! let err = validate_content(&schema, &data, chrono::Utc::now()).unwrap_err();
//! assert_eq!(err.field_ids(), vec![&FieldId::from("category")]);
//! ```

mod catalog;
mod content;
mod rules;
mod types;
mod validate;

pub use catalog::{
    FieldError, check_value, default_value, is_empty_value, json_kind, relation_ids, type_default,
};
pub use content::{
    ContentValidationError, FieldViolation, ViolationKind, unknown_keys, validate_content,
};
pub use rules::{
    AnyTransition, BusinessRuleError, ReviewWorkflow, TransitionPolicy, check_field_order,
    check_transition,
};
pub use types::*;
pub use validate::{
    SchemaValidationError, validate_field, validate_relation_targets, validate_schema,
};
