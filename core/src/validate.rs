//! Schema definition validation.
//!
//! Validates structural invariants of a [`Schema`] before it is stored:
//! unique, non-empty field ids, well-formed enum and relation definitions,
//! and defaults that pass their own field's type check.
//!
//! Relation targets need a lookup against other schemas, so they are checked
//! separately by [`validate_relation_targets`] with a caller-supplied
//! predicate.
//!
//! # Examples
//!
//! ```
//! use content_schema_core::*;
//!
//! let schema = Schema::new("Blog Post", SchemaKind::Collection)
//!     .with_field(Field::text("title", "Title").required());
//! assert!(validate_schema(&schema).is_empty());
//!
//! // Duplicate field ids
//! let bad = Schema::new("Blog Post", SchemaKind::Collection)
//!     .with_field(Field::text("title", "Title"))
//!     .with_field(Field::text("title", "Headline"));
//! assert_eq!(
//!     validate_schema(&bad),
//!     vec![SchemaValidationError::DuplicateFieldId("title".into())]
//! );
//! ```

use std::collections::HashSet;

use thiserror::Error;

use crate::catalog::check_value;
use crate::{Field, FieldId, FieldType, Schema, SchemaId};

/// Schema definition validation errors.
///
/// Each variant names one structural problem. Validation collects every
/// problem it finds so a caller can present them together.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaValidationError {
    /// Schema name is empty or whitespace-only.
    #[error("schema name cannot be empty")]
    EmptySchemaName,
    /// A field has an empty id.
    #[error("field id cannot be empty")]
    EmptyFieldId,
    /// A field has an empty label.
    #[error("field {0} must have a label")]
    EmptyFieldLabel(FieldId),
    /// Two fields share an id.
    #[error("duplicate field id: {0}")]
    DuplicateFieldId(FieldId),
    /// An enum field has no options.
    #[error("enum field {0} must define at least one option")]
    EmptyEnumOptions(FieldId),
    /// An enum field lists the same option twice.
    #[error("enum field {field} lists option '{option}' more than once")]
    DuplicateEnumOption {
        /// Offending field.
        field: FieldId,
        /// Repeated option.
        option: String,
    },
    /// An enum default is not one of the options.
    #[error("default of enum field {field} is not one of its options: {value}")]
    DefaultNotAnOption {
        /// Offending field.
        field: FieldId,
        /// Rejected default.
        value: String,
    },
    /// A default value fails the field's own type check.
    #[error("default of field {field} is invalid: {reason}")]
    InvalidDefault {
        /// Offending field.
        field: FieldId,
        /// Type check failure.
        reason: String,
    },
    /// `options` set on a non-enum field.
    #[error("field {0} defines options but is not an enum")]
    OptionsOnNonEnum(FieldId),
    /// A relation field has no target schema.
    #[error("relation field {0} must name a target schema")]
    MissingRelationTarget(FieldId),
    /// A relation field targets a schema that does not exist or is archived.
    #[error("relation field {field} targets unknown schema {target}")]
    UnknownRelationTarget {
        /// Offending field.
        field: FieldId,
        /// Missing target.
        target: SchemaId,
    },
    /// Relation settings on a non-relation field.
    #[error("field {0} defines a relation target but is not a relation")]
    RelationSettingsOnNonRelation(FieldId),
}

/// Validates the structure of a schema.
///
/// Checks the schema name, field ids and labels, enum definitions, relation
/// settings, and explicit defaults. Relation targets are only checked for
/// presence here; see [`validate_relation_targets`] for existence.
pub fn validate_schema(schema: &Schema) -> Vec<SchemaValidationError> {
    let mut errors = Vec::new();

    if schema.name.trim().is_empty() {
        errors.push(SchemaValidationError::EmptySchemaName);
    }

    let mut seen: HashSet<&str> = HashSet::new();
    for field in &schema.fields {
        if field.id.is_blank() {
            errors.push(SchemaValidationError::EmptyFieldId);
            continue;
        }
        if !seen.insert(field.id.as_str()) {
            errors.push(SchemaValidationError::DuplicateFieldId(field.id.clone()));
        }
        errors.extend(validate_field(field));
    }

    errors
}

/// Validates a single field definition in isolation.
///
/// # Examples
///
/// ```
/// use content_schema_core::*;
///
/// let empty_enum = Field::new("category", "Category", FieldType::Enum);
/// assert_eq!(
///     validate_field(&empty_enum),
///     vec![SchemaValidationError::EmptyEnumOptions("category".into())]
/// );
/// ```
pub fn validate_field(field: &Field) -> Vec<SchemaValidationError> {
    let mut errors = Vec::new();

    if field.label.trim().is_empty() {
        errors.push(SchemaValidationError::EmptyFieldLabel(field.id.clone()));
    }

    match field.field_type {
        FieldType::Enum => {
            let options = field.option_values();
            if options.is_empty() {
                errors.push(SchemaValidationError::EmptyEnumOptions(field.id.clone()));
            }
            let mut seen_options = HashSet::new();
            for option in options {
                if !seen_options.insert(option.as_str()) {
                    errors.push(SchemaValidationError::DuplicateEnumOption {
                        field: field.id.clone(),
                        option: option.clone(),
                    });
                }
            }
        }
        _ if field.options.is_some() => {
            errors.push(SchemaValidationError::OptionsOnNonEnum(field.id.clone()));
        }
        _ => {}
    }

    match field.field_type {
        FieldType::Relation => {
            if field.relation_target.as_ref().is_none_or(SchemaId::is_blank) {
                errors.push(SchemaValidationError::MissingRelationTarget(
                    field.id.clone(),
                ));
            }
        }
        _ if field.relation_target.is_some() || field.relation_cardinality.is_some() => {
            errors.push(SchemaValidationError::RelationSettingsOnNonRelation(
                field.id.clone(),
            ));
        }
        _ => {}
    }

    if let Some(default) = field.default_value.as_ref().filter(|v| !v.is_null()) {
        if let Err(err) = check_value(field, default) {
            if field.field_type == FieldType::Enum {
                let value = default
                    .as_str()
                    .map(String::from)
                    .unwrap_or_else(|| default.to_string());
                errors.push(SchemaValidationError::DefaultNotAnOption {
                    field: field.id.clone(),
                    value,
                });
            } else {
                errors.push(SchemaValidationError::InvalidDefault {
                    field: field.id.clone(),
                    reason: err.to_string(),
                });
            }
        }
    }

    errors
}

/// Checks that every relation field targets a live schema.
///
/// `is_live` answers whether a schema id exists and is not archived. A field
/// targeting the schema being validated is always accepted, so schemas may
/// relate to themselves.
///
/// # Examples
///
/// ```
/// use content_schema_core::*;
///
/// let schema = Schema::new("Post", SchemaKind::Collection)
///     .with_id("posts")
///     .with_field(Field::relation("author", "Author", "people", RelationCardinality::One))
///     .with_field(Field::relation("related", "Related", "posts", RelationCardinality::Many));
///
/// assert!(validate_relation_targets(&schema, |id| id.as_str() == "people").is_empty());
/// assert_eq!(validate_relation_targets(&schema, |_| false).len(), 1);
/// ```
pub fn validate_relation_targets<F>(schema: &Schema, is_live: F) -> Vec<SchemaValidationError>
where
    F: Fn(&SchemaId) -> bool,
{
    schema
        .fields
        .iter()
        .filter(|f| f.field_type == FieldType::Relation)
        .filter_map(|field| {
            let target = field.relation_target.as_ref()?;
            if target.is_blank() || *target == schema.id || is_live(target) {
                return None;
            }
            Some(SchemaValidationError::UnknownRelationTarget {
                field: field.id.clone(),
                target: target.clone(),
            })
        })
        .collect()
}
