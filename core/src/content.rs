//! Content data validation against a schema's active fields.
//!
//! [`validate_content`] walks the schema's fields in order, collects every
//! missing required field and every value that fails its type check, and
//! returns either the normalized data or a [`ContentValidationError`] listing
//! all offending fields at once.
//!
//! # Examples
//!
//! ```
//! use content_schema_core::*;
//! use serde_json::json;
//!
//! let schema = Schema::new("Blog Post", SchemaKind::Collection)
//!     .with_field(Field::text("title", "Title").required())
//!     .with_field(Field::new("published", "Published", FieldType::Boolean));
//!
//! let err = validate_content(&schema, &ContentData::new(), chrono::Utc::now()).unwrap_err();
//! assert_eq!(err.field_ids(), vec![&FieldId::from("title")]);
//!
//! let mut data = ContentData::new();
//! data.insert("title".into(), json!("Hello"));
//! let normalized = validate_content(&schema, &data, chrono::Utc::now()).unwrap();
//! assert_eq!(normalized.get("published"), Some(&json!(false)));
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::catalog::{FieldError, check_value, default_value, is_empty_value};
use crate::{ContentData, FieldId, Schema};

/// Why a single field of a payload was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViolationKind {
    /// Required field absent or empty.
    Missing,
    /// Value failed the field's type check.
    Invalid(FieldError),
    /// Relation value points at items that do not exist.
    DanglingRelation(Vec<String>),
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationKind::Missing => f.write_str("required value is missing"),
            ViolationKind::Invalid(err) => write!(f, "{err}"),
            ViolationKind::DanglingRelation(ids) => {
                write!(f, "referenced items not found: {}", ids.join(", "))
            }
        }
    }
}

/// A rejected field and the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    /// Offending field.
    pub field_id: FieldId,
    /// Reason.
    pub kind: ViolationKind,
}

impl FieldViolation {
    /// Creates a violation for `field_id`.
    pub fn new(field_id: FieldId, kind: ViolationKind) -> Self {
        Self { field_id, kind }
    }
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field_id, self.kind)
    }
}

/// A payload did not conform to its schema.
///
/// Carries every offending field, in schema field order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("content validation failed: {}", format_violations(.violations))]
pub struct ContentValidationError {
    /// Offending fields, in schema order.
    pub violations: Vec<FieldViolation>,
}

impl ContentValidationError {
    /// Returns the offending field ids, in schema order.
    pub fn field_ids(&self) -> Vec<&FieldId> {
        self.violations.iter().map(|v| &v.field_id).collect()
    }

    /// Returns the ids of required fields that were missing.
    pub fn missing(&self) -> Vec<&FieldId> {
        self.violations
            .iter()
            .filter(|v| v.kind == ViolationKind::Missing)
            .map(|v| &v.field_id)
            .collect()
    }

    /// Adds violations found by a later check and restores schema order.
    pub fn merge(&mut self, schema: &Schema, more: Vec<FieldViolation>) {
        self.violations.extend(more);
        self.violations.sort_by_key(|v| {
            schema
                .field_position(v.field_id.as_str())
                .unwrap_or(usize::MAX)
        });
    }
}

fn format_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Validates `data` against the active fields of `schema`.
///
/// For each field, in order:
///
/// - a required field whose value is absent or empty is reported missing;
/// - an optional field whose value is absent or empty receives its default;
/// - any other value must pass the field's type check and is normalized.
///
/// Keys that are not active field ids are dropped from the output. The
/// function is idempotent: validating its own output returns the same data.
///
/// `now` supplies the default for date fields.
///
/// # Errors
///
/// Returns a [`ContentValidationError`] listing every missing or invalid
/// field.
pub fn validate_content(
    schema: &Schema,
    data: &ContentData,
    now: DateTime<Utc>,
) -> Result<ContentData, ContentValidationError> {
    let mut normalized = ContentData::new();
    let mut violations = Vec::new();

    for field in &schema.fields {
        match data.get(field.id.as_str()).filter(|v| !is_empty_value(v)) {
            None if field.required => {
                violations.push(FieldViolation::new(field.id.clone(), ViolationKind::Missing));
            }
            None => {
                normalized.insert(field.id.clone(), default_value(field, now));
            }
            Some(value) => match check_value(field, value) {
                Ok(value) => {
                    normalized.insert(field.id.clone(), value);
                }
                Err(err) => {
                    violations.push(FieldViolation::new(
                        field.id.clone(),
                        ViolationKind::Invalid(err),
                    ));
                }
            },
        }
    }

    if violations.is_empty() {
        Ok(normalized)
    } else {
        Err(ContentValidationError { violations })
    }
}

/// Returns the keys of `data` that are not active fields of `schema`.
pub fn unknown_keys<'a>(schema: &Schema, data: &'a ContentData) -> Vec<&'a FieldId> {
    data.keys()
        .filter(|key| schema.find_field(key.as_str()).is_none())
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{Field, FieldType, SchemaKind};

    fn blog_schema() -> Schema {
        Schema::new("Blog Post", SchemaKind::Collection)
            .with_field(Field::text("title", "Title").required())
            .with_field(Field::new("published", "Published", FieldType::Boolean))
            .with_field(Field::enumeration("category", "Category", ["A", "B"]))
    }

    fn data(pairs: &[(&str, serde_json::Value)]) -> ContentData {
        pairs
            .iter()
            .map(|(k, v)| (FieldId::from(*k), v.clone()))
            .collect()
    }

    #[test]
    fn test_missing_required_field() {
        let err = validate_content(&blog_schema(), &ContentData::new(), Utc::now()).unwrap_err();
        assert_eq!(err.field_ids(), vec![&FieldId::from("title")]);
        assert_eq!(err.missing(), vec![&FieldId::from("title")]);
    }

    #[test]
    fn test_whitespace_title_counts_as_missing() {
        let err = validate_content(&blog_schema(), &data(&[("title", json!("   "))]), Utc::now())
            .unwrap_err();
        assert_eq!(err.missing(), vec![&FieldId::from("title")]);
    }

    #[test]
    fn test_unknown_enum_option() {
        let err = validate_content(
            &blog_schema(),
            &data(&[("title", json!("x")), ("category", json!("C"))]),
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(err.field_ids(), vec![&FieldId::from("category")]);
        assert_eq!(
            err.violations[0].kind,
            ViolationKind::Invalid(FieldError::UnknownOption("C".into()))
        );
    }

    #[test]
    fn test_reports_all_problems_in_field_order() {
        let err = validate_content(
            &blog_schema(),
            &data(&[("published", json!("yes")), ("category", json!("Z"))]),
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(
            err.field_ids(),
            vec![
                &FieldId::from("title"),
                &FieldId::from("published"),
                &FieldId::from("category"),
            ]
        );
    }

    #[test]
    fn test_defaults_fill_optional_fields() {
        let normalized =
            validate_content(&blog_schema(), &data(&[("title", json!("x"))]), Utc::now()).unwrap();
        assert_eq!(normalized.get("published"), Some(&json!(false)));
        assert_eq!(normalized.get("category"), Some(&json!("A")));
    }

    #[test]
    fn test_unknown_keys_are_dropped() {
        let input = data(&[("title", json!("x")), ("legacy", json!(1))]);
        assert_eq!(unknown_keys(&blog_schema(), &input), vec![&FieldId::from("legacy")]);

        let normalized = validate_content(&blog_schema(), &input, Utc::now()).unwrap();
        assert!(!normalized.contains_key("legacy"));
    }

    #[test]
    fn test_validate_is_idempotent() {
        let schema = blog_schema()
            .with_field(Field::new("price", "Price", FieldType::Number))
            .with_field(Field::new("date", "Date", FieldType::Date));
        let input = data(&[("title", json!("x")), ("price", json!("12"))]);

        let once = validate_content(&schema, &input, Utc::now()).unwrap();
        let twice = validate_content(&schema, &once, Utc::now()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_merge_restores_field_order() {
        let schema = blog_schema();
        let mut err = ContentValidationError {
            violations: vec![FieldViolation::new("category".into(), ViolationKind::Missing)],
        };
        err.merge(
            &schema,
            vec![FieldViolation::new("title".into(), ViolationKind::Missing)],
        );
        assert_eq!(
            err.field_ids(),
            vec![&FieldId::from("title"), &FieldId::from("category")]
        );
    }
}
