//! Field type catalog: per-type defaults and value checks.
//!
//! Every function here is pure. [`check_value`] either returns the
//! normalized value for a field or a [`FieldError`] describing why the value
//! does not fit; [`default_value`] derives the value used when an optional
//! field is left empty.
//!
//! # Examples
//!
//! ```
//! use content_schema_core::*;
//! use serde_json::json;
//!
//! let price = Field::new("price", "Price", FieldType::Number);
//! assert_eq!(check_value(&price, &json!("19.5")), Ok(json!(19.5)));
//! assert!(check_value(&price, &json!("cheap")).is_err());
//!
//! let category = Field::enumeration("category", "Category", ["A", "B"]);
//! assert_eq!(default_value(&category, chrono::Utc::now()), json!("A"));
//! ```

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde_json::{Map, Number, Value};
use thiserror::Error;

use crate::{Field, FieldType, RelationCardinality};

/// Why a value was rejected by a field's type check.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    /// The JSON value has the wrong shape for the field type.
    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        /// What the field type accepts.
        expected: &'static str,
        /// What was supplied.
        found: &'static str,
    },
    /// A number field received something that is not a finite number.
    #[error("not a finite number: {0}")]
    InvalidNumber(String),
    /// A date field received an unparseable date.
    #[error("not an RFC 3339 timestamp or YYYY-MM-DD date: {0}")]
    InvalidDate(String),
    /// An enum field received a value outside its options.
    #[error("'{0}' is not one of the allowed options")]
    UnknownOption(String),
    /// A relation or asset field received an empty reference.
    #[error("reference ids cannot be empty")]
    EmptyReference,
}

/// Returns a short name for the JSON shape of `value`, used in messages.
pub fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Returns `true` for values that count as "not supplied".
///
/// `null`, whitespace-only strings, and empty lists are empty. `false`, `0`,
/// and `{}` are real values.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Bool(_) | Value::Number(_) | Value::Object(_) => false,
    }
}

/// Returns the type default for `field_type`, ignoring any explicit default.
pub fn type_default(field: &Field, now: DateTime<Utc>) -> Value {
    match field.field_type {
        FieldType::Text => Value::String(String::new()),
        FieldType::Number => Value::from(0),
        FieldType::Boolean => Value::Bool(false),
        FieldType::Date => Value::String(now.to_rfc3339_opts(SecondsFormat::Secs, true)),
        FieldType::Enum => Value::String(field.option_values().first().cloned().unwrap_or_default()),
        FieldType::Relation => Value::Null,
        FieldType::Asset => Value::Null,
        FieldType::Json => Value::Object(Map::new()),
    }
}

/// Returns the value used when an optional field is left empty.
///
/// An explicit, non-null `defaultValue` on the field wins over the type
/// default.
pub fn default_value(field: &Field, now: DateTime<Utc>) -> Value {
    match &field.default_value {
        Some(value) if !value.is_null() => value.clone(),
        _ => type_default(field, now),
    }
}

/// Checks `value` against `field` and returns the normalized value.
///
/// Normalization is limited to numeric strings on number fields, which
/// become JSON numbers; every other accepted value is returned unchanged.
/// Checking a normalized value again returns it unchanged.
///
/// Relation values are only checked for shape here. Whether the referenced
/// items exist is decided by the relation resolver.
///
/// # Errors
///
/// Returns a [`FieldError`] describing the first problem with the value.
pub fn check_value(field: &Field, value: &Value) -> Result<Value, FieldError> {
    match field.field_type {
        FieldType::Text => expect_string(value).map(|_| value.clone()),
        FieldType::Number => check_number(value),
        FieldType::Boolean => match value {
            Value::Bool(_) => Ok(value.clone()),
            other => Err(mismatch("boolean", other)),
        },
        FieldType::Date => {
            let raw = expect_string(value)?;
            if is_valid_date(raw) {
                Ok(value.clone())
            } else {
                Err(FieldError::InvalidDate(raw.to_string()))
            }
        }
        FieldType::Enum => {
            let raw = expect_string(value)?;
            if field.option_values().iter().any(|o| o == raw) {
                Ok(value.clone())
            } else {
                Err(FieldError::UnknownOption(raw.to_string()))
            }
        }
        FieldType::Relation => check_reference_shape(field.cardinality(), value),
        FieldType::Asset => {
            let raw = expect_string(value)?;
            if raw.trim().is_empty() {
                Err(FieldError::EmptyReference)
            } else {
                Ok(value.clone())
            }
        }
        FieldType::Json => Ok(value.clone()),
    }
}

/// Extracts the referenced item ids from a relation value.
///
/// Returns an empty list for `null`. Values of the wrong shape yield the ids
/// that could be read; callers should run [`check_value`] first.
pub fn relation_ids(value: &Value) -> Vec<&str> {
    match value {
        Value::String(id) => vec![id.as_str()],
        Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

fn check_number(value: &Value) -> Result<Value, FieldError> {
    match value {
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.is_finite() => Ok(value.clone()),
            _ => Err(FieldError::InvalidNumber(n.to_string())),
        },
        Value::String(raw) => {
            let trimmed = raw.trim();
            if let Ok(int) = trimmed.parse::<i64>() {
                return Ok(Value::from(int));
            }
            trimmed
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| FieldError::InvalidNumber(raw.clone()))
        }
        other => Err(mismatch("number", other)),
    }
}

fn check_reference_shape(
    cardinality: RelationCardinality,
    value: &Value,
) -> Result<Value, FieldError> {
    match cardinality {
        RelationCardinality::One => {
            let id = expect_string(value)?;
            if id.trim().is_empty() {
                return Err(FieldError::EmptyReference);
            }
            Ok(value.clone())
        }
        RelationCardinality::Many => {
            let Value::Array(items) = value else {
                return Err(mismatch("list of item ids", value));
            };
            for item in items {
                let id = expect_string(item)?;
                if id.trim().is_empty() {
                    return Err(FieldError::EmptyReference);
                }
            }
            Ok(value.clone())
        }
    }
}

fn is_valid_date(raw: &str) -> bool {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw).is_ok() || NaiveDate::parse_from_str(raw, "%Y-%m-%d").is_ok()
}

fn expect_string(value: &Value) -> Result<&str, FieldError> {
    value.as_str().ok_or_else(|| mismatch("string", value))
}

fn mismatch(expected: &'static str, found: &Value) -> FieldError {
    FieldError::TypeMismatch {
        expected,
        found: json_kind(found),
    }
}
