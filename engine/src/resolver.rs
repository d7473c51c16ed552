//! Relation resolution.
//!
//! [`RelationResolver`] turns the value of a relation field into the items
//! it references. Resolution is read-only. An id counts as resolved only if
//! an item with that id exists, belongs to the field's target schema, and is
//! not soft-deleted. With `many` cardinality every id must resolve; there
//! are no partial results.

use content_schema_core::{
    ContentItem, Field, FieldError, FieldId, FieldType, check_value, relation_ids,
};
use content_schema_db::{ContentItemStore, StoreError};
use serde_json::Value;
use thiserror::Error;

/// Items referenced by a relation value.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedReference {
    /// The value was `null`.
    Empty,
    /// A `one` relation.
    One(ContentItem),
    /// A `many` relation, in the order the ids were listed.
    Many(Vec<ContentItem>),
}

impl ResolvedReference {
    /// Returns the resolved items.
    pub fn items(&self) -> Vec<&ContentItem> {
        match self {
            ResolvedReference::Empty => Vec::new(),
            ResolvedReference::One(item) => vec![item],
            ResolvedReference::Many(items) => items.iter().collect(),
        }
    }

    /// Returns `true` if nothing is referenced.
    pub fn is_empty(&self) -> bool {
        match self {
            ResolvedReference::Empty => true,
            ResolvedReference::One(_) => false,
            ResolvedReference::Many(items) => items.is_empty(),
        }
    }
}

/// Why a relation value could not be resolved.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// One or more referenced items do not exist in the target schema.
    #[error("field {field} references missing item(s): {}", .missing.join(", "))]
    TargetNotFound {
        /// Relation field.
        field: FieldId,
        /// Ids that did not resolve, in the order listed.
        missing: Vec<String>,
    },

    /// The value has the wrong shape for the field, or the field is not a
    /// relation.
    #[error("field {field}: {reason}")]
    InvalidReference {
        /// Field being resolved.
        field: FieldId,
        /// Shape problem.
        reason: FieldError,
    },

    /// The item store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Resolves relation values against a [`ContentItemStore`].
pub struct RelationResolver<'a, I> {
    items: &'a I,
}

impl<'a, I: ContentItemStore> RelationResolver<'a, I> {
    /// Creates a resolver reading from `items`.
    pub fn new(items: &'a I) -> Self {
        Self { items }
    }

    /// Resolves `value` for the relation field `field`.
    ///
    /// # Errors
    ///
    /// - [`ResolveError::InvalidReference`] if `field` is not a relation or
    ///   `value` has the wrong shape for its cardinality.
    /// - [`ResolveError::TargetNotFound`] listing every id that did not
    ///   resolve.
    /// - [`ResolveError::Store`] if the store fails.
    pub fn resolve(&self, field: &Field, value: &Value) -> Result<ResolvedReference, ResolveError> {
        if field.field_type != FieldType::Relation {
            return Err(ResolveError::InvalidReference {
                field: field.id.clone(),
                reason: FieldError::TypeMismatch {
                    expected: "relation field",
                    found: field.field_type.as_str(),
                },
            });
        }
        if value.is_null() {
            return Ok(ResolvedReference::Empty);
        }
        check_value(field, value).map_err(|reason| ResolveError::InvalidReference {
            field: field.id.clone(),
            reason,
        })?;

        let mut found = Vec::new();
        let mut missing = Vec::new();
        for id in relation_ids(value) {
            match self.lookup(field, id)? {
                Some(item) => found.push(item),
                None => missing.push(id.to_string()),
            }
        }

        if !missing.is_empty() {
            return Err(ResolveError::TargetNotFound {
                field: field.id.clone(),
                missing,
            });
        }

        match value {
            Value::Array(_) => Ok(ResolvedReference::Many(found)),
            _ => Ok(found
                .pop()
                .map_or(ResolvedReference::Empty, ResolvedReference::One)),
        }
    }

    fn lookup(&self, field: &Field, id: &str) -> Result<Option<ContentItem>, ResolveError> {
        let item = self.items.get_item(&id.into())?;
        Ok(item.filter(|item| {
            !item.is_deleted()
                && field
                    .relation_target
                    .as_ref()
                    .is_some_and(|target| *target == item.schema_id)
        }))
    }
}
