//! Error type for engine operations.
//!
//! [`EngineError`] keeps every failure kind apart: structural schema
//! problems, content validation, business rules, partial purges, storage
//! failures, stale version stamps, and missing records. Only
//! [`EngineError::Transport`] is worth retrying as-is.

use content_schema_core::{
    BusinessRuleError, ContentValidationError, FieldId, FieldViolation, ItemId, SchemaId,
    SchemaValidationError, ViolationKind,
};
use content_schema_db::StoreError;
use thiserror::Error;

use crate::mutation::PartialMigrationError;
use crate::resolver::ResolveError;

/// Errors returned by the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The schema definition is structurally invalid. Nothing was written.
    #[error("invalid schema: {}", format_schema_errors(.0))]
    SchemaValidation(Vec<SchemaValidationError>),

    /// The item payload does not conform to its schema. Nothing was written.
    #[error(transparent)]
    ContentValidation(#[from] ContentValidationError),

    /// A business rule refused the request. Nothing was written.
    #[error(transparent)]
    BusinessRule(#[from] BusinessRuleError),

    /// A field was removed but some items could not be purged.
    #[error(transparent)]
    PartialMigration(Box<PartialMigrationError>),

    /// The store failed.
    #[error("storage failure: {0}")]
    Transport(StoreError),

    /// The caller's version stamp is stale.
    #[error("schema {schema} was modified concurrently: expected version {expected}, found {actual}")]
    ConcurrentModification {
        /// Schema being modified.
        schema: SchemaId,
        /// Version the caller based its change on.
        expected: u64,
        /// Version currently stored.
        actual: u64,
    },

    /// No schema with this id.
    #[error("schema not found: {0}")]
    SchemaNotFound(SchemaId),

    /// The schema has no active field with this id.
    #[error("field {field} not found in schema {schema}")]
    FieldNotFound {
        /// Schema searched.
        schema: SchemaId,
        /// Missing field.
        field: FieldId,
    },

    /// No content item with this id.
    #[error("content item not found: {0}")]
    ItemNotFound(ItemId),
}

fn format_schema_errors(errors: &[SchemaValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl EngineError {
    /// Returns `true` for storage failures, the only kind a plain retry can fix.
    pub fn is_transport(&self) -> bool {
        matches!(self, EngineError::Transport(_))
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::VersionConflict {
                schema,
                stored,
                incoming,
            } => EngineError::ConcurrentModification {
                schema,
                expected: incoming.saturating_sub(1),
                actual: stored,
            },
            other => EngineError::Transport(other),
        }
    }
}

impl From<PartialMigrationError> for EngineError {
    fn from(err: PartialMigrationError) -> Self {
        EngineError::PartialMigration(Box::new(err))
    }
}

impl From<ResolveError> for EngineError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::TargetNotFound { field, missing } => {
                EngineError::ContentValidation(ContentValidationError {
                    violations: vec![FieldViolation::new(
                        field,
                        ViolationKind::DanglingRelation(missing),
                    )],
                })
            }
            ResolveError::InvalidReference { field, reason } => {
                EngineError::ContentValidation(ContentValidationError {
                    violations: vec![FieldViolation::new(field, ViolationKind::Invalid(reason))],
                })
            }
            ResolveError::Store(err) => err.into(),
        }
    }
}

/// Convenience alias for results with [`EngineError`].
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_conflict_maps_to_concurrent_modification() {
        let err: EngineError = StoreError::VersionConflict {
            schema: "posts".into(),
            stored: 4,
            incoming: 3,
        }
        .into();
        match err {
            EngineError::ConcurrentModification {
                expected, actual, ..
            } => {
                assert_eq!(expected, 2);
                assert_eq!(actual, 4);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_other_store_errors_are_transport() {
        let err: EngineError = StoreError::Backend("disk full".to_string()).into();
        assert!(err.is_transport());
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn test_schema_errors_are_listed() {
        let err = EngineError::SchemaValidation(vec![
            SchemaValidationError::EmptySchemaName,
            SchemaValidationError::DuplicateFieldId("title".into()),
        ]);
        let message = err.to_string();
        assert!(message.contains("title"));
        assert!(message.contains("; "));
    }
}
