//! Business rules shared by the registry, mutation engine, and lifecycle.
//!
//! Rule violations are deterministic and local: they are decided from data
//! the caller already holds and are reported before anything is written.

use std::collections::HashSet;

use thiserror::Error;

use crate::{ContentStatus, Field, FieldId, SchemaId};

/// A request broke a business rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusinessRuleError {
    /// A single-item schema already has a non-deleted item.
    #[error("schema {0} holds a single item and already has one")]
    SingleTypeAlreadyPopulated(SchemaId),
    /// A schema cannot be deleted while items exist for it.
    #[error("schema {schema} is still used by {items} content item(s)")]
    SchemaInUse {
        /// Schema that was to be deleted.
        schema: SchemaId,
        /// Number of items referencing it.
        items: usize,
    },
    /// A field order is not a permutation of the current field ids.
    #[error("invalid field order: {0}")]
    InvalidOrder(String),
    /// Items cannot be created in an archived schema.
    #[error("schema {0} is archived")]
    SchemaArchived(SchemaId),
    /// The transition policy does not allow moving between these states.
    #[error("cannot move content from {from} to {to}")]
    InvalidTransition {
        /// Current status.
        from: ContentStatus,
        /// Requested status.
        to: ContentStatus,
    },
    /// Stored data of a field cannot be purged while the field is active.
    #[error("field {0} is still part of the schema")]
    FieldStillActive(FieldId),
    /// A status value outside draft, pending review, and published.
    #[error("unknown content status: {0}")]
    UnknownStatus(String),
}

/// Checks that `order` is a permutation of the ids of `fields`.
///
/// # Errors
///
/// Returns [`BusinessRuleError::InvalidOrder`] when the lengths differ, an id
/// repeats, or an id is not a current field.
///
/// # Examples
///
/// ```
/// use content_schema_core::*;
///
/// let fields = vec![Field::text("a", "A"), Field::text("b", "B")];
/// assert!(check_field_order(&fields, &["b".into(), "a".into()]).is_ok());
/// assert!(check_field_order(&fields, &["a".into()]).is_err());
/// assert!(check_field_order(&fields, &["a".into(), "a".into()]).is_err());
/// ```
pub fn check_field_order(fields: &[Field], order: &[FieldId]) -> Result<(), BusinessRuleError> {
    if fields.len() != order.len() {
        return Err(BusinessRuleError::InvalidOrder(format!(
            "expected {} field ids, got {}",
            fields.len(),
            order.len()
        )));
    }

    let current: HashSet<&FieldId> = fields.iter().map(|f| &f.id).collect();
    let mut seen: HashSet<&FieldId> = HashSet::new();
    for id in order {
        if !current.contains(id) {
            return Err(BusinessRuleError::InvalidOrder(format!(
                "unknown field id: {id}"
            )));
        }
        if !seen.insert(id) {
            return Err(BusinessRuleError::InvalidOrder(format!(
                "field id listed twice: {id}"
            )));
        }
    }

    Ok(())
}

/// Decides which status transitions are allowed.
///
/// The exact transition table belongs to whatever review workflow the
/// deployment uses; the lifecycle only asks this trait.
pub trait TransitionPolicy {
    /// Returns `true` if an item may move from `from` to `to`.
    fn allows(&self, from: ContentStatus, to: ContentStatus) -> bool;
}

/// Allows every transition between the three states.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyTransition;

impl TransitionPolicy for AnyTransition {
    fn allows(&self, _from: ContentStatus, _to: ContentStatus) -> bool {
        true
    }
}

/// Draft → pending review → published, with withdrawal back to draft.
///
/// # Examples
///
/// ```
/// use content_schema_core::{ContentStatus::*, ReviewWorkflow, TransitionPolicy};
///
/// let policy = ReviewWorkflow;
/// assert!(policy.allows(Draft, PendingReview));
/// assert!(policy.allows(PendingReview, Published));
/// assert!(policy.allows(Published, Draft));
/// assert!(!policy.allows(Draft, Published));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ReviewWorkflow;

impl TransitionPolicy for ReviewWorkflow {
    fn allows(&self, from: ContentStatus, to: ContentStatus) -> bool {
        use ContentStatus::*;
        matches!(
            (from, to),
            (Draft, PendingReview)
                | (PendingReview, Published)
                | (PendingReview, Draft)
                | (Published, Draft)
        )
    }
}

/// Checks a transition against `policy`.
///
/// # Errors
///
/// Returns [`BusinessRuleError::InvalidTransition`] if the policy refuses it.
pub fn check_transition(
    policy: &dyn TransitionPolicy,
    from: ContentStatus,
    to: ContentStatus,
) -> Result<(), BusinessRuleError> {
    if policy.allows(from, to) {
        Ok(())
    } else {
        Err(BusinessRuleError::InvalidTransition { from, to })
    }
}
