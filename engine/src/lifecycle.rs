//! Content item validation and lifecycle.
//!
//! [`ContentLifecycle::validate`] layers relation existence on top of the
//! pure checks of [`validate_content`]: every relation value that passed
//! the type check is resolved, defaults included, and dangling ids are merged into the same
//! [`ContentValidationError`] so the caller sees every problem at once.
//!
//! Items are written only after validation passes. `Single`-kind schemas
//! hold at most one non-deleted item; the rule is enforced on create and on
//! restore.

use chrono::{DateTime, Utc};
use content_schema_core::{
    AnyTransition, BusinessRuleError, ContentData, ContentItem, ContentStatus,
    ContentValidationError, FieldType, FieldViolation, ItemId, Schema, SchemaId, SchemaKind,
    TransitionPolicy, ViolationKind, check_transition, default_value, is_empty_value,
    unknown_keys, validate_content,
};
use content_schema_db::{ContentItemStore, SchemaStore};
use tracing::{debug, info};

use crate::error::{EngineError, Result};
use crate::registry::{live_item_count, load_schema};
use crate::resolver::{RelationResolver, ResolveError};

/// Item validation and CRUD with status transitions.
pub struct ContentLifecycle<'a, S, I> {
    schemas: &'a S,
    items: &'a I,
    policy: &'a dyn TransitionPolicy,
}

impl<'a, S: SchemaStore, I: ContentItemStore> ContentLifecycle<'a, S, I> {
    /// Creates a lifecycle that allows any status transition.
    pub fn new(schemas: &'a S, items: &'a I) -> Self {
        Self::with_policy(schemas, items, &AnyTransition)
    }

    /// Creates a lifecycle governed by `policy`.
    pub fn with_policy(schemas: &'a S, items: &'a I, policy: &'a dyn TransitionPolicy) -> Self {
        Self {
            schemas,
            items,
            policy,
        }
    }

    /// Validates `data` against `schema` and returns the normalized data.
    ///
    /// Unknown keys are dropped, empty optional fields get their default,
    /// and relation ids must name live items of the target schema.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ContentValidation`] listing every offending
    /// field in schema order, or [`EngineError::Transport`] if a relation
    /// lookup fails.
    pub fn validate(&self, schema: &Schema, data: &ContentData) -> Result<ContentData> {
        let dropped = unknown_keys(schema, data);
        if !dropped.is_empty() {
            debug!(schema = %schema.id, keys = ?dropped, "Dropping unknown data keys");
        }

        let now = Utc::now();
        let checked = validate_content(schema, data, now);
        let dangling = self.dangling_relations(schema, data, now, checked.as_ref().err())?;

        match checked {
            Ok(normalized) if dangling.is_empty() => Ok(normalized),
            Ok(_) => {
                let mut err = ContentValidationError {
                    violations: Vec::new(),
                };
                err.merge(schema, dangling);
                Err(err.into())
            }
            Err(mut err) => {
                err.merge(schema, dangling);
                Err(err.into())
            }
        }
    }

    fn dangling_relations(
        &self,
        schema: &Schema,
        data: &ContentData,
        now: DateTime<Utc>,
        earlier: Option<&ContentValidationError>,
    ) -> Result<Vec<FieldViolation>> {
        let resolver = RelationResolver::new(self.items);
        let mut violations = Vec::new();

        for field in schema
            .fields
            .iter()
            .filter(|f| f.field_type == FieldType::Relation)
        {
            if earlier.is_some_and(|e| e.field_ids().contains(&&field.id)) {
                continue;
            }
            // An empty optional relation is stored as its default, which
            // must resolve as well.
            let value = match data.get(&field.id).filter(|v| !is_empty_value(v)) {
                Some(value) => value.clone(),
                None => default_value(field, now),
            };
            if is_empty_value(&value) {
                continue;
            }
            match resolver.resolve(field, &value) {
                Ok(_) => {}
                Err(ResolveError::TargetNotFound { field, missing }) => {
                    violations.push(FieldViolation::new(
                        field,
                        ViolationKind::DanglingRelation(missing),
                    ));
                }
                Err(ResolveError::InvalidReference { field, reason }) => {
                    violations.push(FieldViolation::new(field, ViolationKind::Invalid(reason)));
                }
                Err(ResolveError::Store(err)) => return Err(err.into()),
            }
        }

        Ok(violations)
    }

    /// Validates and stores a new draft item.
    ///
    /// # Errors
    ///
    /// - [`EngineError::SchemaNotFound`].
    /// - [`BusinessRuleError::SchemaArchived`] for an archived schema.
    /// - [`EngineError::ContentValidation`].
    /// - [`BusinessRuleError::SingleTypeAlreadyPopulated`] if the schema is
    ///   `Single` and already has a live item.
    pub fn create(
        &self,
        schema_id: &SchemaId,
        title: impl Into<String>,
        data: &ContentData,
    ) -> Result<ContentItem> {
        let schema = load_schema(self.schemas, schema_id)?;
        if schema.is_archived() {
            return Err(BusinessRuleError::SchemaArchived(schema_id.clone()).into());
        }
        let normalized = self.validate(&schema, data)?;
        if schema.kind == SchemaKind::Single {
            self.check_single_vacancy(&schema, None)?;
        }

        let item = self
            .items
            .put_item(ContentItem::new(schema.id.clone(), title, normalized))?;
        info!(item = %item.id, schema = %schema.id, "Created content item");
        Ok(item)
    }

    /// Replaces an item's data with validated `data`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ItemNotFound`] for missing or soft-deleted
    /// items, and the same validation errors as [`create`](Self::create).
    pub fn update(&self, id: &ItemId, data: &ContentData) -> Result<ContentItem> {
        let mut item = self.live_item(id)?;
        let schema = load_schema(self.schemas, &item.schema_id)?;
        item.data = self.validate(&schema, data)?;
        item.updated_at = Utc::now();

        let item = self.items.put_item(item)?;
        info!(item = %item.id, "Updated content item");
        Ok(item)
    }

    /// Changes an item's display title.
    pub fn retitle(&self, id: &ItemId, title: impl Into<String>) -> Result<ContentItem> {
        let mut item = self.live_item(id)?;
        item.title = title.into();
        item.updated_at = Utc::now();
        Ok(self.items.put_item(item)?)
    }

    /// Moves an item to `to`, subject to the transition policy.
    ///
    /// Leaving `Draft` re-validates the stored data against the current
    /// schema and stores the normalized result. Entering `Published` stamps
    /// `publishedAt`.
    ///
    /// # Errors
    ///
    /// - [`BusinessRuleError::InvalidTransition`] if the policy refuses.
    /// - [`EngineError::ContentValidation`] if draft data no longer
    ///   conforms.
    pub fn transition(&self, id: &ItemId, to: ContentStatus) -> Result<ContentItem> {
        let mut item = self.live_item(id)?;
        let from = item.status;
        check_transition(self.policy, from, to)?;

        if from == ContentStatus::Draft && to != ContentStatus::Draft {
            let schema = load_schema(self.schemas, &item.schema_id)?;
            item.data = self.validate(&schema, &item.data)?;
        }

        let now = Utc::now();
        if to == ContentStatus::Published {
            item.published_at = Some(now);
        }
        item.status = to;
        item.updated_at = now;

        let item = self.items.put_item(item)?;
        info!(item = %item.id, from = %from, to = %to, "Changed content status");
        Ok(item)
    }

    /// Like [`transition`](Self::transition), taking the status by name.
    ///
    /// # Errors
    ///
    /// Returns [`BusinessRuleError::UnknownStatus`] for a name other than
    /// `draft`, `pending_review`, or `published`.
    pub fn transition_named(&self, id: &ItemId, status: &str) -> Result<ContentItem> {
        let to: ContentStatus = status.parse()?;
        self.transition(id, to)
    }

    /// Loads an item, soft-deleted or not.
    pub fn get(&self, id: &ItemId) -> Result<ContentItem> {
        self.items
            .get_item(id)?
            .ok_or_else(|| EngineError::ItemNotFound(id.clone()))
    }

    /// Lists a schema's items, oldest first.
    pub fn list(&self, schema_id: &SchemaId, include_deleted: bool) -> Result<Vec<ContentItem>> {
        let mut items: Vec<ContentItem> = self
            .items
            .get_items_by_schema(schema_id)?
            .into_iter()
            .filter(|item| include_deleted || !item.is_deleted())
            .collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(items)
    }

    /// Soft-deletes an item.
    pub fn archive(&self, id: &ItemId) -> Result<ContentItem> {
        let mut item = self.get(id)?;
        if item.is_deleted() {
            return Ok(item);
        }
        let now = Utc::now();
        item.deleted_at = Some(now);
        item.updated_at = now;
        let item = self.items.put_item(item)?;
        info!(item = %item.id, "Archived content item");
        Ok(item)
    }

    /// Reverses [`archive`](Self::archive).
    ///
    /// # Errors
    ///
    /// Returns [`BusinessRuleError::SingleTypeAlreadyPopulated`] if the
    /// schema is `Single` and another live item took the slot.
    pub fn restore(&self, id: &ItemId) -> Result<ContentItem> {
        let mut item = self.get(id)?;
        if !item.is_deleted() {
            return Ok(item);
        }
        if let Some(schema) = self.schemas.get_schema(&item.schema_id)? {
            if schema.kind == SchemaKind::Single {
                self.check_single_vacancy(&schema, Some(&item.id))?;
            }
        }
        item.deleted_at = None;
        item.updated_at = Utc::now();
        let item = self.items.put_item(item)?;
        info!(item = %item.id, "Restored content item");
        Ok(item)
    }

    /// Removes an item permanently.
    pub fn delete(&self, id: &ItemId) -> Result<()> {
        self.get(id)?;
        self.items.delete_item(id)?;
        info!(item = %id, "Deleted content item");
        Ok(())
    }

    fn live_item(&self, id: &ItemId) -> Result<ContentItem> {
        let item = self.get(id)?;
        if item.is_deleted() {
            return Err(EngineError::ItemNotFound(id.clone()));
        }
        Ok(item)
    }

    fn check_single_vacancy(&self, schema: &Schema, except: Option<&ItemId>) -> Result<()> {
        let taken = match except {
            None => live_item_count(self.items, &schema.id)?,
            Some(except) => self
                .items
                .get_items_by_schema(&schema.id)?
                .iter()
                .filter(|item| !item.is_deleted() && &item.id != except)
                .count(),
        };
        if taken > 0 {
            return Err(BusinessRuleError::SingleTypeAlreadyPopulated(schema.id.clone()).into());
        }
        Ok(())
    }
}
