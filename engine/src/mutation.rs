//! Schema mutation engine.
//!
//! One [`SchemaMutation`] per call, each checked against the caller's
//! `expected_version` and bumping the version by one on success:
//!
//! | Mutation        | Schema                          | Stored items                     |
//! |-----------------|---------------------------------|----------------------------------|
//! | `AddField`      | field appended                  | untouched                        |
//! | `RenameField`   | label changed, id kept          | untouched                        |
//! | `ReorderFields` | order replaced                  | untouched                        |
//! | `DeleteField`   | field removed                   | key removed (`Purge`) or kept (`Retain`) |
//!
//! A purge writes the schema first and then rewrites each affected item
//! with one `put_item`. Items are independent: a failure on one is recorded
//! and the rest are still processed. If any failed, the call returns
//! [`PartialMigrationError`] carrying the updated schema.
//!
//! A retained delete is one-way. The data stays in storage but no field
//! exposes it, and a field added later never reuses the id.

use std::collections::HashSet;
use std::fmt;

use content_schema_core::{
    BusinessRuleError, ContentItem, Field, FieldId, FieldMigrationPolicy, ItemId, Schema,
    SchemaId, check_field_order,
};
use content_schema_db::{ContentItemStore, SchemaStore};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::error::{EngineError, Result};
use crate::registry::{
    assign_field_ids, check_schema, commit, load_for_write, load_schema, relation_targets,
    retained_keys,
};

/// A single change to a schema's field list.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaMutation {
    /// Append a field.
    ///
    /// A caller-supplied id is kept as the field id. A blank id, or one
    /// still holding retained data, is replaced by a generated id; an id
    /// that matches an active field is refused as a duplicate.
    AddField(Field),
    /// Change a field's display label.
    RenameField {
        /// Field to relabel.
        field_id: FieldId,
        /// New label.
        label: String,
    },
    /// Replace the field order with a permutation of the current ids.
    ReorderFields(Vec<FieldId>),
    /// Remove a field, purging or retaining its stored data.
    DeleteField {
        /// Field to remove.
        field_id: FieldId,
        /// What happens to stored item data.
        policy: FieldMigrationPolicy,
    },
}

/// Result of a successful [`SchemaMutation`].
#[derive(Debug, Clone, PartialEq)]
pub struct MutationOutcome {
    /// The schema as stored after the mutation.
    pub schema: Schema,
    /// Purge statistics, for `DeleteField`.
    pub deletion: Option<FieldDeletion>,
}

/// Report of a completed field delete.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDeletion {
    /// The removed field definition.
    pub field: Field,
    /// Policy applied.
    pub policy: FieldMigrationPolicy,
    /// Items rewritten without the field (always 0 for `Retain`).
    pub purged: usize,
}

/// One item that could not be purged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurgeFailure {
    /// Item left with stale data.
    pub item: ItemId,
    /// Store error message.
    pub reason: String,
}

impl fmt::Display for PurgeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.item, self.reason)
    }
}

/// A field was removed from its schema but some items still hold its data.
///
/// The schema change is durable; retrying only needs the purge, e.g. by
/// calling [`SchemaMutator::purge_field_data`].
#[derive(Debug, Clone, PartialEq, Error)]
#[error(
    "field {field_id} removed from schema {} but {} item(s) could not be purged",
    .schema.id,
    .failures.len()
)]
pub struct PartialMigrationError {
    /// The schema as stored, without the field.
    pub schema: Schema,
    /// The removed field.
    pub field_id: FieldId,
    /// Items successfully purged.
    pub purged: usize,
    /// Items that still hold the field's data.
    pub failures: Vec<PurgeFailure>,
}

impl PartialMigrationError {
    /// Ids of the items that failed.
    pub fn failed_items(&self) -> Vec<&ItemId> {
        self.failures.iter().map(|f| &f.item).collect()
    }
}

/// Applies [`SchemaMutation`]s.
pub struct SchemaMutator<'a, S, I> {
    schemas: &'a S,
    items: &'a I,
}

impl<'a, S: SchemaStore, I: ContentItemStore> SchemaMutator<'a, S, I> {
    /// Creates a mutator over the given stores.
    pub fn new(schemas: &'a S, items: &'a I) -> Self {
        Self { schemas, items }
    }

    /// Applies one mutation.
    ///
    /// # Errors
    ///
    /// - [`EngineError::SchemaNotFound`] / [`EngineError::FieldNotFound`].
    /// - [`EngineError::ConcurrentModification`] for a stale version.
    /// - [`EngineError::SchemaValidation`] if the resulting schema is invalid.
    /// - [`BusinessRuleError::InvalidOrder`] for a bad reorder.
    /// - [`EngineError::PartialMigration`] if a purge left some items behind.
    pub fn apply(
        &self,
        schema_id: &SchemaId,
        expected_version: u64,
        mutation: SchemaMutation,
    ) -> Result<MutationOutcome> {
        let schema = match mutation {
            SchemaMutation::AddField(field) => self.add_field(schema_id, expected_version, field)?,
            SchemaMutation::RenameField { field_id, label } => {
                self.rename_field(schema_id, expected_version, &field_id, label)?
            }
            SchemaMutation::ReorderFields(order) => {
                self.reorder_fields(schema_id, expected_version, &order)?
            }
            SchemaMutation::DeleteField { field_id, policy } => {
                let (schema, deletion) =
                    self.delete_field(schema_id, expected_version, &field_id, policy)?;
                return Ok(MutationOutcome {
                    schema,
                    deletion: Some(deletion),
                });
            }
        };
        Ok(MutationOutcome {
            schema,
            deletion: None,
        })
    }

    /// Appends `field` to the end of the field order.
    pub fn add_field(
        &self,
        schema_id: &SchemaId,
        expected_version: u64,
        field: Field,
    ) -> Result<Schema> {
        let mut schema = load_for_write(self.schemas, schema_id, expected_version)?;
        let retained = retained_keys(self.items, &schema)?;
        let kept = relation_targets(&schema);

        let mut fields = [field];
        if schema.find_field(fields[0].id.as_str()).is_none() {
            assign_field_ids(&mut fields, &HashSet::new(), &retained);
        }
        let [field] = fields;
        let field_id = field.id.clone();
        schema.fields.push(field);

        check_schema(self.schemas, &schema, &kept)?;
        let stored = commit(self.schemas, schema)?;
        info!(schema = %schema_id, field = %field_id, version = stored.version, "Added field");
        Ok(stored)
    }

    /// Changes a field's label. Item data is never touched.
    pub fn rename_field(
        &self,
        schema_id: &SchemaId,
        expected_version: u64,
        field_id: &FieldId,
        label: impl Into<String>,
    ) -> Result<Schema> {
        let mut schema = load_for_write(self.schemas, schema_id, expected_version)?;
        let field = schema
            .fields
            .iter_mut()
            .find(|f| &f.id == field_id)
            .ok_or_else(|| EngineError::FieldNotFound {
                schema: schema_id.clone(),
                field: field_id.clone(),
            })?;
        field.label = label.into();

        let kept = relation_targets(&schema);
        check_schema(self.schemas, &schema, &kept)?;
        let stored = commit(self.schemas, schema)?;
        info!(schema = %schema_id, field = %field_id, version = stored.version, "Renamed field");
        Ok(stored)
    }

    /// Replaces the field order.
    ///
    /// # Errors
    ///
    /// Returns [`BusinessRuleError::InvalidOrder`] unless `order` is a
    /// permutation of the current field ids.
    pub fn reorder_fields(
        &self,
        schema_id: &SchemaId,
        expected_version: u64,
        order: &[FieldId],
    ) -> Result<Schema> {
        let mut schema = load_for_write(self.schemas, schema_id, expected_version)?;
        check_field_order(&schema.fields, order)?;

        let mut remaining = std::mem::take(&mut schema.fields);
        for id in order {
            if let Some(pos) = remaining.iter().position(|f| &f.id == id) {
                schema.fields.push(remaining.swap_remove(pos));
            }
        }

        let stored = commit(self.schemas, schema)?;
        info!(schema = %schema_id, version = stored.version, "Reordered fields");
        Ok(stored)
    }

    /// Removes a field from the schema and applies `policy` to stored data.
    ///
    /// For `Purge`, the affected items are read before the schema is
    /// written, so a failing read leaves everything unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::PartialMigration`] if the schema was updated
    /// but some items could not be purged.
    pub fn delete_field(
        &self,
        schema_id: &SchemaId,
        expected_version: u64,
        field_id: &FieldId,
        policy: FieldMigrationPolicy,
    ) -> Result<(Schema, FieldDeletion)> {
        let mut schema = load_for_write(self.schemas, schema_id, expected_version)?;
        let position = schema
            .field_position(field_id.as_str())
            .ok_or_else(|| EngineError::FieldNotFound {
                schema: schema_id.clone(),
                field: field_id.clone(),
            })?;
        let affected = match policy {
            FieldMigrationPolicy::Purge => self.items.get_items_by_schema(schema_id)?,
            FieldMigrationPolicy::Retain => Vec::new(),
        };
        let field = schema.fields.remove(position);

        let stored = commit(self.schemas, schema)?;
        info!(
            schema = %schema_id,
            field = %field_id,
            policy = ?policy,
            version = stored.version,
            "Deleted field"
        );

        let report = self.purge_items(schema_id, field_id, affected);
        if !report.failures.is_empty() {
            return Err(PartialMigrationError {
                schema: stored,
                field_id: field_id.clone(),
                purged: report.purged,
                failures: report.failures,
            }
            .into());
        }

        Ok((
            stored,
            FieldDeletion {
                field,
                policy,
                purged: report.purged,
            },
        ))
    }

    /// Removes the data of a deleted field from every item of the schema,
    /// soft-deleted items included. Used to finish a purge after a
    /// [`PartialMigrationError`], or to purge data left by a `Retain`
    /// delete.
    ///
    /// # Errors
    ///
    /// Returns [`BusinessRuleError::FieldStillActive`] if `field_id` is
    /// still an active field of the schema.
    pub fn purge_field_data(&self, schema_id: &SchemaId, field_id: &FieldId) -> Result<PurgeReport> {
        let schema = load_schema(self.schemas, schema_id)?;
        if schema.find_field(field_id.as_str()).is_some() {
            return Err(BusinessRuleError::FieldStillActive(field_id.clone()).into());
        }
        let items = self.items.get_items_by_schema(schema_id)?;
        Ok(self.purge_items(schema_id, field_id, items))
    }

    fn purge_items(
        &self,
        schema_id: &SchemaId,
        field_id: &FieldId,
        items: Vec<ContentItem>,
    ) -> PurgeReport {
        let mut report = PurgeReport::default();
        if items.is_empty() {
            return report;
        }

        for mut item in items {
            if item.data.remove(field_id).is_none() {
                continue;
            }
            let id = item.id.clone();
            match self.items.put_item(item) {
                Ok(_) => report.purged += 1,
                Err(err) => {
                    warn!(item = %id, field = %field_id, error = %err, "Failed to purge field from item");
                    report.failures.push(PurgeFailure {
                        item: id,
                        reason: err.to_string(),
                    });
                }
            }
        }

        info!(
            schema = %schema_id,
            field = %field_id,
            purged = report.purged,
            failed = report.failures.len(),
            "Purged field data"
        );
        report
    }
}

/// Result of purging a field's data from stored items.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
    /// Items rewritten without the field.
    pub purged: usize,
    /// Items that could not be rewritten.
    pub failures: Vec<PurgeFailure>,
}
