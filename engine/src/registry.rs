//! Schema registry: create, read, list, update, archive, restore, delete.
//!
//! Every write goes through the same path: load the stored schema, compare
//! its version with the caller's `expected_version`, apply the change,
//! validate, bump the version, and hand it to the store's compare-and-swap.
//! A stale version is reported as
//! [`EngineError::ConcurrentModification`] whether the engine or the store
//! notices it first.

use std::collections::HashSet;

use chrono::Utc;
use content_schema_core::{
    BusinessRuleError, Field, FieldId, Schema, SchemaFilter, SchemaId, SchemaKind,
    validate_relation_targets, validate_schema,
};
use content_schema_db::{ContentItemStore, SchemaStore};
use tracing::{debug, info};

use crate::error::{EngineError, Result};

/// Changes applied by [`SchemaRegistry::update`]. Unset members are left
/// alone.
///
/// A `fields` list replaces the active field list. Fields it leaves out are
/// hidden with their stored item data untouched (like a
/// [`Retain`](content_schema_core::FieldMigrationPolicy::Retain) delete);
/// fields it introduces get ids the same way
/// [`SchemaMutation::AddField`](crate::SchemaMutation::AddField) does.
#[derive(Debug, Clone, Default)]
pub struct SchemaPatch {
    /// New display name.
    pub name: Option<String>,
    /// New description; an empty string clears it.
    pub description: Option<String>,
    /// New kind.
    pub kind: Option<SchemaKind>,
    /// New active field list.
    pub fields: Option<Vec<Field>>,
}

impl SchemaPatch {
    /// Sets the name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets (or, with `""`, clears) the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the kind.
    pub fn with_kind(mut self, kind: SchemaKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Replaces the field list.
    pub fn with_fields(mut self, fields: Vec<Field>) -> Self {
        self.fields = Some(fields);
        self
    }

    /// Returns `true` if the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.kind.is_none()
            && self.fields.is_none()
    }
}

/// Schema CRUD over a [`SchemaStore`], consulting a [`ContentItemStore`]
/// for the rules that depend on existing items.
pub struct SchemaRegistry<'a, S, I> {
    schemas: &'a S,
    items: &'a I,
}

impl<'a, S: SchemaStore, I: ContentItemStore> SchemaRegistry<'a, S, I> {
    /// Creates a registry over the given stores.
    pub fn new(schemas: &'a S, items: &'a I) -> Self {
        Self { schemas, items }
    }

    /// Stores a new schema.
    ///
    /// A blank schema id or field id is replaced by a generated one.
    /// Timestamps are set to now and the version to 1.
    ///
    /// # Errors
    ///
    /// - [`EngineError::SchemaValidation`] listing every structural problem,
    ///   including relation targets that do not exist (the schema itself is
    ///   a valid target).
    /// - [`EngineError::ConcurrentModification`] if a schema with this id
    ///   already exists.
    pub fn create(&self, mut schema: Schema) -> Result<Schema> {
        if schema.id.is_blank() {
            schema.id = SchemaId::generate();
        }
        let retained = retained_keys(self.items, &schema)?;
        assign_field_ids(&mut schema.fields, &HashSet::new(), &retained);

        let now = Utc::now();
        schema.created_at = now;
        schema.updated_at = now;
        schema.archived_at = None;
        schema.version = 1;

        check_schema(self.schemas, &schema, &HashSet::new())?;
        let stored = self.schemas.put_schema(schema)?;
        info!(schema = %stored.id, name = %stored.name, fields = stored.fields.len(), "Created schema");
        Ok(stored)
    }

    /// Loads a schema, archived or not.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SchemaNotFound`] if it does not exist.
    pub fn get(&self, id: &SchemaId) -> Result<Schema> {
        load_schema(self.schemas, id)
    }

    /// Lists schemas matching `filter`, ordered by name.
    pub fn list(&self, filter: &SchemaFilter) -> Result<Vec<Schema>> {
        Ok(self.schemas.list_schemas(filter)?)
    }

    /// Applies `patch` to the schema.
    ///
    /// # Errors
    ///
    /// - [`EngineError::ConcurrentModification`] if `expected_version` is
    ///   stale.
    /// - [`EngineError::SchemaValidation`] if the patched schema is invalid.
    /// - [`BusinessRuleError::SingleTypeAlreadyPopulated`] when switching to
    ///   [`SchemaKind::Single`] while more than one live item exists.
    pub fn update(
        &self,
        id: &SchemaId,
        expected_version: u64,
        patch: SchemaPatch,
    ) -> Result<Schema> {
        let mut schema = load_for_write(self.schemas, id, expected_version)?;
        let kept = relation_targets(&schema);

        if let Some(name) = patch.name {
            schema.name = name;
        }
        if let Some(description) = patch.description {
            schema.description = (!description.trim().is_empty()).then_some(description);
        }
        if let Some(kind) = patch.kind {
            if kind == SchemaKind::Single && schema.kind != SchemaKind::Single {
                let live = live_item_count(self.items, id)?;
                if live > 1 {
                    return Err(BusinessRuleError::SingleTypeAlreadyPopulated(id.clone()).into());
                }
            }
            schema.kind = kind;
        }
        if let Some(mut fields) = patch.fields {
            let active: HashSet<FieldId> = schema.field_ids().cloned().collect();
            let retained = retained_keys(self.items, &schema)?;
            assign_field_ids(&mut fields, &active, &retained);
            let hidden: Vec<&FieldId> = schema
                .fields
                .iter()
                .map(|f| &f.id)
                .filter(|id| !fields.iter().any(|f| &f.id == *id))
                .collect();
            if !hidden.is_empty() {
                debug!(schema = %id, fields = ?hidden, "Hiding fields removed by update");
            }
            schema.fields = fields;
        }

        check_schema(self.schemas, &schema, &kept)?;
        let stored = commit(self.schemas, schema)?;
        info!(schema = %stored.id, version = stored.version, "Updated schema");
        Ok(stored)
    }

    /// Archives the schema. Archived schemas are hidden from default
    /// listings and accept no new items; existing items are untouched.
    pub fn archive(&self, id: &SchemaId, expected_version: u64) -> Result<Schema> {
        let mut schema = load_for_write(self.schemas, id, expected_version)?;
        schema.archived_at.get_or_insert_with(Utc::now);
        let stored = commit(self.schemas, schema)?;
        info!(schema = %stored.id, "Archived schema");
        Ok(stored)
    }

    /// Reverses [`archive`](Self::archive).
    pub fn restore(&self, id: &SchemaId, expected_version: u64) -> Result<Schema> {
        let mut schema = load_for_write(self.schemas, id, expected_version)?;
        schema.archived_at = None;
        let stored = commit(self.schemas, schema)?;
        info!(schema = %stored.id, "Restored schema");
        Ok(stored)
    }

    /// Removes the schema permanently.
    ///
    /// # Errors
    ///
    /// Returns [`BusinessRuleError::SchemaInUse`] while any item exists for
    /// the schema, soft-deleted items included.
    pub fn delete(&self, id: &SchemaId, expected_version: u64) -> Result<()> {
        load_for_write(self.schemas, id, expected_version)?;
        let items = self.items.get_items_by_schema(id)?.len();
        if items > 0 {
            return Err(BusinessRuleError::SchemaInUse {
                schema: id.clone(),
                items,
            }
            .into());
        }
        self.schemas.delete_schema(id)?;
        info!(schema = %id, "Deleted schema");
        Ok(())
    }
}

/// Loads a schema or reports it missing.
pub(crate) fn load_schema<S: SchemaStore>(schemas: &S, id: &SchemaId) -> Result<Schema> {
    schemas
        .get_schema(id)?
        .ok_or_else(|| EngineError::SchemaNotFound(id.clone()))
}

/// Loads a schema the caller is about to modify, checking its version.
pub(crate) fn load_for_write<S: SchemaStore>(
    schemas: &S,
    id: &SchemaId,
    expected_version: u64,
) -> Result<Schema> {
    let schema = load_schema(schemas, id)?;
    if schema.version != expected_version {
        return Err(EngineError::ConcurrentModification {
            schema: id.clone(),
            expected: expected_version,
            actual: schema.version,
        });
    }
    Ok(schema)
}

/// Bumps the version and timestamp and writes the schema.
pub(crate) fn commit<S: SchemaStore>(schemas: &S, mut schema: Schema) -> Result<Schema> {
    schema.version += 1;
    schema.updated_at = Utc::now();
    Ok(schemas.put_schema(schema)?)
}

/// Runs structural validation plus the relation target lookup.
///
/// A relation target must exist and not be archived. Targets in `kept` were
/// already referenced by the stored version of the schema and only need to
/// exist, so archiving a target does not freeze the schemas pointing at it.
pub(crate) fn check_schema<S: SchemaStore>(
    schemas: &S,
    schema: &Schema,
    kept: &HashSet<SchemaId>,
) -> Result<()> {
    let mut errors = validate_schema(schema);

    let mut live = HashSet::new();
    for target in schema.fields.iter().filter_map(|f| f.relation_target.as_ref()) {
        if target.is_blank() || *target == schema.id || live.contains(target) {
            continue;
        }
        match schemas.get_schema(target)? {
            Some(found) if !found.is_archived() || kept.contains(target) => {
                live.insert(target.clone());
            }
            _ => {}
        }
    }
    errors.extend(validate_relation_targets(schema, |id| live.contains(id)));

    if errors.is_empty() {
        Ok(())
    } else {
        Err(EngineError::SchemaValidation(errors))
    }
}

/// Schema ids the relation fields of `schema` point at.
pub(crate) fn relation_targets(schema: &Schema) -> HashSet<SchemaId> {
    schema
        .fields
        .iter()
        .filter_map(|f| f.relation_target.clone())
        .collect()
}

/// Counts non-deleted items of a schema.
pub(crate) fn live_item_count<I: ContentItemStore>(items: &I, schema_id: &SchemaId) -> Result<usize> {
    Ok(items
        .get_items_by_schema(schema_id)?
        .iter()
        .filter(|item| !item.is_deleted())
        .count())
}

/// Data keys stored on items of `schema` that are not active fields: data
/// left behind by retained field deletes.
pub(crate) fn retained_keys<I: ContentItemStore>(
    items: &I,
    schema: &Schema,
) -> Result<HashSet<FieldId>> {
    let mut keys = HashSet::new();
    for item in items.get_items_by_schema(&schema.id)? {
        for key in item.data.into_keys() {
            if schema.find_field(key.as_str()).is_none() {
                keys.insert(key);
            }
        }
    }
    Ok(keys)
}

/// Gives every new field a usable id.
///
/// Fields already in `active` keep theirs. A new field keeps a caller-chosen
/// id unless it is blank or still holds retained data, in which case a fresh
/// id is generated so the field starts empty.
pub(crate) fn assign_field_ids(
    fields: &mut [Field],
    active: &HashSet<FieldId>,
    retained: &HashSet<FieldId>,
) {
    for field in fields.iter_mut().filter(|f| !active.contains(&f.id)) {
        if field.id.is_blank() {
            field.id = FieldId::generate();
        } else if retained.contains(&field.id) {
            let fresh = FieldId::generate();
            info!(requested = %field.id, assigned = %fresh, "Field id holds retained data; assigning a fresh id");
            field.id = fresh;
        }
    }
}
