//! Schema registry, relation resolver, schema mutation engine, and content
//! lifecycle.
//!
//! The engine sits between callers and two storage contracts,
//! [`SchemaStore`] and [`ContentItemStore`]. It never writes a record that
//! fails validation, and it reports each failure kind as its own
//! [`EngineError`] variant.
//!
//! # Main entry points
//!
//! - [`SchemaRegistry`]: create, list, update, archive, and delete schemas.
//! - [`SchemaMutator`]: add, rename, reorder, and delete fields, with
//!   `Purge` or `Retain` handling of stored data.
//! - [`RelationResolver`]: turn relation values into referenced items.
//! - [`ContentLifecycle`]: validate, store, and transition content items.
//!
//! [`Engine`] bundles a pair of stores and a transition policy and hands out
//! the components above.
//!
//! # Example
//!
//! ```
//! use content_schema_core::{ContentData, ContentStatus, Field, Schema, SchemaKind};
//! use content_schema_db::LocalStore;
//! use content_schema_engine::Engine;
//! use serde_json::json;
//!
//! let store = LocalStore::in_memory();
//! let engine = Engine::new(&store, &store);
//!
//! let schema = engine
//!     .registry()
//!     .create(
//!         Schema::new("Blog Post", SchemaKind::Collection)
//!             .with_field(Field::text("title", "Title").required()),
//!     )
//!     .unwrap();
//! assert_eq!(schema.version, 1);
//!
//! let mut data = ContentData::new();
//! data.insert("title".into(), json!("Hello"));
//! let item = engine.content().create(&schema.id, "Hello", &data).unwrap();
//!
//! let item = engine
//!     .content()
//!     .transition(&item.id, ContentStatus::Published)
//!     .unwrap();
//! assert!(item.published_at.is_some());
//! ```

mod error;
mod lifecycle;
mod mutation;
mod registry;
mod resolver;

pub use error::{EngineError, Result};
pub use lifecycle::ContentLifecycle;
pub use mutation::{
    FieldDeletion, MutationOutcome, PartialMigrationError, PurgeFailure, PurgeReport,
    SchemaMutation, SchemaMutator,
};
pub use registry::{SchemaPatch, SchemaRegistry};
pub use resolver::{RelationResolver, ResolveError, ResolvedReference};

use content_schema_core::{
    AnyTransition, BusinessRuleError, ContentItem, ItemId, ReviewWorkflow, SchemaKind,
    TransitionPolicy,
};
use content_schema_db::{ContentConfig, ContentItemStore, SchemaStore, Snapshot};
use serde::Serialize;
use tracing::{debug, info};

use crate::registry::{live_item_count, load_schema};

/// A pair of stores plus the transition policy content items follow.
pub struct Engine<S, I> {
    schemas: S,
    items: I,
    policy: Box<dyn TransitionPolicy>,
}

impl<S: SchemaStore, I: ContentItemStore> Engine<S, I> {
    /// Creates an engine that allows any status transition.
    pub fn new(schemas: S, items: I) -> Self {
        Self {
            schemas,
            items,
            policy: Box::new(AnyTransition),
        }
    }

    /// Replaces the transition policy.
    pub fn with_policy(mut self, policy: impl TransitionPolicy + 'static) -> Self {
        self.policy = Box::new(policy);
        self
    }

    /// Applies the `content` section of the configuration.
    pub fn configured(self, config: &ContentConfig) -> Self {
        if config.review_workflow {
            self.with_policy(ReviewWorkflow)
        } else {
            self
        }
    }

    /// Schema CRUD.
    pub fn registry(&self) -> SchemaRegistry<'_, S, I> {
        SchemaRegistry::new(&self.schemas, &self.items)
    }

    /// Field mutations.
    pub fn mutations(&self) -> SchemaMutator<'_, S, I> {
        SchemaMutator::new(&self.schemas, &self.items)
    }

    /// Relation lookups.
    pub fn resolver(&self) -> RelationResolver<'_, I> {
        RelationResolver::new(&self.items)
    }

    /// Content items.
    pub fn content(&self) -> ContentLifecycle<'_, S, I> {
        ContentLifecycle::with_policy(&self.schemas, &self.items, self.policy.as_ref())
    }

    /// Writes the schemas and items of a snapshot through the engine.
    ///
    /// Schemas and items whose id is already stored are skipped. New
    /// schemas are created (version 1) and keep their archived state; new
    /// items are validated against their schema and keep their id, status,
    /// and timestamps. Records that reference one another are accepted in
    /// any order.
    ///
    /// Records that fail validation or a business rule are listed in the
    /// report instead of aborting the import.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Transport`] if the store fails. Records
    /// written before the failure stay written.
    pub fn import(&self, snapshot: Snapshot) -> Result<ImportReport> {
        let mut report = ImportReport::default();

        // Archiving waits until every schema exists so relations to an
        // archived schema in the same snapshot still resolve.
        let mut to_archive = Vec::new();
        let rejected = settle(snapshot.schemas, |schema| {
            if self.schemas.get_schema(&schema.id)?.is_some() {
                report.schemas_skipped += 1;
                return Ok(());
            }
            let created = self.registry().create(schema.clone())?;
            if schema.is_archived() {
                to_archive.push(created);
            }
            report.schemas_created += 1;
            Ok(())
        })?;
        report.reject(rejected.into_iter().map(|(s, e)| (s.id.to_string(), e)));
        for schema in to_archive {
            self.registry().archive(&schema.id, schema.version)?;
        }

        let rejected = settle(snapshot.items, |item| {
            if !item.id.is_blank() && self.items.get_item(&item.id)?.is_some() {
                report.items_skipped += 1;
                return Ok(());
            }
            self.import_item(item)?;
            report.items_imported += 1;
            Ok(())
        })?;
        report.reject(rejected.into_iter().map(|(i, e)| (i.id.to_string(), e)));

        info!(
            schemas = report.schemas_created,
            items = report.items_imported,
            rejected = report.rejected.len(),
            "Import finished"
        );
        Ok(report)
    }

    fn import_item(&self, item: &ContentItem) -> Result<()> {
        let schema = load_schema(&self.schemas, &item.schema_id)?;
        let data = self.content().validate(&schema, &item.data)?;
        if schema.kind == SchemaKind::Single
            && !item.is_deleted()
            && live_item_count(&self.items, &schema.id)? > 0
        {
            return Err(BusinessRuleError::SingleTypeAlreadyPopulated(schema.id.clone()).into());
        }

        let mut item = item.clone();
        if item.id.is_blank() {
            item.id = ItemId::generate();
        }
        item.data = data;
        self.items.put_item(item)?;
        Ok(())
    }
}

/// Runs `attempt` over `pending` until a pass makes no progress.
///
/// Returns the records that never succeeded with their last error. Storage
/// failures abort immediately.
fn settle<T, F>(mut pending: Vec<T>, mut attempt: F) -> Result<Vec<(T, EngineError)>>
where
    F: FnMut(&T) -> Result<()>,
{
    loop {
        let before = pending.len();
        let mut failed = Vec::new();
        for record in pending {
            match attempt(&record) {
                Ok(()) => {}
                Err(err) if err.is_transport() => return Err(err),
                Err(err) => failed.push((record, err)),
            }
        }
        if failed.is_empty() || failed.len() == before {
            return Ok(failed);
        }
        debug!(remaining = failed.len(), "Retrying records that reference later ones");
        pending = failed.into_iter().map(|(record, _)| record).collect();
    }
}

/// Outcome of [`Engine::import`].
#[derive(Debug, Default, Serialize)]
pub struct ImportReport {
    /// Schemas created.
    pub schemas_created: usize,
    /// Schemas skipped because the id was already stored.
    pub schemas_skipped: usize,
    /// Items written.
    pub items_imported: usize,
    /// Items skipped because the id was already stored.
    pub items_skipped: usize,
    /// Records refused, with the reason.
    pub rejected: Vec<RejectedRecord>,
}

impl ImportReport {
    fn reject(&mut self, records: impl Iterator<Item = (String, EngineError)>) {
        self.rejected
            .extend(records.map(|(id, err)| RejectedRecord {
                id,
                reason: err.to_string(),
            }));
    }
}

/// A record [`Engine::import`] refused.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedRecord {
    /// Schema or item id.
    pub id: String,
    /// Why it was refused.
    pub reason: String,
}
