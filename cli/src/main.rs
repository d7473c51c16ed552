use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use content_schema_core::{
    ContentData, Field, FieldId, FieldMigrationPolicy, FieldType, ItemId, RelationCardinality,
    Schema, SchemaFilter, SchemaId, SchemaKind,
};
use content_schema_db::{
    ContentConfig, ContentItemStore, DEFAULT_CONFIG_FILE, EngineConfig, LocalStore, SchemaStore,
    Snapshot, StorageBackend, parse_document,
};
use content_schema_engine::{Engine, EngineError, SchemaPatch};
use content_schema_sqlite::{Migration, SeedReport, SqliteStore};
use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "CONTENT_SCHEMA_LOG";

/// Relation cardinality with clap argument parsing support.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliCardinality {
    One,
    Many,
}

impl From<CliCardinality> for RelationCardinality {
    fn from(value: CliCardinality) -> Self {
        match value {
            CliCardinality::One => Self::One,
            CliCardinality::Many => Self::Many,
        }
    }
}

/// Field delete policy with clap argument parsing support.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliPolicy {
    Purge,
    Retain,
}

impl From<CliPolicy> for FieldMigrationPolicy {
    fn from(value: CliPolicy) -> Self {
        match value {
            CliPolicy::Purge => Self::Purge,
            CliPolicy::Retain => Self::Retain,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "content-schema")]
#[command(about = "Schema-driven content modeling and validation")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    /// Path to the YAML configuration file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    /// Database or snapshot file path (overrides the configuration).
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// SQLite table prefix (overrides the configuration).
    #[arg(long, global = true)]
    prefix: Option<String>,
    /// Use the local JSON file store instead of SQLite.
    #[arg(long, global = true)]
    local: bool,
    /// Log debug events to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create, inspect, and modify schemas.
    #[command(subcommand)]
    Schema(SchemaCommand),
    /// Add, rename, reorder, and delete schema fields.
    #[command(subcommand)]
    Field(FieldCommand),
    /// Create, validate, and transition content items.
    #[command(subcommand)]
    Item(ItemCommand),
    /// SQLite table migration and seeding operations.
    #[command(subcommand)]
    Migrate(MigrateCommand),
    /// Import schema and item JSON files through the engine.
    Import(ImportArgs),
    /// Write a default configuration file.
    Init(InitArgs),
}

#[derive(Debug, Subcommand)]
enum SchemaCommand {
    /// Create a schema.
    Create(SchemaCreateArgs),
    /// List schemas.
    List(SchemaListArgs),
    /// Print one schema as JSON.
    Show(SchemaRef),
    /// Change a schema's name, description, kind, or field list.
    Update(SchemaUpdateArgs),
    /// Archive a schema; it stops accepting new items.
    Archive(VersionedSchemaRef),
    /// Restore an archived schema.
    Restore(VersionedSchemaRef),
    /// Delete a schema that has no items.
    Delete(VersionedSchemaRef),
}

#[derive(Debug, Args)]
struct SchemaCreateArgs {
    /// Display name.
    #[arg(long)]
    name: String,
    /// Schema kind: collection or single.
    #[arg(long, default_value = "collection")]
    kind: SchemaKind,
    /// Explicit schema id (generated if omitted).
    #[arg(long)]
    id: Option<String>,
    /// Description.
    #[arg(long)]
    description: Option<String>,
    /// JSON file with an array of field definitions.
    #[arg(long)]
    fields: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct SchemaListArgs {
    /// Only schemas of this kind.
    #[arg(long)]
    kind: Option<SchemaKind>,
    /// Only schemas whose name or description contains this text.
    #[arg(long)]
    search: Option<String>,
    /// Include archived schemas.
    #[arg(long)]
    archived: bool,
}

#[derive(Debug, Args)]
struct SchemaRef {
    /// Schema id.
    schema: String,
}

#[derive(Debug, Args)]
struct VersionedSchemaRef {
    /// Schema id.
    schema: String,
    /// Version the change is based on.
    #[arg(long = "version")]
    expected_version: u64,
}

#[derive(Debug, Args)]
struct SchemaUpdateArgs {
    /// Schema id.
    schema: String,
    /// Version the change is based on.
    #[arg(long = "version")]
    expected_version: u64,
    /// New display name.
    #[arg(long)]
    name: Option<String>,
    /// New description (empty string clears it).
    #[arg(long)]
    description: Option<String>,
    /// New kind.
    #[arg(long)]
    kind: Option<SchemaKind>,
    /// JSON file with the new active field list.
    #[arg(long)]
    fields: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum FieldCommand {
    /// Append a field to a schema.
    Add(FieldAddArgs),
    /// Change a field's label.
    Rename(FieldRenameArgs),
    /// Replace the field order.
    Reorder(FieldReorderArgs),
    /// Remove a field, purging or retaining stored data.
    Delete(FieldDeleteArgs),
    /// Remove the stored data of a field that is no longer active.
    Purge(FieldPurgeArgs),
}

#[derive(Debug, Args)]
struct FieldAddArgs {
    /// Schema id.
    schema: String,
    /// Version the change is based on.
    #[arg(long = "version")]
    expected_version: u64,
    /// Field id (generated if omitted).
    #[arg(long)]
    id: Option<String>,
    /// Display label.
    #[arg(long)]
    label: String,
    /// Field type.
    #[arg(long = "type")]
    field_type: FieldType,
    /// Require a non-empty value.
    #[arg(long)]
    required: bool,
    /// Allowed value (enum fields); repeat for each option.
    #[arg(long = "option")]
    options: Vec<String>,
    /// Target schema id (relation fields).
    #[arg(long)]
    target: Option<String>,
    /// Relation cardinality.
    #[arg(long, value_enum)]
    cardinality: Option<CliCardinality>,
    /// Default value as JSON.
    #[arg(long)]
    default: Option<String>,
    /// Help text.
    #[arg(long)]
    description: Option<String>,
}

#[derive(Debug, Args)]
struct FieldRenameArgs {
    /// Schema id.
    schema: String,
    /// Field id.
    field: String,
    /// Version the change is based on.
    #[arg(long = "version")]
    expected_version: u64,
    /// New label.
    #[arg(long)]
    label: String,
}

#[derive(Debug, Args)]
struct FieldReorderArgs {
    /// Schema id.
    schema: String,
    /// Every active field id, in the new order.
    #[arg(required = true)]
    order: Vec<String>,
    /// Version the change is based on.
    #[arg(long = "version")]
    expected_version: u64,
}

#[derive(Debug, Args)]
struct FieldDeleteArgs {
    /// Schema id.
    schema: String,
    /// Field id.
    field: String,
    /// Version the change is based on.
    #[arg(long = "version")]
    expected_version: u64,
    /// What happens to stored item data.
    #[arg(long, value_enum)]
    policy: CliPolicy,
}

#[derive(Debug, Args)]
struct FieldPurgeArgs {
    /// Schema id.
    schema: String,
    /// Field id.
    field: String,
}

#[derive(Debug, Subcommand)]
enum ItemCommand {
    /// Validate and store a new draft item.
    Create(ItemCreateArgs),
    /// Replace an item's data.
    Update(ItemUpdateArgs),
    /// Print one item as JSON.
    Show(ItemRef),
    /// List the items of a schema.
    List(ItemListArgs),
    /// Change an item's status (draft, pending_review, published).
    Transition(ItemTransitionArgs),
    /// Soft-delete an item.
    Archive(ItemRef),
    /// Restore a soft-deleted item.
    Restore(ItemRef),
    /// Delete an item permanently.
    Delete(ItemRef),
    /// Validate data against a schema without storing it.
    Validate(ItemValidateArgs),
    /// Print the items a relation field of an item points at.
    Resolve(ItemResolveArgs),
}

#[derive(Debug, Args)]
struct DataArgs {
    /// Item data as a JSON object.
    #[arg(long, conflicts_with = "data_file")]
    data: Option<String>,
    /// File containing the item data JSON object.
    #[arg(long)]
    data_file: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct ItemCreateArgs {
    /// Schema id.
    schema: String,
    /// Display title.
    #[arg(long, default_value = "")]
    title: String,
    #[command(flatten)]
    data: DataArgs,
}

#[derive(Debug, Args)]
struct ItemUpdateArgs {
    /// Item id.
    item: String,
    /// New display title.
    #[arg(long)]
    title: Option<String>,
    #[command(flatten)]
    data: DataArgs,
}

#[derive(Debug, Args)]
struct ItemRef {
    /// Item id.
    item: String,
}

#[derive(Debug, Args)]
struct ItemListArgs {
    /// Schema id.
    schema: String,
    /// Include soft-deleted items.
    #[arg(long)]
    include_deleted: bool,
}

#[derive(Debug, Args)]
struct ItemTransitionArgs {
    /// Item id.
    item: String,
    /// Target status.
    status: String,
}

#[derive(Debug, Args)]
struct ItemValidateArgs {
    /// Schema id.
    schema: String,
    #[command(flatten)]
    data: DataArgs,
}

#[derive(Debug, Args)]
struct ItemResolveArgs {
    /// Item id.
    item: String,
    /// Relation field id.
    field: String,
}

#[derive(Debug, Subcommand)]
enum MigrateCommand {
    /// Create the content tables.
    Up,
    /// Drop the content tables.
    Down,
    /// Show table status and row counts.
    Status,
    /// Seed the database from a snapshot file or a directory of JSON files.
    Seed(MigrateSourceArgs),
    /// Drop tables, recreate, and reseed.
    Refresh(MigrateSourceArgs),
}

#[derive(Debug, Args)]
struct MigrateSourceArgs {
    /// Snapshot file or directory of JSON documents.
    source: PathBuf,
}

#[derive(Debug, Args)]
struct ImportArgs {
    /// Snapshot, schema, or item JSON files (legacy `content` payloads are accepted).
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

#[derive(Debug, Args)]
struct InitArgs {
    /// Overwrite an existing configuration file.
    #[arg(long)]
    force: bool,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.global.verbose);

    let global = &cli.global;
    let result = match cli.command {
        Command::Schema(command) => run_schema(global, command),
        Command::Field(command) => run_field(global, command),
        Command::Item(command) => run_item(global, command),
        Command::Migrate(command) => run_migrate(global, command),
        Command::Import(args) => run_import(global, args),
        Command::Init(args) => run_init(global, args),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

// ---------------------------------------------------------------------------
// Storage selection
// ---------------------------------------------------------------------------

/// Both store contracts behind one object, so either backend can drive the
/// same engine type.
trait Store: SchemaStore + ContentItemStore {}

impl<T: SchemaStore + ContentItemStore> Store for T {}

type CliEngine<'a> = Engine<&'a dyn Store, &'a dyn Store>;

#[derive(Debug)]
struct Settings {
    backend: StorageBackend,
    path: PathBuf,
    prefix: String,
    content: ContentConfig,
}

fn resolve_settings(global: &GlobalArgs) -> Result<Settings, String> {
    let config = EngineConfig::load_or_default(&global.config).map_err(|e| {
        format!(
            "Failed to load config '{}': {e}",
            global.config.display()
        )
    })?;

    let mut storage = config.storage;
    if global.local {
        storage.backend = StorageBackend::Local;
    }
    if let Some(db) = &global.db {
        storage.path = db.clone();
    }
    if let Some(prefix) = &global.prefix {
        storage.prefix = prefix.clone();
    }
    debug!(backend = ?storage.backend, path = %storage.path.display(), "Resolved storage");

    Ok(Settings {
        backend: storage.backend,
        path: storage.path,
        prefix: storage.prefix,
        content: config.content,
    })
}

fn open_migration(settings: &Settings) -> Result<Migration, String> {
    let conn = rusqlite::Connection::open(&settings.path).map_err(|e| {
        format!(
            "Failed to open database '{}': {e}",
            settings.path.display()
        )
    })?;
    Migration::new(conn, &settings.prefix).map_err(|e| format!("Failed to initialize migration: {e}"))
}

fn with_engine<T>(
    global: &GlobalArgs,
    run: impl FnOnce(&CliEngine<'_>) -> Result<T, String>,
) -> Result<T, String> {
    let settings = resolve_settings(global)?;
    match settings.backend {
        StorageBackend::Local => {
            let local = LocalStore::open(&settings.path);
            let store: &dyn Store = &local;
            run(&Engine::new(store, store).configured(&settings.content))
        }
        StorageBackend::Sqlite => {
            let mut migration = open_migration(&settings)?;
            migration
                .up()
                .map_err(|e| format!("Failed to prepare tables: {e}"))?;
            let sqlite = SqliteStore::new(migration.connection(), &settings.prefix)
                .map_err(|e| format!("Failed to open store: {e}"))?;
            let store: &dyn Store = &sqlite;
            run(&Engine::new(store, store).configured(&settings.content))
        }
    }
}

// ---------------------------------------------------------------------------
// schema command
// ---------------------------------------------------------------------------

fn run_schema(global: &GlobalArgs, command: SchemaCommand) -> Result<(), String> {
    with_engine(global, |engine| {
        let registry = engine.registry();
        match command {
            SchemaCommand::Create(args) => {
                let mut schema = Schema::new(args.name, args.kind);
                if let Some(id) = args.id {
                    schema = schema.with_id(id);
                }
                schema.description = args.description;
                if let Some(path) = &args.fields {
                    schema.fields = read_fields(path)?;
                }
                print_json(&registry.create(schema).map_err(describe)?)
            }
            SchemaCommand::List(args) => {
                let mut filter = SchemaFilter::default();
                if let Some(kind) = args.kind {
                    filter = filter.with_kind(kind);
                }
                if let Some(text) = args.search {
                    filter = filter.with_text(text);
                }
                if args.archived {
                    filter = filter.including_archived();
                }
                let schemas = registry.list(&filter).map_err(describe)?;
                for schema in &schemas {
                    let archived = if schema.is_archived() { " (archived)" } else { "" };
                    println!(
                        "{}\t{}\t{}\tv{}\t{} field(s){archived}",
                        schema.id,
                        schema.name,
                        schema.kind,
                        schema.version,
                        schema.fields.len()
                    );
                }
                Ok(())
            }
            SchemaCommand::Show(args) => {
                print_json(&registry.get(&SchemaId::new(args.schema)).map_err(describe)?)
            }
            SchemaCommand::Update(args) => {
                let mut patch = SchemaPatch::default();
                if let Some(name) = args.name {
                    patch = patch.with_name(name);
                }
                if let Some(description) = args.description {
                    patch = patch.with_description(description);
                }
                if let Some(kind) = args.kind {
                    patch = patch.with_kind(kind);
                }
                if let Some(path) = &args.fields {
                    patch = patch.with_fields(read_fields(path)?);
                }
                let schema = registry
                    .update(&SchemaId::new(args.schema), args.expected_version, patch)
                    .map_err(describe)?;
                print_json(&schema)
            }
            SchemaCommand::Archive(args) => {
                let schema = registry
                    .archive(&SchemaId::new(args.schema), args.expected_version)
                    .map_err(describe)?;
                println!("Archived schema {} (version {}).", schema.id, schema.version);
                Ok(())
            }
            SchemaCommand::Restore(args) => {
                let schema = registry
                    .restore(&SchemaId::new(args.schema), args.expected_version)
                    .map_err(describe)?;
                println!("Restored schema {} (version {}).", schema.id, schema.version);
                Ok(())
            }
            SchemaCommand::Delete(args) => {
                let id = SchemaId::new(args.schema);
                registry
                    .delete(&id, args.expected_version)
                    .map_err(describe)?;
                println!("Deleted schema {id}.");
                Ok(())
            }
        }
    })
}

// ---------------------------------------------------------------------------
// field command
// ---------------------------------------------------------------------------

fn run_field(global: &GlobalArgs, command: FieldCommand) -> Result<(), String> {
    with_engine(global, |engine| {
        let mutations = engine.mutations();
        match command {
            FieldCommand::Add(args) => {
                let schema_id = SchemaId::new(&args.schema);
                let version = args.expected_version;
                let field = build_field(args)?;
                let schema = mutations
                    .add_field(&schema_id, version, field)
                    .map_err(describe)?;
                print_json(&schema)
            }
            FieldCommand::Rename(args) => {
                let schema = mutations
                    .rename_field(
                        &SchemaId::new(args.schema),
                        args.expected_version,
                        &FieldId::new(args.field),
                        args.label,
                    )
                    .map_err(describe)?;
                print_json(&schema)
            }
            FieldCommand::Reorder(args) => {
                let order: Vec<FieldId> = args.order.into_iter().map(FieldId::new).collect();
                let schema = mutations
                    .reorder_fields(&SchemaId::new(args.schema), args.expected_version, &order)
                    .map_err(describe)?;
                print_json(&schema)
            }
            FieldCommand::Delete(args) => {
                let policy: FieldMigrationPolicy = args.policy.into();
                let (schema, deletion) = mutations
                    .delete_field(
                        &SchemaId::new(args.schema),
                        args.expected_version,
                        &FieldId::new(args.field),
                        policy,
                    )
                    .map_err(describe)?;
                println!(
                    "Deleted field {} from schema {} (version {}).",
                    deletion.field.id, schema.id, schema.version
                );
                if policy == FieldMigrationPolicy::Purge {
                    println!("  Items purged: {}", deletion.purged);
                }
                Ok(())
            }
            FieldCommand::Purge(args) => {
                let report = mutations
                    .purge_field_data(&SchemaId::new(args.schema), &FieldId::new(args.field))
                    .map_err(describe)?;
                println!("Purge complete:");
                println!("  Items purged: {}", report.purged);
                println!("  Items failed: {}", report.failures.len());
                for failure in &report.failures {
                    println!("    {failure}");
                }
                if report.failures.is_empty() {
                    Ok(())
                } else {
                    Err(format!("{} item(s) could not be purged", report.failures.len()))
                }
            }
        }
    })
}

fn build_field(args: FieldAddArgs) -> Result<Field, String> {
    let mut field = Field::new(
        args.id.map(FieldId::new).unwrap_or_else(|| FieldId::new("")),
        args.label,
        args.field_type,
    );
    field.required = args.required;
    field.description = args.description;
    if !args.options.is_empty() {
        field.options = Some(args.options);
    }
    if let Some(target) = args.target {
        field.relation_target = Some(SchemaId::new(target));
        field.relation_cardinality = Some(args.cardinality.map(Into::into).unwrap_or_default());
    } else if let Some(cardinality) = args.cardinality {
        field.relation_cardinality = Some(cardinality.into());
    }
    if let Some(raw) = args.default {
        let value = serde_json::from_str(&raw)
            .map_err(|e| format!("--default is not valid JSON: {e}"))?;
        field.default_value = Some(value);
    }
    Ok(field)
}

// ---------------------------------------------------------------------------
// item command
// ---------------------------------------------------------------------------

fn run_item(global: &GlobalArgs, command: ItemCommand) -> Result<(), String> {
    with_engine(global, |engine| {
        let content = engine.content();
        match command {
            ItemCommand::Create(args) => {
                let data = read_data(&args.data)?;
                let item = content
                    .create(&SchemaId::new(args.schema), args.title, &data)
                    .map_err(describe)?;
                print_json(&item)
            }
            ItemCommand::Update(args) => {
                let id = ItemId::new(args.item);
                if args.data.data.is_some() || args.data.data_file.is_some() {
                    content
                        .update(&id, &read_data(&args.data)?)
                        .map_err(describe)?;
                }
                if let Some(title) = args.title {
                    content.retitle(&id, title).map_err(describe)?;
                }
                print_json(&content.get(&id).map_err(describe)?)
            }
            ItemCommand::Show(args) => {
                print_json(&content.get(&ItemId::new(args.item)).map_err(describe)?)
            }
            ItemCommand::List(args) => {
                let items = content
                    .list(&SchemaId::new(args.schema), args.include_deleted)
                    .map_err(describe)?;
                for item in &items {
                    let deleted = if item.is_deleted() { " (deleted)" } else { "" };
                    println!("{}\t{}\t{}{deleted}", item.id, item.status, item.title);
                }
                Ok(())
            }
            ItemCommand::Transition(args) => {
                let item = content
                    .transition_named(&ItemId::new(args.item), &args.status)
                    .map_err(describe)?;
                println!("Item {} is now {}.", item.id, item.status);
                Ok(())
            }
            ItemCommand::Archive(args) => {
                let item = content.archive(&ItemId::new(args.item)).map_err(describe)?;
                println!("Archived item {}.", item.id);
                Ok(())
            }
            ItemCommand::Restore(args) => {
                let item = content.restore(&ItemId::new(args.item)).map_err(describe)?;
                println!("Restored item {}.", item.id);
                Ok(())
            }
            ItemCommand::Delete(args) => {
                let id = ItemId::new(args.item);
                content.delete(&id).map_err(describe)?;
                println!("Deleted item {id}.");
                Ok(())
            }
            ItemCommand::Validate(args) => {
                let schema = engine
                    .registry()
                    .get(&SchemaId::new(args.schema))
                    .map_err(describe)?;
                let data = read_data(&args.data)?;
                print_json(&content.validate(&schema, &data).map_err(describe)?)
            }
            ItemCommand::Resolve(args) => {
                let item = content.get(&ItemId::new(args.item)).map_err(describe)?;
                let schema = engine.registry().get(&item.schema_id).map_err(describe)?;
                let field = schema.find_field(&args.field).ok_or_else(|| {
                    format!("field {} not found in schema {}", args.field, schema.id)
                })?;
                let value = item.data.get(field.id.as_str()).cloned().unwrap_or_default();
                let resolved = engine
                    .resolver()
                    .resolve(field, &value)
                    .map_err(|e| describe(e.into()))?;
                print_json(&resolved.items())
            }
        }
    })
}

fn read_data(args: &DataArgs) -> Result<ContentData, String> {
    let raw = match (&args.data, &args.data_file) {
        (Some(raw), _) => raw.clone(),
        (None, Some(path)) => fs::read_to_string(path)
            .map_err(|e| format!("Failed to read '{}': {e}", path.display()))?,
        (None, None) => return Ok(ContentData::new()),
    };
    serde_json::from_str(&raw).map_err(|e| format!("Item data must be a JSON object: {e}"))
}

fn read_fields(path: &Path) -> Result<Vec<Field>, String> {
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read '{}': {e}", path.display()))?;
    serde_json::from_str(&raw)
        .map_err(|e| format!("Invalid field list in '{}': {e}", path.display()))
}

// ---------------------------------------------------------------------------
// migrate command
// ---------------------------------------------------------------------------

fn run_migrate(global: &GlobalArgs, command: MigrateCommand) -> Result<(), String> {
    let settings = resolve_settings(global)?;
    if settings.backend == StorageBackend::Local {
        return Err("migrate requires the sqlite backend".to_string());
    }
    let mut migration = open_migration(&settings)?;

    match command {
        MigrateCommand::Up => {
            migration
                .up()
                .map_err(|e| format!("Migration up failed: {e}"))?;
            println!(
                "Migration up complete. Tables created with prefix '{}' in '{}'.",
                settings.prefix,
                settings.path.display()
            );
        }
        MigrateCommand::Down => {
            migration
                .down()
                .map_err(|e| format!("Migration down failed: {e}"))?;
            println!(
                "Migration down complete. Tables with prefix '{}' dropped from '{}'.",
                settings.prefix,
                settings.path.display()
            );
        }
        MigrateCommand::Status => {
            let status = migration
                .status()
                .map_err(|e| format!("Failed to get migration status: {e}"))?;
            println!("Migration Status:");
            println!(
                "  Tables exist: {}",
                if status.tables_exist { "yes" } else { "no" }
            );
            println!("  Schema count: {}", status.schema_count);
            println!("  Field count: {}", status.field_count);
            println!("  Item count: {}", status.item_count);
            println!("  Deleted item count: {}", status.deleted_item_count);
        }
        MigrateCommand::Seed(args) => {
            migration
                .up()
                .map_err(|e| format!("Migration up failed: {e}"))?;
            let report = migration
                .seed(&args.source)
                .map_err(|e| format!("Seed failed: {e}"))?;
            println!("Seed complete:");
            print_seed_report(&report);
        }
        MigrateCommand::Refresh(args) => {
            let report = migration
                .refresh(&args.source)
                .map_err(|e| format!("Refresh failed: {e}"))?;
            println!("Refresh complete (tables dropped, recreated, and reseeded):");
            print_seed_report(&report);
        }
    }
    Ok(())
}

fn print_seed_report(report: &SeedReport) {
    println!("  Schemas inserted: {}", report.schemas_inserted);
    println!("  Fields inserted: {}", report.fields_inserted);
    println!("  Options inserted: {}", report.options_inserted);
    println!("  Items inserted: {}", report.items_inserted);
}

// ---------------------------------------------------------------------------
// import / init commands
// ---------------------------------------------------------------------------

fn run_import(global: &GlobalArgs, args: ImportArgs) -> Result<(), String> {
    let parsed: Vec<Result<Snapshot, String>> = args
        .files
        .par_iter()
        .map(|path| read_document(path))
        .collect();

    let mut snapshot = Snapshot::new();
    let mut errors = Vec::new();
    for result in parsed {
        match result {
            Ok(document) => snapshot.extend(document),
            Err(err) => errors.push(err),
        }
    }
    if !errors.is_empty() {
        return Err(errors.join("\n"));
    }

    let report = with_engine(global, |engine| engine.import(snapshot).map_err(describe))?;
    println!("Import complete:");
    println!("  Schemas created: {}", report.schemas_created);
    println!("  Schemas skipped: {}", report.schemas_skipped);
    println!("  Items imported: {}", report.items_imported);
    println!("  Items skipped: {}", report.items_skipped);
    println!("  Rejected: {}", report.rejected.len());
    for rejected in &report.rejected {
        println!("    {}: {}", rejected.id, rejected.reason);
    }
    Ok(())
}

fn read_document(path: &Path) -> Result<Snapshot, String> {
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read '{}': {e}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&raw)
        .map_err(|e| format!("Invalid JSON in '{}': {e}", path.display()))?;
    parse_document(value).map_err(|e| format!("Unsupported document '{}': {e}", path.display()))
}

fn run_init(global: &GlobalArgs, args: InitArgs) -> Result<(), String> {
    if global.config.exists() && !args.force {
        return Err(format!(
            "Config '{}' already exists (use --force to overwrite)",
            global.config.display()
        ));
    }
    let mut config = EngineConfig::default();
    if global.local {
        config.storage.backend = StorageBackend::Local;
    }
    if let Some(db) = &global.db {
        config.storage.path = db.clone();
    }
    if let Some(prefix) = &global.prefix {
        config.storage.prefix = prefix.clone();
    }
    config
        .save(&global.config)
        .map_err(|e| format!("Failed to write '{}': {e}", global.config.display()))?;
    println!("Wrote {}.", global.config.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), String> {
    let json =
        serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))?;
    println!("{json}");
    Ok(())
}

/// Renders an engine error, listing purge failures individually.
fn describe(err: EngineError) -> String {
    match err {
        EngineError::PartialMigration(partial) => {
            let mut out = partial.to_string();
            for failure in &partial.failures {
                out.push_str(&format!("\n  {failure}"));
            }
            out
        }
        other => other.to_string(),
    }
}
