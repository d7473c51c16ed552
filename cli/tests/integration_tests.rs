use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};

use serde_json::{Value, json};

/// Helper to create a temp directory that is cleaned up on drop.
struct TempDir {
    path: PathBuf,
}

impl TempDir {
    fn new(name: &str) -> Self {
        let path = std::env::temp_dir().join(format!(
            "content_schema_cli_test_{name}_{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&path);
        fs::create_dir_all(&path).expect("failed to create temp dir");
        Self { path }
    }

    fn path(&self) -> &PathBuf {
        &self.path
    }

    fn join(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

/// Runs the binary against a local JSON store inside `dir`.
fn run_local(dir: &TempDir, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_content-schema"))
        .args(args)
        .arg("--config")
        .arg(dir.join("content-schema.yaml"))
        .arg("--local")
        .arg("--db")
        .arg(dir.join("content.json"))
        .output()
        .expect("failed to run content-schema")
}

/// Runs the binary against a SQLite database inside `dir`.
fn run_sqlite(dir: &TempDir, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_content-schema"))
        .args(args)
        .arg("--config")
        .arg(dir.join("content-schema.yaml"))
        .arg("--db")
        .arg(dir.join("content.db"))
        .arg("--prefix")
        .arg("cs_")
        .output()
        .expect("failed to run content-schema")
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).into_owned()
}

fn json_stdout(out: &Output) -> Value {
    assert!(out.status.success(), "command failed: {}", stderr(out));
    serde_json::from_slice(&out.stdout).expect("stdout should be JSON")
}

/// Field list for a blog post schema: required `title`, enum `category`.
fn write_fields(dir: &TempDir) -> PathBuf {
    let fields = json!([
        { "id": "title", "label": "Title", "type": "text", "required": true },
        { "id": "category", "label": "Category", "type": "enum", "options": ["A", "B"] }
    ]);
    let path = dir.join("fields.json");
    fs::write(&path, serde_json::to_string_pretty(&fields).unwrap())
        .expect("failed to write fields");
    path
}

fn create_posts(dir: &TempDir, run: fn(&TempDir, &[&str]) -> Output) {
    let fields = write_fields(dir);
    let schema = json_stdout(&run(
        dir,
        &[
            "schema",
            "create",
            "--name",
            "Blog Post",
            "--id",
            "posts",
            "--fields",
            fields.to_str().unwrap(),
        ],
    ));
    assert_eq!(schema["version"], 1);
}

// ---------------------------------------------------------------------------
// init
// ---------------------------------------------------------------------------

#[test]
fn init_writes_config_once() {
    let dir = TempDir::new("init");
    let config = dir.join("content-schema.yaml");
    let bin = env!("CARGO_BIN_EXE_content-schema");

    let status = Command::new(bin)
        .args(["init", "--config", config.to_str().unwrap(), "--prefix", "site_"])
        .status()
        .expect("failed to run init");
    assert!(status.success());
    let yaml = fs::read_to_string(&config).unwrap();
    assert!(yaml.contains("prefix: site_"), "config: {yaml}");

    let out = Command::new(bin)
        .args(["init", "--config", config.to_str().unwrap()])
        .output()
        .expect("failed to run init");
    assert!(!out.status.success(), "second init should refuse to overwrite");
    assert!(stderr(&out).contains("already exists"));
}

// ---------------------------------------------------------------------------
// schema / field / item against the local store
// ---------------------------------------------------------------------------

#[test]
fn item_create_reports_missing_required_field() {
    let dir = TempDir::new("missing_field");
    create_posts(&dir, run_local);

    let out = run_local(&dir, &["item", "create", "posts", "--data", "{}"]);
    assert_eq!(out.status.code(), Some(1));
    let err = stderr(&out);
    assert!(err.contains("title"), "stderr: {err}");
}

#[test]
fn field_delete_purge_removes_item_data() {
    let dir = TempDir::new("purge");
    create_posts(&dir, run_local);

    let item = json_stdout(&run_local(
        &dir,
        &[
            "item",
            "create",
            "posts",
            "--title",
            "Hello",
            "--data",
            r#"{"title": "Hello", "category": "A"}"#,
        ],
    ));
    let id = item["id"].as_str().unwrap().to_string();
    assert_eq!(item["data"]["category"], "A");

    let out = run_local(
        &dir,
        &["field", "delete", "posts", "category", "--version", "1", "--policy", "purge"],
    );
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert!(stdout(&out).contains("Items purged: 1"));

    let item = json_stdout(&run_local(&dir, &["item", "show", &id]));
    assert!(item["data"].get("category").is_none());
    assert_eq!(item["data"]["title"], "Hello");
}

#[test]
fn stale_version_is_rejected() {
    let dir = TempDir::new("stale");
    create_posts(&dir, run_local);

    let out = run_local(
        &dir,
        &["field", "rename", "posts", "title", "--version", "1", "--label", "Headline"],
    );
    assert!(out.status.success(), "stderr: {}", stderr(&out));

    let out = run_local(&dir, &["schema", "archive", "posts", "--version", "1"]);
    assert!(!out.status.success());
    assert!(
        stderr(&out).contains("modified concurrently"),
        "stderr: {}",
        stderr(&out)
    );

    let schema = json_stdout(&run_local(&dir, &["schema", "show", "posts"]));
    assert_eq!(schema["version"], 2);
    assert_eq!(schema["fields"][0]["label"], "Headline");
}

#[test]
fn item_transition_by_name() {
    let dir = TempDir::new("transition");
    create_posts(&dir, run_local);
    let item = json_stdout(&run_local(
        &dir,
        &["item", "create", "posts", "--data", r#"{"title": "x"}"#],
    ));
    let id = item["id"].as_str().unwrap().to_string();

    let out = run_local(&dir, &["item", "transition", &id, "published"]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert!(stdout(&out).contains("is now published"));

    let out = run_local(&dir, &["item", "transition", &id, "scheduled"]);
    assert!(!out.status.success());
    assert!(stderr(&out).contains("scheduled"));
}

#[test]
fn import_accepts_legacy_content_payloads() {
    let dir = TempDir::new("import");
    create_posts(&dir, run_local);

    let legacy = json!([
        { "id": "legacy-1", "schemaId": "posts", "title": "Old", "content": { "title": "Old" } },
        { "id": "legacy-2", "schema_id": "posts", "title": "Bad", "content": {} }
    ]);
    let file = dir.join("legacy.json");
    fs::write(&file, serde_json::to_string(&legacy).unwrap()).unwrap();

    let out = run_local(&dir, &["import", file.to_str().unwrap()]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let text = stdout(&out);
    assert!(text.contains("Items imported: 1"), "stdout: {text}");
    assert!(text.contains("Rejected: 1"), "stdout: {text}");

    let item = json_stdout(&run_local(&dir, &["item", "show", "legacy-1"]));
    assert_eq!(item["data"]["title"], "Old");
    assert!(item.get("content").is_none());
}

// ---------------------------------------------------------------------------
// SQLite backend
// ---------------------------------------------------------------------------

#[test]
fn migrate_up_creates_tables() {
    let dir = TempDir::new("migrate_up");

    let out = run_sqlite(&dir, &["migrate", "up"]);
    assert!(out.status.success(), "migrate up should succeed");

    let out = run_sqlite(&dir, &["migrate", "status"]);
    let text = stdout(&out);
    assert!(
        text.contains("Tables exist: yes"),
        "Tables should exist after up. stdout: {text}"
    );
}

#[test]
fn migrate_seed_populates_database() {
    let dir = TempDir::new("migrate_seed");
    let source = TempDir::new("migrate_seed_source");
    let snapshot = json!({
        "schemas": [{
            "id": "homepage",
            "name": "Homepage",
            "kind": "single",
            "fields": [{ "id": "headline", "label": "Headline", "type": "text" }],
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-01T00:00:00Z"
        }],
        "items": [{
            "id": "home",
            "schemaId": "homepage",
            "title": "Home",
            "data": { "headline": "Welcome" },
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-01T00:00:00Z"
        }]
    });
    fs::write(
        source.join("snapshot.json"),
        serde_json::to_string_pretty(&snapshot).unwrap(),
    )
    .unwrap();

    let out = run_sqlite(&dir, &["migrate", "seed", source.path().to_str().unwrap()]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let text = stdout(&out);
    assert!(text.contains("Schemas inserted: 1"), "stdout: {text}");
    assert!(text.contains("Items inserted: 1"), "stdout: {text}");

    // The seeded single schema is full.
    let out = run_sqlite(
        &dir,
        &["item", "create", "homepage", "--data", r#"{"headline": "Again"}"#],
    );
    assert!(!out.status.success());
    assert!(stderr(&out).contains("homepage"), "stderr: {}", stderr(&out));
}

#[test]
fn sqlite_schema_lifecycle() {
    let dir = TempDir::new("sqlite_schema");
    create_posts(&dir, run_sqlite);

    let out = run_sqlite(&dir, &["schema", "list"]);
    assert!(stdout(&out).contains("posts\tBlog Post\tcollection\tv1"));

    let out = run_sqlite(&dir, &["schema", "archive", "posts", "--version", "1"]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let out = run_sqlite(&dir, &["schema", "list"]);
    assert!(!stdout(&out).contains("posts"));
    let out = run_sqlite(&dir, &["schema", "list", "--archived"]);
    assert!(stdout(&out).contains("(archived)"));

    let out = run_sqlite(&dir, &["schema", "delete", "posts", "--version", "2"]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let out = run_sqlite(&dir, &["schema", "show", "posts"]);
    assert!(stderr(&out).contains("schema not found"));
}
