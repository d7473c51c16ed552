//! Engine configuration.
//!
//! Defines the YAML-serializable configuration that selects a storage
//! backend and the content lifecycle policy.
//!
//! # Example YAML
//!
//! ```yaml
//! version: "1.0"
//! storage:
//!   backend: sqlite
//!   path: content.db
//!   prefix: cms_
//! content:
//!   review_workflow: true
//! ```

use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Which store implementation backs the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// SQLite database file.
    #[default]
    Sqlite,
    /// [`LocalStore`](crate::LocalStore) backed by a JSON snapshot file.
    Local,
}

/// Storage settings.
///
/// # Examples
///
/// ```
/// # use content_schema_db::{StorageBackend, StorageConfig};
/// let storage = StorageConfig::default();
/// assert_eq!(storage.backend, StorageBackend::Sqlite);
/// assert_eq!(storage.prefix, "cms_");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Backend selection.
    #[serde(default)]
    pub backend: StorageBackend,
    /// Database or snapshot file path.
    #[serde(default = "default_path")]
    pub path: PathBuf,
    /// Table name prefix (SQLite only).
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

fn default_path() -> PathBuf {
    PathBuf::from("content.db")
}

fn default_prefix() -> String {
    "cms_".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: default_path(),
            prefix: default_prefix(),
        }
    }
}

/// Content lifecycle settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentConfig {
    /// Enforce the draft → review → published workflow instead of allowing
    /// any status transition.
    #[serde(default)]
    pub review_workflow: bool,
}

/// Configuration file name looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "content-schema.yaml";

/// Top-level engine configuration.
///
/// Loaded from a YAML file (typically [`DEFAULT_CONFIG_FILE`] in the working
/// directory).
///
/// # Examples
///
/// ```no_run
/// use content_schema_db::{DEFAULT_CONFIG_FILE, EngineConfig};
///
/// let config = EngineConfig::load(DEFAULT_CONFIG_FILE).unwrap();
/// println!("storing content in {}", config.storage.path.display());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Configuration format version (e.g., `"1.0"`).
    pub version: String,
    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Lifecycle settings.
    #[serde(default)]
    pub content: ContentConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            storage: StorageConfig::default(),
            content: ContentConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::StoreError::IoError) if the file cannot
    /// be read, or [`YamlError`](crate::StoreError::YamlError) if parsing
    /// fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let config = serde_yaml::from_reader(reader)?;
        Ok(config)
    }

    /// Loads `path` if it exists, otherwise returns the defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Saves the configuration as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::StoreError::IoError) if the file cannot
    /// be written, or [`YamlError`](crate::StoreError::YamlError) if
    /// serialization fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_yaml() -> &'static str {
        r#"
version: "1.0"
storage:
  backend: local
  path: /var/lib/content.json
  prefix: site_
content:
  review_workflow: true
"#
    }

    #[test]
    fn test_deserialize_complete() {
        let config: EngineConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.storage.backend, StorageBackend::Local);
        assert_eq!(config.storage.path, PathBuf::from("/var/lib/content.json"));
        assert_eq!(config.storage.prefix, "site_");
        assert!(config.content.review_workflow);
    }

    #[test]
    fn test_deserialize_minimal_uses_defaults() {
        let config: EngineConfig = serde_yaml::from_str("version: \"1.0\"\n").unwrap();
        assert_eq!(config.storage, StorageConfig::default());
        assert!(!config.content.review_workflow);
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        let yaml = "version: \"1.0\"\nstorage:\n  backend: postgres\n";
        assert!(serde_yaml::from_str::<EngineConfig>(yaml).is_err());
    }

    #[test]
    fn test_load_save_roundtrip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.yml");

        let original: EngineConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        original.save(&path).unwrap();

        let loaded = EngineConfig::load(&path).unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_load_or_default_without_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = EngineConfig::load_or_default(dir.path().join("absent.yml")).unwrap();
        assert_eq!(config, EngineConfig::default());
    }
}
