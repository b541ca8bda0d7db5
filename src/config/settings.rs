use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use toml_edit::{DocumentMut, Item, Table};

use crate::data::{DEFAULT_ASSET_THRESHOLD, DEFAULT_PREFIX};
use crate::model::DEFAULT_AUTOSAVE_INTERVAL_MS;
use crate::snapshot::RestoreOptions;
use crate::util::paths::config_path;

/// Example configuration file contents (bundled with the binary)
pub const EXAMPLE_CONFIG: &str = include_str!("config.toml.example");

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub storage: StorageConfig,
    pub autosave: AutosaveConfig,
    pub restore: RestoreConfig,
    pub clone: CloneConfig,
    /// Defaults applied to newly created notebooks
    pub notebook: NotebookDefaults,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    KeyValue,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageBackend::Sqlite => "sqlite",
            StorageBackend::KeyValue => "key-value",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sqlite" => Some(StorageBackend::Sqlite),
            "key-value" | "kv" => Some(StorageBackend::KeyValue),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// None = unbounded
    pub kv_quota_bytes: Option<usize>,
    pub kv_prefix: String,
    pub asset_threshold_bytes: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Sqlite,
            kv_quota_bytes: Some(5 * 1024 * 1024),
            kv_prefix: DEFAULT_PREFIX.to_string(),
            asset_threshold_bytes: DEFAULT_ASSET_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlStorageConfig {
    pub backend: Option<StorageBackend>,
    pub kv_quota_bytes: Option<usize>,
    pub kv_prefix: Option<String>,
    pub asset_threshold_bytes: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutosaveConfig {
    pub enabled: bool,
    pub interval_ms: u64,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: DEFAULT_AUTOSAVE_INTERVAL_MS,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlAutosaveConfig {
    pub enabled: Option<bool>,
    pub interval_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestoreConfig {
    pub readiness_timeout_ms: u64,
    pub replay_markup: bool,
}

impl Default for RestoreConfig {
    fn default() -> Self {
        Self {
            readiness_timeout_ms: 5_000,
            replay_markup: false,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlRestoreConfig {
    pub readiness_timeout_ms: Option<u64>,
    pub replay_markup: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloneConfig {
    pub ttl_secs: u64,
}

impl Default for CloneConfig {
    fn default() -> Self {
        Self { ttl_secs: 300 }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlCloneConfig {
    pub ttl_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotebookDefaults {
    pub default_language: String,
    pub theme: String,
    pub author: String,
}

impl Default for NotebookDefaults {
    fn default() -> Self {
        Self {
            default_language: "python".to_string(),
            theme: "light".to_string(),
            author: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlNotebookDefaults {
    pub default_language: Option<String>,
    pub theme: Option<String>,
    pub author: Option<String>,
}

/// TOML representation of the config file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    pub storage: Option<TomlStorageConfig>,
    pub autosave: Option<TomlAutosaveConfig>,
    pub restore: Option<TomlRestoreConfig>,
    pub clone: Option<TomlCloneConfig>,
    pub notebook: Option<TomlNotebookDefaults>,
}

impl Config {
    /// Load configuration from ~/.livenote/config.toml, merging with defaults
    pub fn load() -> Self {
        Self::load_from(&config_path())
    }

    /// Load configuration from `path`. A missing file is created from the
    /// bundled example; an unreadable or invalid file leaves the defaults.
    pub fn load_from(path: &Path) -> Self {
        let mut config = Config::default();

        // Create example config on first run
        if !path.exists() {
            Self::create_default_config(path);
        }

        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<TomlConfig>(&contents) {
                Ok(toml_config) => config.merge(toml_config),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Invalid config, using defaults");
                }
            },
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Config not readable");
            }
        }

        config
    }

    fn merge(&mut self, toml_config: TomlConfig) {
        if let Some(storage) = toml_config.storage {
            if let Some(backend) = storage.backend {
                self.storage.backend = backend;
            }
            if let Some(quota) = storage.kv_quota_bytes {
                self.storage.kv_quota_bytes = (quota > 0).then_some(quota);
            }
            if let Some(prefix) = storage.kv_prefix {
                self.storage.kv_prefix = prefix;
            }
            if let Some(threshold) = storage.asset_threshold_bytes {
                self.storage.asset_threshold_bytes = threshold;
            }
        }

        if let Some(autosave) = toml_config.autosave {
            if let Some(enabled) = autosave.enabled {
                self.autosave.enabled = enabled;
            }
            if let Some(interval_ms) = autosave.interval_ms {
                self.autosave.interval_ms = interval_ms.max(1);
            }
        }

        if let Some(restore) = toml_config.restore {
            if let Some(timeout) = restore.readiness_timeout_ms {
                self.restore.readiness_timeout_ms = timeout;
            }
            if let Some(replay) = restore.replay_markup {
                self.restore.replay_markup = replay;
            }
        }

        if let Some(clone) = toml_config.clone {
            if let Some(ttl) = clone.ttl_secs {
                self.clone.ttl_secs = ttl;
            }
        }

        if let Some(notebook) = toml_config.notebook {
            if let Some(language) = notebook.default_language {
                self.notebook.default_language = language;
            }
            if let Some(theme) = notebook.theme {
                self.notebook.theme = theme;
            }
            if let Some(author) = notebook.author {
                self.notebook.author = author;
            }
        }
    }

    /// Create the default config file from the bundled example
    fn create_default_config(path: &Path) {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                if let Err(e) = fs::create_dir_all(parent) {
                    tracing::warn!(error = %e, "Failed to create config directory");
                    return;
                }
            }
        }

        if let Err(e) = fs::write(path, EXAMPLE_CONFIG) {
            tracing::warn!(error = %e, "Failed to write default config");
        }
    }

    pub fn autosave_interval(&self) -> Duration {
        Duration::from_millis(self.autosave.interval_ms)
    }

    pub fn clone_ttl(&self) -> Duration {
        Duration::from_secs(self.clone.ttl_secs)
    }

    pub fn restore_options(&self) -> RestoreOptions {
        RestoreOptions {
            replay_markup: self.restore.replay_markup,
            readiness_timeout: Duration::from_millis(self.restore.readiness_timeout_ms),
        }
    }
}

/// Save the storage backend to ~/.livenote/config.toml
pub fn save_storage_backend(backend: StorageBackend) -> std::io::Result<()> {
    save_storage_backend_to(&config_path(), backend)
}

/// Set `[storage] backend` in the config at `path`, preserving every other
/// line including comments.
pub fn save_storage_backend_to(path: &Path, backend: StorageBackend) -> std::io::Result<()> {
    // Read existing config or start with empty document
    let contents = if path.exists() {
        fs::read_to_string(path)?
    } else {
        String::new()
    };

    let mut doc: DocumentMut = contents
        .parse()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    if !doc.contains_key("storage") {
        doc["storage"] = Item::Table(Table::new());
    }
    doc["storage"]["backend"] = toml_edit::value(backend.as_str());

    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    fs::write(path, doc.to_string())?;

    Ok(())
}
