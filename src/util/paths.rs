//! Path utilities for the livenote data directory

use std::path::PathBuf;
use std::sync::OnceLock;

/// Custom data directory, set once at startup
static DATA_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Initialize the data directory with an optional custom path.
/// Call early in main() before any other path function.
/// If custom_path is None, ~/.livenote is used.
pub fn init_data_dir(custom_path: Option<PathBuf>) {
    let path = custom_path.unwrap_or_else(default_data_dir);
    if DATA_DIR.set(path.clone()).is_err() {
        let existing = DATA_DIR
            .get()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<unknown>".to_string());
        tracing::debug!(
            path = %path.display(),
            existing = %existing,
            "Data directory already initialized"
        );
    }
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".livenote"))
        .unwrap_or_else(|| PathBuf::from(".livenote"))
}

/// Base data directory: the custom path if one was set, otherwise ~/.livenote
pub fn data_dir() -> PathBuf {
    DATA_DIR.get().cloned().unwrap_or_else(default_data_dir)
}

/// SQLite database file (~/.livenote/livenote.db)
pub fn database_path() -> PathBuf {
    data_dir().join("livenote.db")
}

/// ~/.livenote/logs
pub fn logs_dir() -> PathBuf {
    data_dir().join("logs")
}

/// ~/.livenote/logs/livenote.log
pub fn log_file_path() -> PathBuf {
    logs_dir().join("livenote.log")
}

/// ~/.livenote/config.toml
pub fn config_path() -> PathBuf {
    data_dir().join("config.toml")
}

/// Default directory for exported notebook files (~/.livenote/exports)
pub fn exports_dir() -> PathBuf {
    data_dir().join("exports")
}
