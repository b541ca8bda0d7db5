mod settings;

pub use settings::{
    save_storage_backend, save_storage_backend_to, AutosaveConfig, CloneConfig, Config,
    NotebookDefaults, RestoreConfig, StorageBackend, StorageConfig, TomlConfig, EXAMPLE_CONFIG,
};
