//! Key-value notebook storage
//!
//! One string entry per notebook (`{prefix}{id}`) plus an index entry
//! (`{prefix}_index`) holding a JSON id -> title map for listing.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::store::{document_updated_at, NotebookStore, NotebookSummary};
use super::StorageError;
use crate::model::{Id, Notebook};

/// Default entry prefix
pub const DEFAULT_PREFIX: &str = "notebook_";

/// Minimal string key-value backend
pub trait KeyValueBackend: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Fails without writing anything when the value does not fit
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Keys starting with `prefix`, sorted
    fn keys(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}

impl<T: KeyValueBackend + ?Sized> KeyValueBackend for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove(key)
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        (**self).keys(prefix)
    }
}

/// In-process backend with an optional byte quota (keys + values)
#[derive(Clone, Default)]
pub struct MemoryKv {
    entries: Arc<Mutex<BTreeMap<String, String>>>,
    quota: Option<usize>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota: usize) -> Self {
        Self {
            entries: Arc::default(),
            quota: Some(quota),
        }
    }

    /// Bytes currently used
    pub fn usage(&self) -> usize {
        self.entries
            .lock()
            .iter()
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }
}

impl KeyValueBackend for MemoryKv {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock();
        if let Some(quota) = self.quota {
            let current: usize = entries.iter().map(|(k, v)| k.len() + v.len()).sum();
            let replaced = entries.get(key).map(|v| key.len() + v.len()).unwrap_or(0);
            let needed = current - replaced + key.len() + value.len();
            if needed > quota {
                return Err(StorageError::QuotaExceeded { needed, quota });
            }
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.lock().remove(key);
        Ok(())
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        Ok(self
            .entries
            .lock()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

/// [`NotebookStore`] over any [`KeyValueBackend`]
#[derive(Clone)]
pub struct KeyValueNotebookStore<B> {
    backend: B,
    prefix: String,
}

impl<B: KeyValueBackend> KeyValueNotebookStore<B> {
    pub fn new(backend: B) -> Self {
        Self::with_prefix(backend, DEFAULT_PREFIX)
    }

    pub fn with_prefix(backend: B, prefix: impl Into<String>) -> Self {
        Self {
            backend,
            prefix: prefix.into(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn entry_key(&self, id: &Id) -> String {
        format!("{}{}", self.prefix, id)
    }

    fn index_key(&self) -> String {
        format!("{}_index", self.prefix)
    }

    fn read_index(&self) -> Result<BTreeMap<String, String>, StorageError> {
        match self.backend.get(&self.index_key())? {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(index) => Ok(index),
                Err(e) => {
                    tracing::warn!(error = %e, "Notebook index unreadable, starting fresh");
                    Ok(BTreeMap::new())
                }
            },
            None => Ok(BTreeMap::new()),
        }
    }

    fn write_index(&self, index: &BTreeMap<String, String>) -> Result<(), StorageError> {
        self.backend
            .set(&self.index_key(), &serde_json::to_string(index)?)
    }
}

impl<B: KeyValueBackend> NotebookStore for KeyValueNotebookStore<B> {
    fn save(&self, notebook: &Notebook) -> Result<(), StorageError> {
        let key = self.entry_key(notebook.id());
        let document = notebook.to_json()?;
        let previous = self.backend.get(&key)?;
        self.backend.set(&key, &document)?;

        let mut index = self.read_index()?;
        index.insert(notebook.id().to_string(), notebook.title.clone());
        if let Err(e) = self.write_index(&index) {
            // Keep entry and index consistent
            let rollback = match previous {
                Some(prev) => self.backend.set(&key, &prev),
                None => self.backend.remove(&key),
            };
            if let Err(rb) = rollback {
                tracing::warn!(key = %key, error = %rb, "Failed to roll back notebook entry");
            }
            return Err(e);
        }

        tracing::debug!(notebook_id = %notebook.id(), bytes = document.len(), "Notebook saved");
        Ok(())
    }

    fn load(&self, id: &Id) -> Result<Option<Notebook>, StorageError> {
        match self.backend.get(&self.entry_key(id))? {
            Some(raw) => Ok(Some(Notebook::from_json(&raw)?)),
            None => Ok(None),
        }
    }

    fn delete(&self, id: &Id) -> Result<(), StorageError> {
        self.backend.remove(&self.entry_key(id))?;
        let mut index = self.read_index()?;
        if index.remove(id.as_str()).is_some() {
            self.write_index(&index)?;
        }
        Ok(())
    }

    fn list(&self) -> Result<Vec<NotebookSummary>, StorageError> {
        let mut summaries = Vec::new();
        for (id, title) in self.read_index()? {
            let id = Id::from(id);
            if id.is_empty() {
                tracing::warn!("Skipping index entry with empty id");
                continue;
            }
            let Some(raw) = self.backend.get(&self.entry_key(&id))? else {
                tracing::warn!(notebook_id = %id, "Index entry without document");
                continue;
            };
            let Some(updated_at) = document_updated_at(&raw) else {
                tracing::warn!(notebook_id = %id, "Stored document has no updatedAt");
                continue;
            };
            summaries.push(NotebookSummary {
                id,
                title,
                updated_at,
            });
        }
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }
}
