//! Initialize-once resource registry

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::OnceCell;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    #[error("Failed to load resource '{key}': {message}")]
    Init { key: String, message: String },
    #[error("Resource '{key}' holds a different type")]
    TypeMismatch { key: String },
}

type Slot = Arc<OnceCell<Arc<dyn Any + Send + Sync>>>;

/// Keyed resources, each initialized at most once.
///
/// Concurrent loads of the same key share one initialization. A failed
/// initialization leaves the slot empty so a later call can retry.
#[derive(Default)]
pub struct ResourceRegistry {
    slots: Mutex<HashMap<String, Slot>>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &str) -> Slot {
        self.slots
            .lock()
            .entry(key.to_string())
            .or_default()
            .clone()
    }

    /// Return the resource under `key`, running `init` if it was never loaded
    pub async fn get_or_init<T, F, Fut>(&self, key: &str, init: F) -> Result<Arc<T>, ResourceError>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, String>>,
    {
        let slot = self.slot(key);
        let value = slot
            .get_or_try_init(|| async move {
                tracing::debug!(key, "Loading resource");
                let value = init().await.map_err(|message| {
                    tracing::warn!(key, error = %message, "Resource failed to load");
                    ResourceError::Init {
                        key: key.to_string(),
                        message,
                    }
                })?;
                tracing::info!(key, "Resource loaded");
                Ok::<_, ResourceError>(Arc::new(value) as Arc<dyn Any + Send + Sync>)
            })
            .await?
            .clone();
        value
            .downcast::<T>()
            .map_err(|_| ResourceError::TypeMismatch {
                key: key.to_string(),
            })
    }

    /// Install an already-built resource. Returns false when the key is
    /// already loaded; the existing value is kept.
    pub fn provide<T: Send + Sync + 'static>(&self, key: &str, value: T) -> bool {
        self.slot(key)
            .set(Arc::new(value) as Arc<dyn Any + Send + Sync>)
            .is_ok()
    }

    /// Loaded resource under `key`, if any
    pub fn get<T: Send + Sync + 'static>(&self, key: &str) -> Option<Arc<T>> {
        let slot = self.slots.lock().get(key).cloned()?;
        slot.get().cloned()?.downcast::<T>().ok()
    }

    pub fn is_loaded(&self, key: &str) -> bool {
        self.slots
            .lock()
            .get(key)
            .is_some_and(|slot| slot.initialized())
    }

    /// Keys with a loaded resource, sorted
    pub fn loaded_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .slots
            .lock()
            .iter()
            .filter(|(_, slot)| slot.initialized())
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }
}
