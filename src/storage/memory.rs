use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::{ChangeFeed, ContextId, KeyValueStore, StorageError, StorageEvents};

/// In-process shared medium. Every [`MemoryStore`] created by [`context`]
/// sees the same entries, like browser tabs sharing local storage.
///
/// # Example
/// ```
/// use baas_client::storage::{KeyValueStore, MemoryStorage};
///
/// let storage = MemoryStorage::new();
/// let first = storage.context();
/// let second = storage.context();
/// first.set("greeting", "hello")?;
/// assert_eq!(second.get("greeting")?.as_deref(), Some("hello"));
/// # Ok::<(), baas_client::storage::StorageError>(())
/// ```
///
/// [`context`]: MemoryStorage::context
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<RwLock<HashMap<String, String>>>,
    feed: ChangeFeed,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a new context to this medium.
    pub fn context(&self) -> MemoryStore {
        MemoryStore {
            id: ContextId::new(),
            entries: self.entries.clone(),
            feed: self.feed.clone(),
        }
    }
}

/// One context of a [`MemoryStorage`].
#[derive(Debug)]
pub struct MemoryStore {
    id: ContextId,
    entries: Arc<RwLock<HashMap<String, String>>>,
    feed: ChangeFeed,
}

impl MemoryStore {
    pub fn id(&self) -> ContextId {
        self.id
    }
}

fn poisoned<T>(_: T) -> StorageError {
    StorageError::Unavailable("memory storage lock poisoned".to_string())
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.read().map_err(poisoned)?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let old = self
            .entries
            .write()
            .map_err(poisoned)?
            .insert(key.to_string(), value.to_string());
        self.feed
            .publish(self.id, key, old, Some(value.to_string()));
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let old = self.entries.write().map_err(poisoned)?.remove(key);
        self.feed.publish(self.id, key, old, None);
        Ok(())
    }

    fn subscribe(&self) -> StorageEvents {
        self.feed.subscribe(self.id)
    }
}
