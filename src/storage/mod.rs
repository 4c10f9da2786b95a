//! Durable, origin-scoped key-value storage.
//!
//! A *medium* ([`MemoryStorage`], [`FileStorage`]) is shared by any number of
//! *contexts*. Each context is a handle implementing [`KeyValueStore`]. Writes
//! made through one context produce change notifications in every other
//! context attached to the same medium, never in the writer itself. This is
//! the channel the cross-context message bus rides on.

pub mod file;
pub mod memory;

pub use file::{FileStorage, FileStorageConfig, FileStore};
pub use memory::{MemoryStorage, MemoryStore};

use thiserror::Error;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use uuid::Uuid;

const CHANGE_FEED_CAPACITY: usize = 256;

/// Errors raised by a storage medium.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid storage key: {0:?}")]
    InvalidKey(String),
    #[error("Failed to write {key:?}: {source}")]
    Write {
        key: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// A change to one key, as observed by contexts other than the writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    pub key: String,
    pub old_value: Option<String>,
    /// `None` when the key was removed.
    pub new_value: Option<String>,
}

/// String key-value store with change notifications from other contexts.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Subscribe to changes made by other contexts sharing this medium.
    ///
    /// Only changes published after this call are delivered.
    fn subscribe(&self) -> StorageEvents;
}

/// Identity of one context attached to a medium.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(Uuid);

impl ContextId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for ContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone)]
struct Notification {
    origin: ContextId,
    event: StorageEvent,
}

/// Change notifications shared by all contexts of one medium.
#[derive(Debug, Clone)]
pub(crate) struct ChangeFeed {
    sender: broadcast::Sender<Notification>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self { sender }
    }
}

impl ChangeFeed {
    /// Publish a change unless the value did not actually change.
    pub(crate) fn publish(
        &self,
        origin: ContextId,
        key: &str,
        old_value: Option<String>,
        new_value: Option<String>,
    ) {
        if old_value == new_value {
            return;
        }
        // No receivers is not an error: nobody is listening yet.
        let _ = self.sender.send(Notification {
            origin,
            event: StorageEvent {
                key: key.to_string(),
                old_value,
                new_value,
            },
        });
    }

    pub(crate) fn subscribe(&self, own: ContextId) -> StorageEvents {
        StorageEvents {
            receiver: self.sender.subscribe(),
            own,
        }
    }
}

/// Receiver of [`StorageEvent`]s written by other contexts.
#[derive(Debug)]
pub struct StorageEvents {
    receiver: broadcast::Receiver<Notification>,
    own: ContextId,
}

impl StorageEvents {
    /// Wait for the next foreign change. Returns `None` once the medium is gone.
    pub async fn recv(&mut self) -> Option<StorageEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(notification) if notification.origin == self.own => continue,
                Ok(notification) => return Some(notification.event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Storage change feed lagged; notifications dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Take the next foreign change if one is already queued.
    pub fn try_recv(&mut self) -> Option<StorageEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(notification) if notification.origin == self.own => continue,
                Ok(notification) => return Some(notification.event),
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Storage change feed lagged; notifications dropped");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }
}
