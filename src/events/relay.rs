use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use serde::Deserialize;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::message::{LifecycleEvent, LifecycleMessage};
use crate::error::{Result, SdkError};
use crate::storage::KeyValueStore;

/// Callback registered for a named event.
pub type EventHandler = Arc<dyn Fn(&Event) + Send + Sync>;

/// Returned by [`EventRelay::add_event`]; pass to [`EventRelay::remove_event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// Where an event was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOrigin {
    /// Raised in this context through [`EventRelay::trigger_event`].
    Local,
    /// Re-dispatched from a message another context wrote to the bus.
    Remote,
}

/// An event as delivered to handlers.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub name: String,
    pub origin: EventOrigin,
    pub data: Value,
}

impl Event {
    pub fn is_remote(&self) -> bool {
        self.origin == EventOrigin::Remote
    }
}

/// Local named pub/sub plus a storage-backed message bus.
///
/// Cloning is cheap; clones share handlers and storage.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use baas_client::events::{EventRelay, LifecycleEvent};
/// use baas_client::storage::MemoryStorage;
///
/// let storage = MemoryStorage::new();
/// let relay = EventRelay::new(Arc::new(storage.context()), "baas-message-bus");
/// relay.add_event(LifecycleEvent::TokenExpired, |event| {
///     println!("token expired ({:?})", event.origin);
/// });
/// relay.trigger_event(LifecycleEvent::TokenExpired, serde_json::Value::Null);
/// ```
#[derive(Clone)]
pub struct EventRelay {
    inner: Arc<RelayInner>,
}

struct RelayInner {
    storage: Arc<dyn KeyValueStore>,
    bus_key: String,
    handlers: RwLock<HashMap<String, Vec<(HandlerId, EventHandler)>>>,
    next_id: AtomicU64,
}

impl fmt::Debug for EventRelay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers = self
            .inner
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(name, list)| (name.clone(), list.len()))
            .collect::<HashMap<_, _>>();
        f.debug_struct("EventRelay")
            .field("bus_key", &self.inner.bus_key)
            .field("handlers", &handlers)
            .finish()
    }
}

impl EventRelay {
    pub fn new(storage: Arc<dyn KeyValueStore>, bus_key: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(RelayInner {
                storage,
                bus_key: bus_key.into(),
                handlers: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn bus_key(&self) -> &str {
        &self.inner.bus_key
    }

    /// Register a handler. Handlers for one name run in registration order.
    pub fn add_event<F>(&self, name: impl AsRef<str>, handler: F) -> HandlerId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let id = HandlerId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(name.as_ref().to_string())
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Unregister a handler. Returns whether it was registered under `name`.
    pub fn remove_event(&self, name: impl AsRef<str>, id: HandlerId) -> bool {
        let mut handlers = self
            .inner
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(list) = handlers.get_mut(name.as_ref()) else {
            return false;
        };
        let before = list.len();
        list.retain(|(existing, _)| *existing != id);
        let removed = list.len() != before;
        if list.is_empty() {
            handlers.remove(name.as_ref());
        }
        removed
    }

    pub fn handler_count(&self, name: impl AsRef<str>) -> usize {
        self.inner
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name.as_ref())
            .map_or(0, Vec::len)
    }

    /// Invoke every handler registered for `name`, synchronously.
    pub fn trigger_event(&self, name: impl AsRef<str>, data: Value) {
        self.dispatch(name.as_ref(), EventOrigin::Local, data);
    }

    fn dispatch(&self, name: &str, origin: EventOrigin, data: Value) {
        // Snapshot so handlers may add or remove handlers while running.
        let handlers: Vec<EventHandler> = self
            .inner
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .map(|list| list.iter().map(|(_, handler)| handler.clone()).collect())
            .unwrap_or_default();
        if handlers.is_empty() {
            return;
        }
        let event = Event {
            name: name.to_string(),
            origin,
            data,
        };
        for handler in handlers {
            handler(&event);
        }
    }

    /// Broadcast `message` to other contexts sharing the storage medium.
    ///
    /// The bus key is removed before writing so that repeating an identical
    /// message still produces a change notification.
    pub fn push_message(&self, message: &LifecycleMessage) {
        let serialized = match serde_json::to_string(message) {
            Ok(serialized) => serialized,
            Err(err) => {
                warn!(error = %err, "Failed to serialize lifecycle message");
                return;
            }
        };
        let storage = &self.inner.storage;
        let key = &self.inner.bus_key;
        if let Err(err) = storage.remove(key).and_then(|()| storage.set(key, &serialized)) {
            warn!(key = %key, error = %err, "Failed to write lifecycle message");
        }
    }

    /// Fire `event` locally, then relay it to other contexts.
    pub fn publish(&self, event: LifecycleEvent, data: Value) {
        self.trigger_event(event, data);
        self.push_message(&LifecycleMessage::new(event));
    }

    /// Start delivering bus messages written by other contexts as
    /// [`EventOrigin::Remote`] events.
    ///
    /// Delivery stops when the returned subscription is disposed or dropped.
    pub fn listen(&self) -> Result<MessageBusSubscription> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            SdkError::InvalidState("message bus listener requires a tokio runtime".to_string())
        })?;
        let mut changes = self.inner.storage.subscribe();
        let relay = self.clone();
        let task = runtime.spawn(async move {
            while let Some(change) = changes.recv().await {
                if change.key != relay.bus_key() {
                    continue;
                }
                // The remove half of push_message.
                let Some(raw) = change.new_value else {
                    continue;
                };
                let data: Value = match serde_json::from_str(&raw) {
                    Ok(data) => data,
                    Err(err) => {
                        warn!(error = %err, "Discarding unreadable bus message");
                        continue;
                    }
                };
                match LifecycleMessage::deserialize(&data) {
                    Ok(message) => {
                        debug!(event = %message.kind, "Relaying bus message");
                        relay.dispatch(message.kind.as_ref(), EventOrigin::Remote, data);
                    }
                    Err(err) => warn!(error = %err, "Discarding unknown bus message"),
                }
            }
        });
        Ok(MessageBusSubscription { task })
    }
}

/// Live message-bus listener returned by [`EventRelay::listen`].
#[derive(Debug)]
#[must_use = "dropping the subscription stops cross-context delivery"]
pub struct MessageBusSubscription {
    task: JoinHandle<()>,
}

impl MessageBusSubscription {
    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop delivery. Equivalent to dropping the subscription.
    pub fn dispose(self) {}
}

impl Drop for MessageBusSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}
