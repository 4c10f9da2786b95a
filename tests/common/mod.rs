//! Shared test helpers: instrumented storage, event recording and
//! multi-context wiring.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use baas_client::auth::{TokenManager, UserStore};
use baas_client::events::{EventOrigin, EventRelay, LifecycleEvent, MessageBusSubscription};
use baas_client::storage::{KeyValueStore, MemoryStorage, MemoryStore, StorageError, StorageEvents};

pub const TOKEN_KEY: &str = "baas-auth-token-test";
pub const USER_KEY: &str = "baas-user-info-test";
pub const BUS_KEY: &str = "baas-message-bus";

/// Store wrapper that records every write.
pub struct CountingStore {
    inner: MemoryStore,
    sets: Mutex<Vec<String>>,
    removes: Mutex<Vec<String>>,
}

impl CountingStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            sets: Mutex::new(Vec::new()),
            removes: Mutex::new(Vec::new()),
        }
    }

    pub fn sets_of(&self, key: &str) -> usize {
        self.sets.lock().unwrap().iter().filter(|k| *k == key).count()
    }

    pub fn removes_of(&self, key: &str) -> usize {
        self.removes.lock().unwrap().iter().filter(|k| *k == key).count()
    }
}

impl KeyValueStore for CountingStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.sets.lock().unwrap().push(key.to_string());
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.removes.lock().unwrap().push(key.to_string());
        self.inner.remove(key)
    }

    fn subscribe(&self) -> StorageEvents {
        self.inner.subscribe()
    }
}

/// Records lifecycle events seen by a relay.
#[derive(Clone, Default)]
pub struct EventRecorder {
    seen: Arc<Mutex<Vec<(String, EventOrigin, serde_json::Value)>>>,
}

impl EventRecorder {
    pub fn attach(relay: &EventRelay) -> Self {
        let recorder = Self::default();
        for event in [
            LifecycleEvent::TokenExpired,
            LifecycleEvent::TokenUpdated,
            LifecycleEvent::UserChanged,
        ] {
            let seen = recorder.seen.clone();
            relay.add_event(event, move |e| {
                seen.lock()
                    .unwrap()
                    .push((e.name.clone(), e.origin, e.data.clone()));
            });
        }
        recorder
    }

    pub fn count(&self, event: LifecycleEvent, origin: EventOrigin) -> usize {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, o, _)| name == event.as_ref() && *o == origin)
            .count()
    }

    pub fn last_data(&self, event: LifecycleEvent) -> Option<serde_json::Value> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(name, _, _)| name == event.as_ref())
            .map(|(_, _, data)| data.clone())
    }

    pub fn total(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

/// One "tab": a storage handle with its own relay, managers and listener.
pub struct Context {
    pub store: Arc<CountingStore>,
    pub relay: EventRelay,
    pub tokens: TokenManager,
    pub users: UserStore,
    pub events: EventRecorder,
    pub subscription: Option<MessageBusSubscription>,
}

impl Context {
    /// Attach to `medium` without listening to other contexts.
    pub fn detached(medium: &MemoryStorage) -> Self {
        let store = Arc::new(CountingStore::new(medium.context()));
        let shared: Arc<dyn KeyValueStore> = store.clone();
        let relay = EventRelay::new(shared.clone(), BUS_KEY);
        let events = EventRecorder::attach(&relay);
        let tokens = TokenManager::new(shared.clone(), relay.clone(), TOKEN_KEY);
        let users = UserStore::new(shared, relay.clone(), USER_KEY);
        Self {
            store,
            relay,
            tokens,
            users,
            events,
            subscription: None,
        }
    }

    /// Attach to `medium` and listen to other contexts. Requires a runtime.
    pub fn listening(medium: &MemoryStorage) -> Self {
        let mut context = Self::detached(medium);
        context.subscription = Some(context.relay.listen().unwrap());
        context
    }
}

/// Poll `condition` until it holds or about a second passes.
pub async fn eventually(condition: impl Fn() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

/// Give spawned listener tasks a chance to drain pending notifications.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
