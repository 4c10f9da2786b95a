use std::sync::{Arc, PoisonError, RwLock, Weak};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::events::{EventRelay, HandlerId, LifecycleEvent};
use crate::storage::KeyValueStore;

/// Identity of the authenticated user, as returned by the platform.
///
/// Fields this type does not model are kept in `extra` and survive a
/// persistence round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub user_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserInfo {
    pub fn new(user_name: impl Into<String>) -> Self {
        Self {
            user_name: user_name.into(),
            display_name: None,
            email: None,
            roles: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn is_in_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.eq_ignore_ascii_case(role))
    }
}

/// Persisted, cross-context cache of the authenticated user's info.
///
/// Changes fire [`LifecycleEvent::UserChanged`] locally and on the message
/// bus. A remote `userChanged` drops the in-memory copy so the next
/// [`get`](UserStore::get) re-reads storage.
#[derive(Clone)]
pub struct UserStore {
    inner: Arc<UserInner>,
}

struct UserInner {
    key: String,
    storage: Arc<dyn KeyValueStore>,
    relay: EventRelay,
    cache: RwLock<Option<UserInfo>>,
    handler: HandlerId,
}

impl std::fmt::Debug for UserStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserStore")
            .field("key", &self.inner.key)
            .finish()
    }
}

impl UserStore {
    pub fn new(storage: Arc<dyn KeyValueStore>, relay: EventRelay, key: impl Into<String>) -> Self {
        let key = key.into();
        let inner = Arc::new_cyclic(|weak: &Weak<UserInner>| {
            let weak = weak.clone();
            let handler = relay.add_event(LifecycleEvent::UserChanged, move |event| {
                if !event.is_remote() {
                    return;
                }
                if let Some(inner) = weak.upgrade() {
                    debug!(key = %inner.key, "User changed in another context");
                    inner.set_cache(None);
                }
            });
            UserInner {
                key,
                storage,
                relay: relay.clone(),
                cache: RwLock::new(None),
                handler,
            }
        });
        Self { inner }
    }

    pub fn key(&self) -> &str {
        &self.inner.key
    }

    /// Replace the cached user, or clear it with `None`. Never fails.
    pub fn set(&self, user: Option<UserInfo>) {
        let inner = &self.inner;
        let payload = match &user {
            Some(user) => match serde_json::to_value(user) {
                Ok(payload) => payload,
                Err(err) => {
                    warn!(key = %inner.key, error = %err, "Failed to serialize user");
                    return;
                }
            },
            None => Value::Null,
        };
        let written = match &user {
            Some(_) => inner.storage.set(&inner.key, &payload.to_string()),
            None => inner.storage.remove(&inner.key),
        };
        if let Err(err) = written {
            warn!(key = %inner.key, error = %err, "Failed to persist user");
        }
        inner.set_cache(user);
        inner.relay.publish(LifecycleEvent::UserChanged, payload);
    }

    pub fn clear(&self) {
        self.set(None);
    }

    /// Cached user, falling back to the persisted value.
    pub fn get(&self) -> Option<UserInfo> {
        let inner = &self.inner;
        if let Some(user) = inner
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        {
            return Some(user);
        }
        let raw = match inner.storage.get(&inner.key) {
            Ok(raw) => raw?,
            Err(err) => {
                warn!(key = %inner.key, error = %err, "Failed to read user");
                return None;
            }
        };
        match serde_json::from_str::<UserInfo>(&raw) {
            Ok(user) => {
                inner.set_cache(Some(user.clone()));
                Some(user)
            }
            Err(err) => {
                warn!(key = %inner.key, error = %err, "Discarding unreadable user");
                None
            }
        }
    }
}

impl UserInner {
    fn set_cache(&self, user: Option<UserInfo>) {
        *self.cache.write().unwrap_or_else(PoisonError::into_inner) = user;
    }
}

impl Drop for UserInner {
    fn drop(&mut self) {
        self.relay
            .remove_event(LifecycleEvent::UserChanged, self.handler);
    }
}
