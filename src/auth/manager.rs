use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::token::{now_millis, Token};
use crate::events::{EventRelay, HandlerId, LifecycleEvent};
use crate::storage::KeyValueStore;

/// Owns the current access token for one scoped key.
///
/// The token is persisted as JSON in a [`KeyValueStore`]. While a token with
/// a deadline is current, a single timer is armed that clears it on expiry.
/// Every change is announced through the [`EventRelay`] as
/// [`LifecycleEvent::TokenUpdated`] or [`LifecycleEvent::TokenExpired`], both
/// locally and to other contexts.
///
/// Remote `tokenExpired` messages disarm this manager's timer without
/// touching storage; remote `tokenUpdated` messages re-arm it from the
/// persisted token.
///
/// Cloning is cheap; clones share the timer.
#[derive(Clone)]
pub struct TokenManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    key: String,
    storage: Arc<dyn KeyValueStore>,
    relay: EventRelay,
    timer: Mutex<Option<ArmedTimer>>,
    generation: AtomicU64,
    handlers: Vec<(LifecycleEvent, HandlerId)>,
}

struct ArmedTimer {
    generation: u64,
    /// The persisted token this timer expires.
    token: Token,
    handle: JoinHandle<()>,
}

impl fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenManager")
            .field("key", &self.inner.key)
            .field("timer_armed", &self.is_timer_armed())
            .finish()
    }
}

impl TokenManager {
    pub fn new(storage: Arc<dyn KeyValueStore>, relay: EventRelay, key: impl Into<String>) -> Self {
        let key = key.into();
        let inner = Arc::new_cyclic(|weak: &Weak<ManagerInner>| {
            let on_expired = {
                let weak = weak.clone();
                relay.add_event(LifecycleEvent::TokenExpired, move |event| {
                    if !event.is_remote() {
                        return;
                    }
                    if let Some(inner) = weak.upgrade() {
                        debug!(key = %inner.key, "Token expired in another context");
                        inner.disarm();
                    }
                })
            };
            let on_updated = {
                let weak = weak.clone();
                relay.add_event(LifecycleEvent::TokenUpdated, move |event| {
                    if !event.is_remote() {
                        return;
                    }
                    if let Some(inner) = weak.upgrade() {
                        debug!(key = %inner.key, "Token updated in another context");
                        inner.rearm_from_storage();
                    }
                })
            };
            ManagerInner {
                key,
                storage,
                relay: relay.clone(),
                timer: Mutex::new(None),
                generation: AtomicU64::new(0),
                handlers: vec![
                    (LifecycleEvent::TokenExpired, on_expired),
                    (LifecycleEvent::TokenUpdated, on_updated),
                ],
            }
        });
        Self { inner }
    }

    /// Storage key the token is persisted under.
    pub fn key(&self) -> &str {
        &self.inner.key
    }

    /// Replace the current token, or clear it with `None`.
    ///
    /// A missing `expire_time` is derived from `expires_in` (preferred) or
    /// `sliding_window`. A token whose deadline has already passed is
    /// treated as `None`. Never fails: storage errors are logged.
    pub fn store(&self, token: Option<Token>) {
        self.inner.disarm();
        let Some(mut token) = token else {
            self.inner.clear();
            return;
        };

        let now = now_millis();
        if token.expire_time.is_none() {
            token.expire_time = token.deadline_from(now);
        }
        let remaining = token.expire_time.map(|deadline| deadline.saturating_sub(now));
        if matches!(remaining, Some(ms) if ms <= 0) {
            debug!(key = %self.inner.key, "Stored token is already expired");
            self.inner.clear();
            return;
        }

        let payload = match serde_json::to_value(&token) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(key = %self.inner.key, error = %err, "Failed to serialize token");
                return;
            }
        };
        if let Err(err) = self.inner.storage.set(&self.inner.key, &payload.to_string()) {
            warn!(key = %self.inner.key, error = %err, "Failed to persist token");
        }
        if let Some(ms) = remaining {
            self.inner.arm(token, Duration::from_millis(ms.unsigned_abs()));
        }
        self.inner.relay.publish(LifecycleEvent::TokenUpdated, payload);
    }

    /// The last persisted token. Missing, unreadable and corrupt values all
    /// read as `None`.
    pub fn get(&self) -> Option<Token> {
        self.inner.read()
    }

    pub fn is_authenticated(&self) -> bool {
        self.get().is_some()
    }

    /// Pick up a token persisted by an earlier run or another context.
    ///
    /// Arms the timer for a live token and clears an expired one.
    pub fn resume(&self) {
        let Some(token) = self.get() else {
            return;
        };
        let now = now_millis();
        match token.expire_time {
            Some(deadline) if deadline <= now => {
                debug!(key = %self.inner.key, "Persisted token expired while inactive");
                self.store(None);
            }
            Some(deadline) => {
                self.inner.disarm();
                let delay = Duration::from_millis(deadline.saturating_sub(now).unsigned_abs());
                self.inner.arm(token, delay);
            }
            None => {}
        }
    }

    pub fn is_timer_armed(&self) -> bool {
        self.inner.lock_timer().is_some()
    }
}

impl ManagerInner {
    fn lock_timer(&self) -> MutexGuard<'_, Option<ArmedTimer>> {
        self.timer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read(&self) -> Option<Token> {
        let raw = match self.storage.get(&self.key) {
            Ok(raw) => raw?,
            Err(err) => {
                warn!(key = %self.key, error = %err, "Failed to read token");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(token) => Some(token),
            Err(err) => {
                warn!(key = %self.key, error = %err, "Discarding unreadable token");
                None
            }
        }
    }

    fn arm(self: &Arc<Self>, token: Token, delay: Duration) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(key = %self.key, "No tokio runtime; token expiration timer not armed");
            return;
        };
        // Held across the spawn: the task must not wake before its generation
        // is in the slot.
        let mut slot = self.lock_timer();
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let weak = Arc::downgrade(self);
        let handle = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                inner.expire(generation);
            }
        });
        debug!(key = %self.key, delay_ms = delay.as_millis() as u64, "Armed token expiration timer");
        if let Some(previous) = slot.replace(ArmedTimer {
            generation,
            token,
            handle,
        }) {
            previous.handle.abort();
        }
    }

    fn disarm(&self) {
        if let Some(armed) = self.lock_timer().take() {
            armed.handle.abort();
        }
    }

    /// Timer callback. Ignored if the timer was replaced after it woke.
    ///
    /// Only clears when storage still holds the token the timer was armed
    /// for. Otherwise another context already cleared or replaced it, and
    /// its relayed message is what announces the change here.
    fn expire(&self, generation: u64) {
        let armed = {
            let mut slot = self.lock_timer();
            match slot.take() {
                Some(armed) if armed.generation == generation => armed,
                other => {
                    *slot = other;
                    return;
                }
            }
        };
        let persisted = self.read();
        if !persisted.as_ref().is_some_and(|current| armed.is_for(current)) {
            debug!(key = %self.key, "Token changed elsewhere before expiry; not clearing");
            return;
        }
        debug!(key = %self.key, "Token expired");
        self.clear();
    }

    fn clear(&self) {
        if let Err(err) = self.storage.remove(&self.key) {
            warn!(key = %self.key, error = %err, "Failed to remove token");
        }
        self.relay.publish(LifecycleEvent::TokenExpired, Value::Null);
    }

    fn rearm_from_storage(self: &Arc<Self>) {
        self.disarm();
        let Some(token) = self.read() else {
            return;
        };
        let Some(deadline) = token.expire_time else {
            return;
        };
        let remaining = deadline.saturating_sub(now_millis());
        // Never write from here; a past deadline is the writer's to clear.
        if remaining > 0 {
            self.arm(token, Duration::from_millis(remaining.unsigned_abs()));
        }
    }
}

impl ArmedTimer {
    fn is_for(&self, current: &Token) -> bool {
        self.token.token == current.token && self.token.expire_time == current.expire_time
    }
}

impl Drop for ManagerInner {
    fn drop(&mut self) {
        if let Some(armed) = self.lock_timer().take() {
            armed.handle.abort();
        }
        for (event, id) in &self.handlers {
            self.relay.remove_event(event, *id);
        }
    }
}
