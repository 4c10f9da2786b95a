//! Application context: one explicit instance per configured app.

use std::sync::Arc;

use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::auth::{LoginClient, TokenManager, UserStore};
use crate::config::ClientConfig;
use crate::error::Result;
use crate::events::{Event, EventRelay, HandlerId, LifecycleEvent, MessageBusSubscription};
use crate::http::{ApiClient, HttpTransport, ReqwestTransport};
use crate::resources::{Resource, ResourceClient};
use crate::routes::ResourceRoute;
use crate::storage::KeyValueStore;

/// Wires storage, the event relay, the token manager and the HTTP client
/// together for one API key.
///
/// Creating an `Application` inside a tokio runtime starts the message-bus
/// listener and resumes any persisted token. Dropping it stops both.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use baas_client::app::Application;
/// use baas_client::config::ClientConfig;
/// use baas_client::events::LifecycleEvent;
/// use baas_client::storage::MemoryStorage;
///
/// # async fn example() -> baas_client::error::Result<()> {
/// let app = Application::new(
///     ClientConfig::new("my-app"),
///     Arc::new(MemoryStorage::new().context()),
/// )?;
/// app.on(LifecycleEvent::TokenExpired, |_| println!("session ended"));
/// # Ok(())
/// # }
/// ```
pub struct Application {
    config: ClientConfig,
    storage: Arc<dyn KeyValueStore>,
    relay: EventRelay,
    users: UserStore,
    api: ApiClient,
    subscription: Option<MessageBusSubscription>,
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("api_key", &self.config.api_key)
            .field("base_url", &self.api.base_url().as_str())
            .field("listening", &self.is_listening())
            .finish()
    }
}

impl Application {
    /// Build with the default `reqwest` transport.
    pub fn new(config: ClientConfig, storage: Arc<dyn KeyValueStore>) -> Result<Self> {
        let transport = ReqwestTransport::new(config.request_timeout())?;
        Self::with_transport(config, storage, Arc::new(transport))
    }

    pub fn with_transport(
        config: ClientConfig,
        storage: Arc<dyn KeyValueStore>,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self> {
        let base_url = config.base_url()?;
        let relay = EventRelay::new(storage.clone(), config.message_bus_key());
        let tokens = TokenManager::new(storage.clone(), relay.clone(), config.token_key());
        let users = UserStore::new(storage.clone(), relay.clone(), config.user_key());

        let subscription = match relay.listen() {
            Ok(subscription) => Some(subscription),
            Err(err) => {
                warn!(error = %err, "Cross-context events disabled");
                None
            }
        };
        tokens.resume();

        debug!(base_url = %base_url, "Application initialized");
        Ok(Self {
            api: ApiClient::new(transport, tokens, base_url),
            config,
            storage,
            relay,
            users,
            subscription,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn base_url(&self) -> &Url {
        self.api.base_url()
    }

    pub fn storage(&self) -> &Arc<dyn KeyValueStore> {
        &self.storage
    }

    pub fn relay(&self) -> &EventRelay {
        &self.relay
    }

    pub fn tokens(&self) -> &TokenManager {
        self.api.tokens()
    }

    pub fn users(&self) -> &UserStore {
        &self.users
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Whether other contexts' lifecycle messages are being delivered.
    pub fn is_listening(&self) -> bool {
        self.subscription
            .as_ref()
            .is_some_and(MessageBusSubscription::is_active)
    }

    /// Stop delivering other contexts' lifecycle messages.
    pub fn stop_listening(&mut self) {
        self.subscription.take();
    }

    pub fn login(&self) -> LoginClient {
        LoginClient::new(self.api.clone(), self.users.clone())
    }

    pub fn resource<T>(&self, resource: Resource) -> Result<ResourceClient<T>>
    where
        T: Serialize + DeserializeOwned,
    {
        let route = ResourceRoute::new(self.api.base_url().clone(), resource.path())?;
        Ok(ResourceClient::new(self.api.clone(), route))
    }

    /// Register a lifecycle handler, local and remote.
    pub fn on<F>(&self, event: LifecycleEvent, handler: F) -> HandlerId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.relay.add_event(event, handler)
    }

    pub fn off(&self, event: LifecycleEvent, id: HandlerId) -> bool {
        self.relay.remove_event(event, id)
    }
}
