//! Typed clients for platform resources.

use std::fmt;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use strum::EnumString;

use crate::error::Result;
use crate::http::ApiClient;
use crate::routes::{FindOptions, GetOptions, ResourceRoute};

/// Well-known resource families and their collection paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumString)]
pub enum Resource {
    #[strum(serialize = "users")]
    Users,
    #[strum(serialize = "lookups/roles")]
    Roles,
    #[strum(serialize = "article")]
    Articles,
    #[strum(serialize = "article-tags")]
    ArticleTags,
    #[strum(serialize = "files")]
    Files,
    #[strum(serialize = "media-vault")]
    MediaVault,
    #[strum(serialize = "key-values")]
    KeyValues,
    #[strum(serialize = "value-sets")]
    ValueSets,
    #[strum(serialize = "templates")]
    Templates,
    #[strum(serialize = "application-settings")]
    ApplicationSettings,
    #[strum(serialize = "notifications/subscriptions")]
    NotificationSubscriptions,
    #[strum(serialize = "metering/data")]
    MeteringData,
    #[strum(serialize = "metering/categories")]
    MeteringCategories,
    #[strum(serialize = "commerce/products")]
    CommerceProducts,
    #[strum(serialize = "commerce/customers")]
    CommerceCustomers,
    /// Any other path, including dynamic resources.
    #[strum(default)]
    Custom(String),
}

impl Resource {
    /// Items of a dynamic-resource schema.
    pub fn dynamic(schema: &str) -> Self {
        Self::Custom(format!("resources/{}", schema.trim_matches('/')))
    }

    /// Collection path relative to the application base URL.
    pub fn path(&self) -> &str {
        match self {
            Self::Users => "users",
            Self::Roles => "lookups/roles",
            Self::Articles => "article",
            Self::ArticleTags => "article-tags",
            Self::Files => "files",
            Self::MediaVault => "media-vault",
            Self::KeyValues => "key-values",
            Self::ValueSets => "value-sets",
            Self::Templates => "templates",
            Self::ApplicationSettings => "application-settings",
            Self::NotificationSubscriptions => "notifications/subscriptions",
            Self::MeteringData => "metering/data",
            Self::MeteringCategories => "metering/categories",
            Self::CommerceProducts => "commerce/products",
            Self::CommerceCustomers => "commerce/customers",
            Self::Custom(path) => path,
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// One page of a collection query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionResponse<T> {
    #[serde(default = "Vec::new")]
    pub item: Vec<T>,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub rpp: u32,
    #[serde(default)]
    pub total_records: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embed: Option<String>,
}

/// CRUD client for one resource collection.
///
/// # Example
/// ```no_run
/// use baas_client::app::Application;
/// use baas_client::config::ClientConfig;
/// use baas_client::resources::Resource;
/// use baas_client::routes::FindOptions;
/// use baas_client::storage::MemoryStorage;
/// use std::sync::Arc;
///
/// # async fn example() -> baas_client::error::Result<()> {
/// let app = Application::new(
///     ClientConfig::new("my-app"),
///     Arc::new(MemoryStorage::new().context()),
/// )?;
/// let articles = app.resource::<serde_json::Value>(Resource::Articles)?;
/// let page = articles.find(&FindOptions::builder().rpp(5).build()).await?;
/// println!("{} articles", page.total_records);
/// # Ok(())
/// # }
/// ```
pub struct ResourceClient<T> {
    api: ApiClient,
    route: ResourceRoute,
    _item: PhantomData<fn() -> T>,
}

impl<T> Clone for ResourceClient<T> {
    fn clone(&self) -> Self {
        Self {
            api: self.api.clone(),
            route: self.route.clone(),
            _item: PhantomData,
        }
    }
}

impl<T> fmt::Debug for ResourceClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceClient")
            .field("route", &self.route)
            .finish()
    }
}

impl<T> ResourceClient<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(api: ApiClient, route: ResourceRoute) -> Self {
        Self {
            api,
            route,
            _item: PhantomData,
        }
    }

    pub fn route(&self) -> &ResourceRoute {
        &self.route
    }

    pub async fn find(&self, options: &FindOptions) -> Result<CollectionResponse<T>> {
        self.api.get(self.route.find(options)).await
    }

    pub async fn get(&self, id: &str, options: &GetOptions) -> Result<T> {
        self.api.get(self.route.get(id, options)).await
    }

    pub async fn create(&self, item: &T) -> Result<T> {
        self.api.post(self.route.create(), item).await
    }

    pub async fn update(&self, id: &str, item: &T) -> Result<T> {
        self.api.put_json(self.route.update(id), item).await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.api.delete::<()>(self.route.delete(id), None).await
    }

    pub async fn batch_create(&self, items: &[T]) -> Result<Vec<T>> {
        self.api.post(self.route.batch(), items).await
    }

    pub async fn batch_update(&self, items: &[T]) -> Result<()> {
        self.api.put(self.route.batch(), items).await
    }

    pub async fn batch_delete(&self, ids: &[&str]) -> Result<()> {
        self.api.delete(self.route.batch(), Some(ids)).await
    }

    /// Client for a sub-resource of one item, e.g. its ACL.
    pub fn child<U>(&self, id: &str, segment: &str) -> ResourceClient<U>
    where
        U: Serialize + DeserializeOwned,
    {
        ResourceClient::new(self.api.clone(), self.route.child(id, segment))
    }
}
