//! Client configuration (layered: builder > env > TOML file > defaults).

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SdkError};

pub const DEFAULT_API_ROOT_URL: &str = "api.baasic.com";
pub const DEFAULT_API_VERSION: &str = "beta";
pub const DEFAULT_NAMESPACE: &str = "baas";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

const ENV_API_KEY: &str = "BAAS_API_KEY";
const ENV_API_ROOT_URL: &str = "BAAS_API_ROOT_URL";
const ENV_API_VERSION: &str = "BAAS_API_VERSION";
const ENV_USE_SSL: &str = "BAAS_USE_SSL";
const ENV_NAMESPACE: &str = "BAAS_NAMESPACE";
const ENV_REQUEST_TIMEOUT_SECS: &str = "BAAS_REQUEST_TIMEOUT_SECS";

/// Settings for one application instance.
///
/// # Example
/// ```
/// use baas_client::config::ClientConfig;
///
/// let config = ClientConfig::new("my-app").with_api_version("v1");
/// assert_eq!(config.base_url().unwrap().as_str(), "https://api.baasic.com/v1/my-app/");
/// assert_eq!(config.token_key(), "baas-auth-token-my-app");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub api_key: String,
    pub api_root_url: String,
    pub api_version: String,
    pub use_ssl: bool,
    /// Prefix for every storage key this client writes.
    pub namespace: String,
    pub request_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_root_url: DEFAULT_API_ROOT_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            use_ssl: true,
            namespace: DEFAULT_NAMESPACE.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Read a TOML file. Missing keys take their defaults.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|err| {
            SdkError::Configuration(format!("invalid config file {}: {err}", path.display()))
        })
    }

    /// Defaults overridden by `BAAS_*` environment variables (and `.env`).
    pub fn from_env() -> Result<Self> {
        Self::default().with_env()
    }

    /// Full resolution: optional file, then environment.
    ///
    /// A `path` that does not exist is skipped.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let base = match path {
            Some(path) if path.exists() => Self::load_from_path(path)?,
            _ => Self::default(),
        };
        base.with_env()
    }

    /// Apply `BAAS_*` environment overrides on top of `self`.
    pub fn with_env(self) -> Result<Self> {
        let _ = dotenvy::dotenv(); // .env is optional
        self.with_overrides(|name| std::env::var(name).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(value) = lookup(ENV_API_KEY) {
            self.api_key = value;
        }
        if let Some(value) = lookup(ENV_API_ROOT_URL) {
            self.api_root_url = value;
        }
        if let Some(value) = lookup(ENV_API_VERSION) {
            self.api_version = value;
        }
        if let Some(value) = lookup(ENV_USE_SSL) {
            self.use_ssl = parse_bool(ENV_USE_SSL, &value)?;
        }
        if let Some(value) = lookup(ENV_NAMESPACE) {
            self.namespace = value;
        }
        if let Some(value) = lookup(ENV_REQUEST_TIMEOUT_SECS) {
            self.request_timeout_secs = value.trim().parse().map_err(|_| {
                SdkError::Configuration(format!("{ENV_REQUEST_TIMEOUT_SECS} must be a number, got {value:?}"))
            })?;
        }
        Ok(self)
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    pub fn with_api_root_url(mut self, root: impl Into<String>) -> Self {
        self.api_root_url = root.into();
        self
    }

    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    pub fn with_use_ssl(mut self, use_ssl: bool) -> Self {
        self.use_ssl = use_ssl;
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_request_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(SdkError::Configuration(format!(
                "api key is required (set {ENV_API_KEY})"
            )));
        }
        if self.api_root_url.trim().trim_matches('/').is_empty() {
            return Err(SdkError::Configuration("api root url is required".to_string()));
        }
        Ok(())
    }

    /// `<scheme>://<root>/<version>/<api key>/`
    pub fn base_url(&self) -> Result<Url> {
        self.validate()?;
        let scheme = if self.use_ssl { "https" } else { "http" };
        let root = self.api_root_url.trim().trim_end_matches('/');
        let mut url = Url::parse(&format!("{scheme}://{root}/")).map_err(|err| {
            SdkError::Configuration(format!("invalid api root url {root:?}: {err}"))
        })?;
        url.path_segments_mut()
            .map_err(|_| SdkError::Configuration(format!("api root url {root:?} cannot be a base")))?
            .pop_if_empty()
            .extend(self.api_version.split('/').filter(|s| !s.is_empty()))
            .push(&self.api_key)
            .push("");
        Ok(url)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn token_key(&self) -> String {
        format!("{}-auth-token-{}", self.namespace, self.api_key)
    }

    pub fn user_key(&self) -> String {
        format!("{}-user-info-{}", self.namespace, self.api_key)
    }

    pub fn message_bus_key(&self) -> String {
        format!("{}-message-bus", self.namespace)
    }

    /// `config.toml` in the platform config directory, if one exists.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "baas", "baas-client")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(SdkError::Configuration(format!(
            "{name} must be a boolean, got {value:?}"
        ))),
    }
}
