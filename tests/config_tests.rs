//! Tests for layered client configuration.

use std::sync::{Mutex, OnceLock};

use baas_client::config::ClientConfig;
use baas_client::error::SdkError;
use tempfile::TempDir;

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

const CONFIG_ENV_VARS: [&str; 6] = [
    "BAAS_API_KEY",
    "BAAS_API_ROOT_URL",
    "BAAS_API_VERSION",
    "BAAS_USE_SSL",
    "BAAS_NAMESPACE",
    "BAAS_REQUEST_TIMEOUT_SECS",
];

struct EnvGuard {
    saved: Vec<(String, Option<String>)>,
}

impl EnvGuard {
    fn capture(keys: &[&str]) -> Self {
        let saved = keys
            .iter()
            .map(|key| ((*key).to_string(), std::env::var(key).ok()))
            .collect();
        Self { saved }
    }

    fn cleared(keys: &[&str]) -> Self {
        let guard = Self::capture(keys);
        for key in keys {
            std::env::remove_var(key);
        }
        guard
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in &self.saved {
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
        }
    }
}

fn env_lock_guard() -> std::sync::MutexGuard<'static, ()> {
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[test]
fn from_env_reads_baas_variables() {
    let _lock = env_lock_guard();
    let _env = EnvGuard::cleared(&CONFIG_ENV_VARS);
    std::env::set_var("BAAS_API_KEY", "env-app");
    std::env::set_var("BAAS_API_ROOT_URL", "localhost:5000");
    std::env::set_var("BAAS_USE_SSL", "false");
    std::env::set_var("BAAS_NAMESPACE", "demo");

    let config = ClientConfig::from_env().unwrap();

    assert_eq!(config.api_key, "env-app");
    assert_eq!(
        config.base_url().unwrap().as_str(),
        "http://localhost:5000/beta/env-app/"
    );
    assert_eq!(config.token_key(), "demo-auth-token-env-app");
    assert_eq!(config.message_bus_key(), "demo-message-bus");
}

#[test]
fn env_overrides_file_and_builder_overrides_env() {
    let _lock = env_lock_guard();
    let _env = EnvGuard::cleared(&CONFIG_ENV_VARS);
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        "api_key = \"file-app\"\napi_version = \"v2\"\nrequest_timeout_secs = 10\n",
    )
    .unwrap();
    std::env::set_var("BAAS_REQUEST_TIMEOUT_SECS", "20");

    let config = ClientConfig::load(Some(path.as_path())).unwrap();
    assert_eq!(config.api_key, "file-app");
    assert_eq!(config.api_version, "v2");
    assert_eq!(config.request_timeout_secs, 20);

    let config = config.with_api_key("code-app");
    assert_eq!(config.user_key(), "baas-user-info-code-app");
}

#[test]
fn missing_config_file_falls_back_to_env() {
    let _lock = env_lock_guard();
    let _env = EnvGuard::cleared(&CONFIG_ENV_VARS);
    std::env::set_var("BAAS_API_KEY", "env-app");
    let dir = TempDir::new().unwrap();

    let config = ClientConfig::load(Some(dir.path().join("absent.toml").as_path())).unwrap();

    assert_eq!(config, ClientConfig::new("env-app"));
}

#[test]
fn invalid_env_value_is_reported() {
    let _lock = env_lock_guard();
    let _env = EnvGuard::cleared(&CONFIG_ENV_VARS);
    std::env::set_var("BAAS_USE_SSL", "sometimes");

    let err = ClientConfig::from_env().unwrap_err();
    assert!(matches!(err, SdkError::Configuration(ref m) if m.contains("BAAS_USE_SSL")));
}

#[test]
fn missing_api_key_fails_validation() {
    let _lock = env_lock_guard();
    let _env = EnvGuard::cleared(&CONFIG_ENV_VARS);

    let config = ClientConfig::from_env().unwrap();
    assert!(matches!(config.base_url(), Err(SdkError::Configuration(_))));
}
