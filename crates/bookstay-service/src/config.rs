// ABOUTME: Configuration loading for the bookstay marketplace.
// ABOUTME: Reads environment variables that pick the local data file and, optionally, the remote KV store.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use bookstay_store::{
    DEFAULT_DATA_FILE, DEFAULT_KEY, DurableStore, LocalFileStore, PersistenceCoordinator,
    RemoteKvStore,
};
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("BOOKSTAY_DATA_FILE is set but empty")]
    EmptyDataFile,

    #[error("KV_REST_API_URL must be an http(s) URL, got: {0}")]
    InvalidRemoteUrl(String),
}

/// Credentials for the remote key-value store.
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    pub url: String,
    pub token: String,
    pub key: String,
}

impl fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("url", &self.url)
            .field("token", &"<redacted>")
            .field("key", &self.key)
            .finish()
    }
}

/// Marketplace configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct MarketConfig {
    pub data_file: PathBuf,
    pub remote: Option<RemoteConfig>,
}

impl MarketConfig {
    /// Configuration that persists only to `data_file`.
    pub fn local(data_file: impl Into<PathBuf>) -> Self {
        Self {
            data_file: data_file.into(),
            remote: None,
        }
    }

    /// Load configuration from environment variables with sensible defaults.
    ///
    /// Environment variables:
    /// - BOOKSTAY_DATA_FILE: local snapshot file (default: database.json)
    /// - KV_REST_API_URL: remote KV REST endpoint (optional)
    /// - KV_REST_API_TOKEN: bearer token for the remote KV store (optional)
    /// - BOOKSTAY_KV_KEY: key holding the snapshot remotely (default: store)
    ///
    /// The remote store is used only when both the URL and the token are set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_file = match lookup("BOOKSTAY_DATA_FILE") {
            Some(path) if path.trim().is_empty() => return Err(ConfigError::EmptyDataFile),
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_DATA_FILE),
        };

        let url = lookup("KV_REST_API_URL").filter(|v| !v.is_empty());
        let token = lookup("KV_REST_API_TOKEN").filter(|v| !v.is_empty());

        let remote = match (url, token) {
            (Some(url), Some(token)) => {
                if !(url.starts_with("https://") || url.starts_with("http://")) {
                    return Err(ConfigError::InvalidRemoteUrl(url));
                }
                let key = lookup("BOOKSTAY_KV_KEY")
                    .filter(|v| !v.is_empty())
                    .unwrap_or_else(|| DEFAULT_KEY.to_string());
                Some(RemoteConfig { url, token, key })
            }
            (None, None) => None,
            (Some(_), None) | (None, Some(_)) => {
                tracing::warn!(
                    "only one of KV_REST_API_URL / KV_REST_API_TOKEN is set; using the local file only"
                );
                None
            }
        };

        Ok(Self { data_file, remote })
    }

    /// Build the persistence coordinator this configuration describes.
    pub fn coordinator(&self) -> PersistenceCoordinator {
        let local: Arc<dyn DurableStore> = Arc::new(LocalFileStore::new(&self.data_file));
        let remote = self.remote.as_ref().map(|remote| {
            Arc::new(RemoteKvStore::new(
                remote.url.clone(),
                remote.token.clone(),
                remote.key.clone(),
            )) as Arc<dyn DurableStore>
        });
        PersistenceCoordinator::new(remote, local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn config_loads_defaults() {
        let config = MarketConfig::from_lookup(lookup_from(&[])).unwrap();

        assert_eq!(config.data_file, PathBuf::from("database.json"));
        assert!(config.remote.is_none());
        assert_eq!(config.coordinator().primary_name(), "local-file");
    }

    #[test]
    fn config_selects_remote_when_both_credentials_present() {
        let config = MarketConfig::from_lookup(lookup_from(&[
            ("KV_REST_API_URL", "https://kv.example.com"),
            ("KV_REST_API_TOKEN", "secret"),
        ]))
        .unwrap();

        let remote = config.remote.clone().expect("remote configured");
        assert_eq!(remote.url, "https://kv.example.com");
        assert_eq!(remote.key, "store");
        assert_eq!(config.coordinator().primary_name(), "remote-kv");
    }

    #[test]
    fn config_ignores_half_configured_remote() {
        let config = MarketConfig::from_lookup(lookup_from(&[(
            "KV_REST_API_URL",
            "https://kv.example.com",
        )]))
        .unwrap();

        assert!(config.remote.is_none());
    }

    #[test]
    fn config_rejects_empty_data_file() {
        let err = MarketConfig::from_lookup(lookup_from(&[("BOOKSTAY_DATA_FILE", " ")]))
            .unwrap_err();
        assert!(err.to_string().contains("BOOKSTAY_DATA_FILE"), "got: {}", err);
    }

    #[test]
    fn config_rejects_non_http_remote() {
        let err = MarketConfig::from_lookup(lookup_from(&[
            ("KV_REST_API_URL", "kv.example.com"),
            ("KV_REST_API_TOKEN", "secret"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRemoteUrl(_)));
    }

    #[test]
    fn remote_debug_redacts_token() {
        let remote = RemoteConfig {
            url: "https://kv.example.com".to_string(),
            token: "secret".to_string(),
            key: "store".to_string(),
        };
        let printed = format!("{:?}", remote);
        assert!(!printed.contains("secret"));
        assert!(printed.contains("<redacted>"));
    }
}
