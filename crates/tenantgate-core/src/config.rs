//! Client configuration management.
//!
//! This module handles loading and saving the client configuration, which
//! includes the API base URL, request timeout, expiry warning threshold and
//! the token storage backend.
//!
//! Configuration is stored at `~/.config/tenantgate/config.json`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::auth::claims::DEFAULT_EXPIRY_THRESHOLD_MINUTES;
use crate::auth::{FileTokenStore, KeyringTokenStore, TokenStore};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "tenantgate";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";

/// Per-request timeout. 10s matches the web clients.
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

const ENV_API_URL: &str = "TENANTGATE_API_URL";
const ENV_TIMEOUT_MS: &str = "TENANTGATE_TIMEOUT_MS";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TokenBackend {
    Keyring,
    #[default]
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub request_timeout_ms: u64,
    pub expiry_threshold_minutes: i64,
    pub token_backend: TokenBackend,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            expiry_threshold_minutes: DEFAULT_EXPIRY_THRESHOLD_MINUTES,
            token_backend: TokenBackend::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Save to the default location, returning where it was written
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .context("Failed to read config file")?;
            Ok(serde_json::from_str(&contents).context("Failed to parse config file")?)
        } else {
            Ok(Self::default())
        }
    }

    fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents).context("Failed to write config file")?;
        Ok(())
    }

    /// Apply `TENANTGATE_*` environment overrides
    pub fn apply_env(&mut self) {
        self.apply_overrides(
            std::env::var(ENV_API_URL).ok(),
            std::env::var(ENV_TIMEOUT_MS).ok(),
        );
    }

    fn apply_overrides(&mut self, api_url: Option<String>, timeout_ms: Option<String>) {
        if let Some(url) = api_url.filter(|u| !u.trim().is_empty()) {
            self.api_base_url = url;
        }
        if let Some(raw) = timeout_ms {
            match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => self.request_timeout_ms = ms,
                _ => warn!(value = %raw, "Ignoring invalid {}", ENV_TIMEOUT_MS),
            }
        }
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.request_timeout_ms)
    }

    pub fn expiry_threshold(&self) -> Duration {
        Duration::minutes(self.expiry_threshold_minutes)
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Build the configured token store
    pub fn open_store(&self) -> Result<Arc<dyn TokenStore>> {
        Ok(match self.token_backend {
            TokenBackend::Keyring => Arc::new(KeyringTokenStore::new()),
            TokenBackend::File => Arc::new(FileTokenStore::new(self.cache_dir()?)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"token_backend":"keyring"}"#).unwrap();
        assert_eq!(config.token_backend, TokenBackend::Keyring);
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.request_timeout(), std::time::Duration::from_secs(10));
        assert_eq!(config.expiry_threshold(), Duration::minutes(5));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tenantgate").join(CONFIG_FILE);
        assert_eq!(Config::load_from(&path).unwrap().token_backend, TokenBackend::File);

        let config = Config {
            api_base_url: "https://estate.example/api".to_string(),
            request_timeout_ms: 4_000,
            token_backend: TokenBackend::Keyring,
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.api_base_url, "https://estate.example/api");
        assert_eq!(loaded.request_timeout_ms, 4_000);
        assert_eq!(loaded.token_backend, TokenBackend::Keyring);
        assert_eq!(loaded.expiry_threshold_minutes, DEFAULT_EXPIRY_THRESHOLD_MINUTES);
    }

    #[test]
    fn test_overrides() {
        let mut config = Config::default();
        config.apply_overrides(Some("https://estate.example/api".into()), Some("2500".into()));
        assert_eq!(config.api_base_url, "https://estate.example/api");
        assert_eq!(config.request_timeout_ms, 2500);
    }

    #[test]
    fn test_invalid_overrides_ignored() {
        let mut config = Config::default();
        config.apply_overrides(Some("  ".into()), Some("soon".into()));
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.request_timeout_ms, DEFAULT_REQUEST_TIMEOUT_MS);

        config.apply_overrides(None, Some("0".into()));
        assert_eq!(config.request_timeout_ms, DEFAULT_REQUEST_TIMEOUT_MS);
    }
}
