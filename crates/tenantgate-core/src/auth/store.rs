use std::path::PathBuf;
use std::sync::RwLock;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use keyring::Entry;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Keychain service name
const SERVICE_NAME: &str = "tenantgate";

/// Single storage key shared by every client surface.
pub const TOKEN_STORAGE_KEY: &str = "auth_token";

/// Token file name in cache directory
const TOKEN_FILE: &str = "session.json";

/// Durable holder for a single bearer token.
///
/// Implementations use interior mutability so one store can be shared
/// behind an `Arc` by the gateway and the navigation guard.
pub trait TokenStore: Send + Sync {
    /// Persist the token, replacing any previous one
    fn set(&self, token: &str) -> Result<()>;

    /// Current token, if any
    fn get(&self) -> Result<Option<String>>;

    /// Remove the token. Clearing an empty store is not an error.
    fn clear(&self) -> Result<()>;
}

/// Token stored in the OS keychain.
pub struct KeyringTokenStore {
    key: String,
}

impl KeyringTokenStore {
    pub fn new() -> Self {
        Self::with_key(TOKEN_STORAGE_KEY)
    }

    pub fn with_key(key: &str) -> Self {
        Self {
            key: key.to_string(),
        }
    }

    fn entry(&self) -> Result<Entry> {
        Entry::new(SERVICE_NAME, &self.key).context("Failed to create keyring entry")
    }
}

impl Default for KeyringTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenStore for KeyringTokenStore {
    fn set(&self, token: &str) -> Result<()> {
        self.entry()?
            .set_password(token)
            .context("Failed to store token in keychain")?;
        debug!(key = %self.key, "Token saved to keychain");
        Ok(())
    }

    fn get(&self) -> Result<Option<String>> {
        match self.entry()?.get_password() {
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve token from keychain"),
        }
    }

    fn clear(&self) -> Result<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => {
                debug!(key = %self.key, "Token removed from keychain");
                Ok(())
            }
            Err(e) => Err(e).context("Failed to delete token from keychain"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredToken {
    token: String,
    stored_at: DateTime<Utc>,
}

/// Token persisted as JSON in the cache directory, for hosts without a keychain.
pub struct FileTokenStore {
    cache_dir: PathBuf,
}

impl FileTokenStore {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    fn token_path(&self) -> PathBuf {
        self.cache_dir.join(TOKEN_FILE)
    }
}

impl TokenStore for FileTokenStore {
    fn set(&self, token: &str) -> Result<()> {
        let path = self.token_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create token directory")?;
        }
        let stored = StoredToken {
            token: token.to_string(),
            stored_at: Utc::now(),
        };
        let contents = serde_json::to_string_pretty(&stored)?;
        std::fs::write(&path, contents).context("Failed to write token file")?;
        debug!(path = %path.display(), "Token saved to file");
        Ok(())
    }

    fn get(&self) -> Result<Option<String>> {
        let path = self.token_path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)
            .context("Failed to read token file")?;
        let stored: StoredToken = serde_json::from_str(&contents)
            .context("Failed to parse token file")?;
        Ok(Some(stored.token))
    }

    fn clear(&self) -> Result<()> {
        let path = self.token_path();
        if path.exists() {
            std::fs::remove_file(&path).context("Failed to remove token file")?;
            debug!(path = %path.display(), "Token file removed");
        }
        Ok(())
    }
}

/// In-process store. Nothing survives a restart; used by tests and embedders.
#[derive(Default)]
pub struct MemoryTokenStore {
    token: RwLock<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: &str) -> Self {
        Self {
            token: RwLock::new(Some(token.to_string())),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn set(&self, token: &str) -> Result<()> {
        let mut slot = self
            .token
            .write()
            .map_err(|_| anyhow::anyhow!("Token lock poisoned"))?;
        *slot = Some(token.to_string());
        Ok(())
    }

    fn get(&self) -> Result<Option<String>> {
        let slot = self
            .token
            .read()
            .map_err(|_| anyhow::anyhow!("Token lock poisoned"))?;
        Ok(slot.clone())
    }

    fn clear(&self) -> Result<()> {
        let mut slot = self
            .token
            .write()
            .map_err(|_| anyhow::anyhow!("Token lock poisoned"))?;
        *slot = None;
        Ok(())
    }
}
