use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::store::TokenStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Anonymous,
    Authenticated,
}

/// Shared handle to the single active session.
///
/// Cloning is cheap and every clone sees the same store. Only `login`,
/// `logout` and the gateway's rejection handling write to it.
#[derive(Clone)]
pub struct Session {
    store: Arc<dyn TokenStore>,
}

impl Session {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self { store }
    }

    /// Anonymous -> Authenticated
    pub fn login(&self, token: &str) -> Result<()> {
        self.store.set(token)?;
        info!("Session started");
        Ok(())
    }

    /// Authenticated -> Anonymous
    pub fn logout(&self) -> Result<()> {
        self.store.clear()?;
        info!("Session ended");
        Ok(())
    }

    pub fn token(&self) -> Result<Option<String>> {
        self.store.get()
    }

    /// Token presence, treating a store read failure as absent
    pub fn has_token(&self) -> bool {
        match self.store.get() {
            Ok(token) => token.is_some(),
            Err(e) => {
                warn!(error = %e, "Failed to read token store, treating session as anonymous");
                false
            }
        }
    }

    pub fn state(&self) -> SessionState {
        if self.has_token() {
            SessionState::Authenticated
        } else {
            SessionState::Anonymous
        }
    }

    pub(crate) fn store(&self) -> &dyn TokenStore {
        self.store.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::store::MemoryTokenStore;

    struct BrokenStore;

    impl TokenStore for BrokenStore {
        fn set(&self, _token: &str) -> Result<()> {
            Err(anyhow::anyhow!("read-only"))
        }
        fn get(&self) -> Result<Option<String>> {
            Err(anyhow::anyhow!("unavailable"))
        }
        fn clear(&self) -> Result<()> {
            Err(anyhow::anyhow!("unavailable"))
        }
    }

    #[test]
    fn test_login_logout_transitions() {
        let session = Session::new(Arc::new(MemoryTokenStore::new()));
        assert_eq!(session.state(), SessionState::Anonymous);

        session.login("a.b.c").unwrap();
        assert_eq!(session.state(), SessionState::Authenticated);
        assert_eq!(session.token().unwrap().as_deref(), Some("a.b.c"));

        session.logout().unwrap();
        assert_eq!(session.state(), SessionState::Anonymous);
        assert_eq!(session.token().unwrap(), None);
    }

    #[test]
    fn test_clones_share_store() {
        let session = Session::new(Arc::new(MemoryTokenStore::new()));
        let other = session.clone();
        session.login("shared").unwrap();
        assert!(other.has_token());
        other.logout().unwrap();
        assert!(!session.has_token());
    }

    #[test]
    fn test_unreadable_store_is_anonymous() {
        let session = Session::new(Arc::new(BrokenStore));
        assert_eq!(session.state(), SessionState::Anonymous);
        assert!(session.login("x").is_err());
    }
}
