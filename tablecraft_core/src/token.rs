use crate::error::Result;
use crate::storage::KeyValueStorage;
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

pub const TOKEN_STORAGE_KEY: &str = "access_token";

/// Current bearer token, mirrored into durable storage on every change.
///
/// Clones share the same token; the HTTP client holds one clone and callers
/// another.
#[derive(Debug, Clone)]
pub struct TokenStore {
    storage: Arc<dyn KeyValueStorage>,
    current: Arc<RwLock<Option<String>>>,
}

impl TokenStore {
    /// Read the persisted token, if any
    pub fn load(storage: Arc<dyn KeyValueStorage>) -> Result<Self> {
        let current = storage.get(TOKEN_STORAGE_KEY)?.filter(|t| !t.is_empty());
        debug!(present = current.is_some(), "Loaded access token from storage");
        Ok(Self {
            storage,
            current: Arc::new(RwLock::new(current)),
        })
    }

    pub fn get(&self) -> Option<String> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.get().is_some()
    }

    pub fn set(&self, token: impl Into<String>) -> Result<()> {
        let token = token.into();
        self.storage.set(TOKEN_STORAGE_KEY, &token)?;
        *self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(token);
        info!("Access token updated");
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        self.storage.remove(TOKEN_STORAGE_KEY)?;
        *self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
        info!("Access token cleared");
        Ok(())
    }
}
