//! Bearer credential and current identity, shared by every client and
//! controller that needs them.

mod storage;

pub use storage::{FileStorage, MemoryStorage, SessionStorage, StoredEntries};

use std::sync::Arc;

use tokio::sync::watch;

use crate::models::Identity;

/// Storage key of the bearer credential.
pub const TOKEN_KEY: &str = "jwt_token";
/// Storage key of the serialized identity.
pub const IDENTITY_KEY: &str = "currentUser";

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

struct Inner {
    storage: Box<dyn SessionStorage>,
    identity: watch::Sender<Option<Identity>>,
}

impl Session {
    /// Restore whatever the storage holds. Unreadable storage means "no session".
    pub fn new(storage: impl SessionStorage + 'static) -> Self {
        let identity = match storage.load() {
            Ok(entries) => entries
                .get(IDENTITY_KEY)
                .and_then(|raw| match serde_json::from_str::<Identity>(raw) {
                    Ok(identity) => Some(identity),
                    Err(e) => {
                        tracing::warn!("Ignoring unreadable stored identity: {}", e);
                        None
                    }
                }),
            Err(e) => {
                tracing::warn!("Session storage unavailable: {}", e);
                None
            }
        };

        let (tx, _) = watch::channel(identity);
        Self {
            inner: Arc::new(Inner {
                storage: Box::new(storage),
                identity: tx,
            }),
        }
    }

    /// A session that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self::new(MemoryStorage::default())
    }

    /// Persist credential and identity in one write, then notify observers.
    pub fn set_session(&self, credential: &str, identity: Identity) -> Result<(), SessionError> {
        let mut entries = self.inner.storage.load().unwrap_or_default();
        entries.insert(TOKEN_KEY.to_string(), credential.to_string());
        entries.insert(IDENTITY_KEY.to_string(), serde_json::to_string(&identity)?);
        self.inner.storage.store(&entries)?;

        tracing::info!("Logged in as {}", identity.username);
        self.inner.identity.send_replace(Some(identity));
        Ok(())
    }

    /// Erase credential and identity together, then notify observers.
    /// Observers keep the old identity when the erase cannot be persisted.
    pub fn clear_session(&self) -> Result<(), SessionError> {
        let mut entries = self.inner.storage.load().unwrap_or_default();
        entries.remove(TOKEN_KEY);
        entries.remove(IDENTITY_KEY);
        self.inner.storage.store(&entries)?;

        self.inner.identity.send_replace(None);
        tracing::info!("Session cleared");
        Ok(())
    }

    pub fn current_identity(&self) -> Option<Identity> {
        self.inner.identity.borrow().clone()
    }

    /// Username of the current identity, or empty when logged out.
    pub fn current_username(&self) -> String {
        self.inner
            .identity
            .borrow()
            .as_ref()
            .map(|identity| identity.username.clone())
            .unwrap_or_default()
    }

    pub fn credential(&self) -> Option<String> {
        match self.inner.storage.load() {
            Ok(mut entries) => entries.remove(TOKEN_KEY).filter(|t| !t.is_empty()),
            Err(e) => {
                tracing::warn!("Session storage unavailable: {}", e);
                None
            }
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.credential().is_some() && self.inner.identity.borrow().is_some()
    }

    /// Observe identity changes; the receiver starts at the current value.
    pub fn watch(&self) -> watch::Receiver<Option<Identity>> {
        self.inner.identity.subscribe()
    }
}
