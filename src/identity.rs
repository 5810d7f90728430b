//! Identity/session provider boundary.
//!
//! Authentication itself lives elsewhere. The core only needs to know who
//! is signed in (or that nobody is) and to be able to sign them out.
//!
//! The CLI uses [`FileIdentityProvider`], which keeps the signed-in user in
//! `<root>/identity.json` so consecutive invocations share one identity.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::storage::Storage;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Stable user identifier; keys both the remote document and the cache.
    pub user_id: String,
    /// Display name chosen at sign-in, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl Identity {
    pub fn new(user_id: &str, display_name: Option<&str>) -> Result<Self> {
        let user_id = non_empty(Some(user_id))
            .ok_or_else(|| Error::InvalidArgument("user id cannot be empty".to_string()))?;
        Ok(Self {
            user_id: user_id.to_string(),
            display_name: non_empty(display_name).map(str::to_string),
        })
    }

    /// Key for the local cache; one cache per user.
    pub fn session_key(&self) -> &str {
        &self.user_id
    }
}

pub trait IdentityProvider: Send + Sync {
    /// The signed-in identity, or `None`.
    fn current(&self) -> Result<Option<Identity>>;

    fn sign_out(&self) -> Result<()>;

    /// Like [`IdentityProvider::current`], but failing with `NotSignedIn`.
    fn require(&self) -> Result<Identity> {
        self.current()?.ok_or(Error::NotSignedIn)
    }
}

/// Identity persisted in the data root.
#[derive(Debug, Clone)]
pub struct FileIdentityProvider {
    storage: Storage,
}

impl FileIdentityProvider {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    pub fn sign_in(&self, identity: &Identity) -> Result<()> {
        self.storage
            .write_json(&self.storage.identity_file(), identity)?;
        debug!(user = %identity.user_id, "identity persisted");
        Ok(())
    }
}

impl IdentityProvider for FileIdentityProvider {
    fn current(&self) -> Result<Option<Identity>> {
        let identity: Option<Identity> = self.storage.read_json(&self.storage.identity_file())?;
        Ok(identity.filter(|identity| !identity.user_id.trim().is_empty()))
    }

    fn sign_out(&self) -> Result<()> {
        self.storage.remove_file(&self.storage.identity_file())?;
        debug!("identity removed");
        Ok(())
    }
}

/// In-process identity, for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryIdentityProvider {
    current: Mutex<Option<Identity>>,
}

impl MemoryIdentityProvider {
    pub fn signed_in(identity: Identity) -> Self {
        Self {
            current: Mutex::new(Some(identity)),
        }
    }
}

impl IdentityProvider for MemoryIdentityProvider {
    fn current(&self) -> Result<Option<Identity>> {
        Ok(self
            .current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone())
    }

    fn sign_out(&self) -> Result<()> {
        *self
            .current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
        Ok(())
    }
}

fn non_empty(input: Option<&str>) -> Option<&str> {
    input.and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    })
}
