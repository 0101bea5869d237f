use anyhow::{Context, Result};
use async_trait::async_trait;
use keyring::Entry;

use crate::models::StoredCredentials;

use super::CredentialBackend;

/// Account name under which the snapshot is stored
const ACCOUNT: &str = "session";

/// OS keychain backend. The whole snapshot is stored as one JSON secret
/// so the token pair cannot be split across entries.
pub struct KeyringBackend {
    service: String,
}

impl KeyringBackend {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self) -> Result<Entry> {
        Entry::new(&self.service, ACCOUNT).context("Failed to create keyring entry")
    }
}

#[async_trait]
impl CredentialBackend for KeyringBackend {
    async fn load(&self) -> Result<StoredCredentials> {
        match self.entry()?.get_password() {
            Ok(contents) => {
                serde_json::from_str(&contents).context("Failed to parse stored session")
            }
            Err(keyring::Error::NoEntry) => Ok(StoredCredentials::default()),
            Err(e) => Err(e).context("Failed to read session from keychain"),
        }
    }

    async fn persist(&self, snapshot: &StoredCredentials) -> Result<()> {
        let contents = serde_json::to_string(snapshot)?;
        self.entry()?
            .set_password(&contents)
            .context("Failed to store session in keychain")?;
        Ok(())
    }

    async fn wipe(&self) -> Result<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete session from keychain"),
        }
    }
}
