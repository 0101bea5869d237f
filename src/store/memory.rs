use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::StoredCredentials;

use super::CredentialBackend;

/// Process-memory backend. Nothing survives restart; used in tests and
/// as a placeholder until a platform backend is wired in.
#[derive(Default)]
pub struct MemoryBackend {
    slot: Mutex<StoredCredentials>,
}

#[async_trait]
impl CredentialBackend for MemoryBackend {
    async fn load(&self) -> Result<StoredCredentials> {
        Ok(self.slot.lock().expect("memory backend poisoned").clone())
    }

    async fn persist(&self, snapshot: &StoredCredentials) -> Result<()> {
        *self.slot.lock().expect("memory backend poisoned") = snapshot.clone();
        Ok(())
    }

    async fn wipe(&self) -> Result<()> {
        *self.slot.lock().expect("memory backend poisoned") = StoredCredentials::default();
        Ok(())
    }
}
