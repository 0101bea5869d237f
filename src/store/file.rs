use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::models::StoredCredentials;

use super::CredentialBackend;

/// Credentials file name inside the application data directory
const CREDENTIALS_FILE: &str = "credentials.json";

/// File-backed credential storage: one JSON snapshot on disk.
///
/// Suitable for desktop builds and local tooling. Mobile builds use the
/// platform secure store instead.
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Backend rooted at the platform config directory for `app_name`.
    pub fn in_config_dir(app_name: &str) -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(Self::new(config_dir.join(app_name)))
    }

    fn credentials_path(&self) -> PathBuf {
        self.dir.join(CREDENTIALS_FILE)
    }
}

#[async_trait]
impl CredentialBackend for FileBackend {
    async fn load(&self) -> Result<StoredCredentials> {
        let path = self.credentials_path();
        if !path.exists() {
            return Ok(StoredCredentials::default());
        }
        let contents =
            std::fs::read_to_string(&path).context("Failed to read credentials file")?;
        serde_json::from_str(&contents).context("Failed to parse credentials file")
    }

    async fn persist(&self, snapshot: &StoredCredentials) -> Result<()> {
        let path = self.credentials_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(snapshot)?;
        std::fs::write(path, contents).context("Failed to write credentials file")?;
        Ok(())
    }

    async fn wipe(&self) -> Result<()> {
        let path = self.credentials_path();
        if path.exists() {
            std::fs::remove_file(path).context("Failed to remove credentials file")?;
        }
        Ok(())
    }
}
