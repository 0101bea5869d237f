//! Credential storage for the session core.
//!
//! This module provides:
//! - `CredentialStore`: shared, observable holder of the token pair and
//!   serialized user record
//! - `CredentialBackend`: swappable persistence trait with in-memory,
//!   file, and OS-keychain implementations
//!
//! The store is the single shared mutable resource of the session core.
//! The access and refresh tokens are always written together, and every
//! write is published to subscribers before the writing call returns, so
//! requests dispatched afterwards read the new pair.

pub mod file;
pub mod keyring;
pub mod memory;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{watch, Mutex};
use tracing::debug;

use crate::models::{AuthSession, StoredCredentials};

pub use self::file::FileBackend;
pub use self::keyring::KeyringBackend;
pub use self::memory::MemoryBackend;

/// Persistence behind the credential store, selected at composition time
/// (encrypted preferences on Android, keychain on iOS/desktop, a plain
/// file or memory elsewhere).
///
/// Backends only move whole snapshots; partial writes of the token pair
/// are impossible at this seam by construction.
#[async_trait]
pub trait CredentialBackend: Send + Sync {
    /// Load the persisted snapshot, or an empty one if nothing is stored.
    async fn load(&self) -> Result<StoredCredentials>;

    /// Persist the snapshot, replacing whatever was stored before.
    async fn persist(&self, snapshot: &StoredCredentials) -> Result<()>;

    /// Remove the persisted snapshot entirely.
    async fn wipe(&self) -> Result<()>;
}

struct Inner {
    backend: Box<dyn CredentialBackend>,
    /// Holds the current snapshot and fans it out to subscribers.
    state: watch::Sender<StoredCredentials>,
    /// Serializes mutations so persisted snapshots never go backwards
    /// relative to the published state.
    write_lock: Mutex<()>,
}

/// Shared, observable credential store. Clone is cheap (Arc internally);
/// all clones see the same state.
#[derive(Clone)]
pub struct CredentialStore {
    inner: Arc<Inner>,
}

impl CredentialStore {
    /// Open a store over the given backend, loading any persisted session.
    pub async fn open(backend: Box<dyn CredentialBackend>) -> Result<Self> {
        let initial = backend.load().await?;
        let (state, _) = watch::channel(initial);
        Ok(Self {
            inner: Arc::new(Inner {
                backend,
                state,
                write_lock: Mutex::new(()),
            }),
        })
    }

    /// An empty store backed by process memory. Used in tests and as the
    /// composition default before a platform backend is wired in.
    pub fn in_memory() -> Self {
        let (state, _) = watch::channel(StoredCredentials::default());
        Self {
            inner: Arc::new(Inner {
                backend: Box::new(MemoryBackend::default()),
                state,
                write_lock: Mutex::new(()),
            }),
        }
    }

    /// Current snapshot (point-in-time read).
    pub fn snapshot(&self) -> StoredCredentials {
        self.inner.state.borrow().clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.inner.state.borrow().access_token.clone()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.inner.state.borrow().refresh_token.clone()
    }

    pub fn user_json(&self) -> Option<String> {
        self.inner.state.borrow().user_json.clone()
    }

    /// Subscribe to snapshot changes. The receiver replays the latest
    /// value to new subscribers.
    pub fn subscribe(&self) -> watch::Receiver<StoredCredentials> {
        self.inner.state.subscribe()
    }

    /// Store a full session: token pair and user record in one write.
    pub async fn store_session(&self, session: &AuthSession) -> Result<()> {
        let user_json = serde_json::to_string(&session.user)?;
        let access_token = session.access_token.clone();
        let refresh_token = session.refresh_token.clone();
        self.update(move |next| {
            *next = StoredCredentials {
                access_token: Some(access_token),
                refresh_token,
                user_json: Some(user_json),
                issued_at: Some(Utc::now()),
            };
        })
        .await
    }

    /// Store a renewed token pair, keeping the stored user record.
    /// Both halves of the pair are replaced together.
    pub async fn store_pair(&self, access_token: String, refresh_token: Option<String>) -> Result<()> {
        self.update(move |next| {
            next.access_token = Some(access_token);
            next.refresh_token = refresh_token;
            next.issued_at = Some(Utc::now());
        })
        .await
    }

    /// Replace the serialized user record, keeping the token pair.
    pub async fn store_user_json(&self, user_json: String) -> Result<()> {
        self.update(move |next| next.user_json = Some(user_json)).await
    }

    /// Remove everything: tokens, user record, persisted copy.
    pub async fn clear(&self) -> Result<()> {
        let _guard = self.inner.write_lock.lock().await;
        self.inner.state.send_replace(StoredCredentials::default());
        debug!("credential store cleared");
        self.inner.backend.wipe().await
    }

    async fn update<F>(&self, apply: F) -> Result<()>
    where
        F: FnOnce(&mut StoredCredentials),
    {
        let _guard = self.inner.write_lock.lock().await;
        let mut next = self.inner.state.borrow().clone();
        apply(&mut next);
        // Publish before persisting: in-process readers get read-after-write
        // consistency even if the backend is slow.
        self.inner.state.send_replace(next.clone());
        self.inner.backend.persist(&next).await
    }
}
