//! RescueBox session core - the auth lifecycle under the mobile client.
//!
//! This crate owns the authenticated HTTP session: attaching bearer
//! tokens to outgoing requests, recovering from expiry with a
//! single-flight refresh shared by all concurrent requests, persisting
//! renewed credentials atomically, and publishing the observable auth
//! state (`Loading` / `Authenticated` / `Unauthenticated`) the UI layer
//! routes on.
//!
//! Composition sketch:
//!
//! ```no_run
//! use std::sync::Arc;
//! use rescuebox_core::{ApiClient, AuthManager, Config, CredentialStore, FileBackend};
//!
//! # async fn compose() -> anyhow::Result<()> {
//! let config = Config::from_env();
//! let store = CredentialStore::open(Box::new(FileBackend::in_config_dir("rescuebox")?)).await?;
//! let client = ApiClient::new(&config, store.clone())?;
//! let auth = AuthManager::new(
//!     client.session_repository(),
//!     store,
//!     client.refresh_coordinator(),
//! );
//!
//! auth.initialize().await;
//! let _state = auth.observe();
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod store;

pub use api::{ApiClient, ApiError, HttpSessionRepository, SessionRepository};
pub use auth::{AuthManager, AuthState, LoginCoordinator, LoginError};
pub use config::Config;
pub use models::{AuthSession, StoredCredentials, User};
pub use store::{CredentialBackend, CredentialStore, FileBackend, KeyringBackend, MemoryBackend};
