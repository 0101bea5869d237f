//! Observable authentication state.
//!
//! `AuthManager` derives a tri-state signal from the credential store and
//! exposes the imperative operations UI callers need: startup validation,
//! external-token login, and logout. All state transitions flow through
//! the store; the manager never holds auth state of its own.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::{ApiError, SessionRepository};
use crate::models::{StoredCredentials, User};
use crate::store::CredentialStore;

use super::refresh::RefreshCoordinator;

/// Whether the user is signed in.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthState {
    /// The underlying store has not been observed yet.
    Loading,
    Authenticated(User),
    Unauthenticated,
}

/// Derives and publishes [`AuthState`], and drives session lifecycle
/// operations on behalf of the UI.
pub struct AuthManager {
    repo: Arc<dyn SessionRepository>,
    store: CredentialStore,
    refresh: Arc<RefreshCoordinator>,
    state_rx: watch::Receiver<AuthState>,
}

impl AuthManager {
    /// Create the manager and start the state-derivation task. The task
    /// runs until either the manager or the credential store is dropped.
    ///
    /// `refresh` must be the same coordinator the API client recovers
    /// through, so a startup refresh and a 401-triggered one collapse
    /// into a single in-flight attempt.
    pub fn new(
        repo: Arc<dyn SessionRepository>,
        store: CredentialStore,
        refresh: Arc<RefreshCoordinator>,
    ) -> Self {
        let (tx, rx) = watch::channel(AuthState::Loading);
        let mut creds_rx = store.subscribe();

        tokio::spawn(async move {
            loop {
                let snapshot = creds_rx.borrow_and_update().clone();
                if tx.send(derive_state(&snapshot)).is_err() {
                    break;
                }
                if creds_rx.changed().await.is_err() {
                    break;
                }
            }
        });

        Self {
            repo,
            store,
            refresh,
            state_rx: rx,
        }
    }

    /// Continuously-updated, replay-latest view of the auth state.
    /// Every receiver sees the same multicast stream.
    pub fn observe(&self) -> watch::Receiver<AuthState> {
        self.state_rx.clone()
    }

    /// Best-effort session validation at process start.
    ///
    /// With no stored token this does nothing. With one, the stored
    /// session is validated against the current-user endpoint; an
    /// authentication rejection triggers one refresh attempt, and a
    /// failed refresh clears storage, forcing the signed-out state.
    /// Other failures (offline start, server trouble) leave the stored
    /// session in place.
    pub async fn initialize(&self) {
        if self.store.access_token().is_none() {
            return;
        }

        match self.repo.current_user().await {
            Ok(_) => debug!("stored session validated"),
            Err(e) if e.is_authentication() => {
                info!("stored session rejected, attempting refresh");
                // The shared coordinator persists on success and clears
                // the store on failure; a request hitting 401 at the same
                // time joins this attempt instead of starting its own.
                let stale = self.store.access_token();
                if let Err(e) = self.refresh.recover(stale.as_deref()).await {
                    warn!(error = %e, "startup refresh failed, signing out");
                }
            }
            Err(e) => warn!(error = %e, "could not validate stored session"),
        }
    }

    /// Exchange an external social-login token for a session and persist
    /// it. The state stream flips to `Authenticated` via the store write.
    pub async fn login(&self, external_token: &str) -> Result<User, ApiError> {
        let session = self.repo.exchange_external_token(external_token).await?;
        if let Err(e) = self.store.store_session(&session).await {
            warn!(error = %e, "failed to persist session after login");
        }
        info!(user_id = %session.user.id, "signed in");
        Ok(session.user)
    }

    /// Sign out. Local state always returns to `Unauthenticated`, even
    /// when the server-side invalidation fails; the server call's result
    /// is returned for optional UI surfacing only.
    pub async fn logout(&self) -> Result<(), ApiError> {
        let result = self.repo.invalidate_session().await;
        if let Err(e) = &result {
            warn!(error = %e, "server-side session invalidation failed");
        }
        if let Err(e) = self.store.clear().await {
            warn!(error = %e, "failed to clear credential store");
        }
        info!("signed out");
        result
    }
}

/// A session is authenticated iff an access token and a decodable user
/// record are present together. Anything partial or malformed is treated
/// as signed out, never as a stream error.
fn derive_state(snapshot: &StoredCredentials) -> AuthState {
    let (Some(_), Some(user_json)) = (&snapshot.access_token, &snapshot.user_json) else {
        return AuthState::Unauthenticated;
    };
    match serde_json::from_str::<User>(user_json) {
        Ok(user) => AuthState::Authenticated(user),
        Err(e) => {
            debug!(error = %e, "stored user record did not decode, treating as signed out");
            AuthState::Unauthenticated
        }
    }
}
