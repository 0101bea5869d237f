//! Single-flight session refresh.
//!
//! Any number of requests may observe 401 at the same time; the
//! coordinator guarantees the session repository's refresh operation runs
//! at most once for that expiry. Concurrent callers attach to one shared
//! in-flight future and all resolve with its outcome. Issuing N refreshes
//! concurrently would let the server rotate the refresh token N times and
//! invalidate all but the last.

use std::sync::{Arc, Mutex};

use futures::future::{BoxFuture, FutureExt, Shared};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::{ApiError, SessionRepository};
use crate::store::CredentialStore;

/// Why a refresh attempt did not produce a new token.
///
/// Cloneable so the outcome can fan out to every waiter of the shared
/// in-flight future.
#[derive(Debug, Clone, Error)]
pub(crate) enum RefreshFailure {
    #[error("no refresh token stored")]
    NoRefreshToken,
    #[error("session refresh failed: {0}")]
    Failed(String),
}

type SharedRefresh = Shared<BoxFuture<'static, Result<String, RefreshFailure>>>;

/// Serializes session refresh across every request sharing one
/// credential store.
pub struct RefreshCoordinator {
    repo: Arc<dyn SessionRepository>,
    store: CredentialStore,
    inflight: Arc<Mutex<Option<SharedRefresh>>>,
}

impl RefreshCoordinator {
    pub fn new(repo: Arc<dyn SessionRepository>, store: CredentialStore) -> Arc<Self> {
        Arc::new(Self {
            repo,
            store,
            inflight: Arc::new(Mutex::new(None)),
        })
    }

    /// Recover from a 401 observed by a request that carried `stale` as
    /// its bearer token (None if it carried none).
    ///
    /// Returns a token to retry with, or `ApiError::Authentication` when
    /// the session could not be renewed. In the failure case the store
    /// has already been cleared (fail-closed).
    pub async fn recover(&self, stale: Option<&str>) -> Result<String, ApiError> {
        // Another request may already have completed the protocol.
        match self.store.access_token() {
            Some(current) if stale != Some(current.as_str()) => return Ok(current),
            None if stale.is_some() => {
                // Cleared underneath us by a failed refresh or a logout.
                return Err(ApiError::Authentication);
            }
            _ => {}
        }

        let inflight = self.join_or_start();
        inflight.await.map_err(|failure| {
            debug!(%failure, "request not retried after failed refresh");
            ApiError::Authentication
        })
    }

    /// Join the in-flight refresh if there is one, otherwise start it.
    fn join_or_start(&self) -> SharedRefresh {
        let mut slot = self.inflight.lock().expect("refresh slot poisoned");
        if let Some(inflight) = slot.as_ref() {
            debug!("joining in-flight session refresh");
            return inflight.clone();
        }

        let repo = Arc::clone(&self.repo);
        let store = self.store.clone();
        let slot_handle = Arc::clone(&self.inflight);
        let fut: SharedRefresh = async move {
            let result = run_refresh(repo, store).await;
            // Let the next expiry start a fresh attempt. Storage is already
            // updated at this point, so late arrivals that race the reset
            // resolve through the token comparison in `recover`.
            slot_handle.lock().expect("refresh slot poisoned").take();
            result
        }
        .boxed()
        .shared();
        *slot = Some(fut.clone());

        // Drive the refresh on the runtime so it completes and updates
        // storage even if every waiting request is cancelled.
        tokio::spawn(fut.clone());

        fut
    }
}

async fn run_refresh(
    repo: Arc<dyn SessionRepository>,
    store: CredentialStore,
) -> Result<String, RefreshFailure> {
    if store.refresh_token().is_none() {
        // Nothing to rotate: skip the network call and fail closed.
        if let Err(e) = store.clear().await {
            warn!(error = %e, "failed to clear credential store");
        }
        return Err(RefreshFailure::NoRefreshToken);
    }

    match repo.refresh().await {
        Ok(session) => {
            info!("session refreshed");
            if let Err(e) = store.store_session(&session).await {
                // In-memory state is updated regardless; persistence is
                // retried on the next successful write.
                warn!(error = %e, "failed to persist refreshed session");
            }
            Ok(session.access_token)
        }
        Err(e) => {
            // Rejection and network failure are handled identically:
            // ambiguous outcomes must not leave possibly-invalid tokens
            // in storage.
            warn!(error = %e, "session refresh failed, clearing stored credentials");
            if let Err(e) = store.clear().await {
                warn!(error = %e, "failed to clear credential store");
            }
            Err(RefreshFailure::Failed(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::models::{AuthSession, User};

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }

    fn user() -> User {
        User {
            id: "u-1".into(),
            display_name: "Mina".into(),
            picture_url: None,
            line_user_id: None,
            created_at: None,
        }
    }

    fn session(access: &str, refresh: &str) -> AuthSession {
        AuthSession {
            access_token: access.into(),
            refresh_token: Some(refresh.into()),
            expires_in: Some(3600),
            user: user(),
        }
    }

    /// Counts refresh calls and answers with a fixed outcome after a
    /// short delay, giving concurrent callers time to pile up.
    struct FakeRepo {
        refresh_calls: AtomicUsize,
        outcome: Box<dyn Fn() -> Result<AuthSession, ApiError> + Send + Sync>,
    }

    impl FakeRepo {
        fn succeeding(access: &'static str, refresh: &'static str) -> Arc<Self> {
            Arc::new(Self {
                refresh_calls: AtomicUsize::new(0),
                outcome: Box::new(move || Ok(session(access, refresh))),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                refresh_calls: AtomicUsize::new(0),
                outcome: Box::new(|| Err(ApiError::Unknown("refresh rejected".into()))),
            })
        }
    }

    #[async_trait]
    impl SessionRepository for FakeRepo {
        async fn exchange_external_token(&self, _token: &str) -> Result<AuthSession, ApiError> {
            unimplemented!("not exercised here")
        }

        async fn refresh(&self) -> Result<AuthSession, ApiError> {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(30)).await;
            (self.outcome)()
        }

        async fn current_user(&self) -> Result<User, ApiError> {
            unimplemented!("not exercised here")
        }

        async fn invalidate_session(&self) -> Result<(), ApiError> {
            unimplemented!("not exercised here")
        }
    }

    async fn seeded_store(access: &str, refresh: &str) -> CredentialStore {
        let store = CredentialStore::in_memory();
        store.store_session(&session(access, refresh)).await.unwrap();
        store
    }

    #[tokio::test]
    async fn concurrent_expiries_share_one_refresh() {
        init_tracing();
        let repo = FakeRepo::succeeding("A2", "R2");
        let store = seeded_store("A1", "R1").await;
        let coordinator = RefreshCoordinator::new(repo.clone(), store.clone());

        let mut handles = Vec::new();
        for _ in 0..3 {
            let coordinator = Arc::clone(&coordinator);
            handles.push(tokio::spawn(async move {
                coordinator.recover(Some("A1")).await
            }));
        }

        for handle in handles {
            let token = handle.await.unwrap().expect("recovery should succeed");
            assert_eq!(token, "A2");
        }
        assert_eq!(repo.refresh_calls.load(Ordering::SeqCst), 1);

        let snap = store.snapshot();
        assert_eq!(snap.access_token.as_deref(), Some("A2"));
        assert_eq!(snap.refresh_token.as_deref(), Some("R2"));
    }

    #[tokio::test]
    async fn failed_refresh_fails_all_waiters_and_clears_store() {
        init_tracing();
        let repo = FakeRepo::failing();
        let store = seeded_store("A1", "R1").await;
        let coordinator = RefreshCoordinator::new(repo.clone(), store.clone());

        let mut handles = Vec::new();
        for _ in 0..2 {
            let coordinator = Arc::clone(&coordinator);
            handles.push(tokio::spawn(async move {
                coordinator.recover(Some("A1")).await
            }));
        }

        for handle in handles {
            let result = handle.await.unwrap();
            assert!(matches!(result, Err(ApiError::Authentication)));
        }
        assert_eq!(repo.refresh_calls.load(Ordering::SeqCst), 1);
        assert!(store.snapshot().is_empty());
        assert!(store.access_token().is_none());
    }

    #[tokio::test]
    async fn missing_refresh_token_skips_the_network() {
        let repo = FakeRepo::succeeding("A2", "R2");
        let store = CredentialStore::in_memory();
        let coordinator = RefreshCoordinator::new(repo.clone(), store.clone());

        let result = coordinator.recover(None).await;
        assert!(matches!(result, Err(ApiError::Authentication)));
        assert_eq!(repo.refresh_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn already_renewed_token_is_reused_without_refresh() {
        let repo = FakeRepo::succeeding("A3", "R3");
        let store = seeded_store("A2", "R2").await;
        let coordinator = RefreshCoordinator::new(repo.clone(), store.clone());

        // The request 401'd with A1, but someone has since stored A2.
        let token = coordinator.recover(Some("A1")).await.expect("reuse");
        assert_eq!(token, "A2");
        assert_eq!(repo.refresh_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn refresh_completes_even_when_waiters_are_cancelled() {
        let repo = FakeRepo::succeeding("A2", "R2");
        let store = seeded_store("A1", "R1").await;
        let coordinator = RefreshCoordinator::new(repo.clone(), store.clone());

        let waiter = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.recover(Some("A1")).await })
        };
        // Give the refresh time to start, then cancel the only waiter.
        tokio::time::sleep(Duration::from_millis(5)).await;
        waiter.abort();
        let _ = waiter.await;

        // The detached refresh still lands in storage.
        let mut rx = store.subscribe();
        let renewed = rx
            .wait_for(|snap| snap.access_token.as_deref() == Some("A2"))
            .await
            .expect("store alive");
        assert_eq!(renewed.refresh_token.as_deref(), Some("R2"));
        assert_eq!(repo.refresh_calls.load(Ordering::SeqCst), 1);
    }
}
