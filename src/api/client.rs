//! Authenticated API client for the RescueBox backend.
//!
//! This module provides the `ApiClient` struct used by every feature
//! surface (deals, reservations, merchant dashboard) to make HTTP
//! requests. It owns the authentication protocol:
//!
//! 1. Attach the stored access token as a bearer credential, except on
//!    the small set of unauthenticated endpoints.
//! 2. On 401, suspend the request and enter the single-flight refresh
//!    protocol shared by every concurrent request.
//! 3. On refresh success, retry the original request once with the new
//!    token; callers never observe the intermediate 401.
//! 4. On refresh failure, clear stored credentials and surface the
//!    failure; the auth state stream transitions to signed-out as a
//!    downstream effect of the store clearing.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::auth::RefreshCoordinator;
use crate::config::Config;
use crate::store::CredentialStore;

use super::session::{EXCHANGE_TOKEN_PATH, MERCHANT_LOGIN_PATH, REFRESH_PATH};
use super::{ApiError, HttpSessionRepository, SessionRepository};

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Endpoints that must never carry a bearer token: attaching a stale
/// token would leak it into login flows, and a 401 from the refresh
/// endpoint itself must not re-enter the refresh protocol.
const UNAUTHENTICATED_PATHS: &[&str] = &[EXCHANGE_TOKEN_PATH, REFRESH_PATH, MERCHANT_LOGIN_PATH];

/// API client for the RescueBox backend.
/// Clone is cheap - the HTTP client and coordinator are shared via Arc.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    store: CredentialStore,
    repo: Arc<dyn SessionRepository>,
    refresh: Arc<RefreshCoordinator>,
}

impl ApiClient {
    /// Create a client wired to the HTTP session repository.
    pub fn new(config: &Config, store: CredentialStore) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        let repo: Arc<dyn SessionRepository> = Arc::new(HttpSessionRepository::new(
            http.clone(),
            config.base_url.clone(),
            store.clone(),
        ));
        Ok(Self::with_repository(http, config, store, repo))
    }

    /// Create a client over an injected session repository. Used at
    /// composition time when the repository is shared with the auth
    /// state manager, and in tests.
    pub fn with_repository(
        http: Client,
        config: &Config,
        store: CredentialStore,
        repo: Arc<dyn SessionRepository>,
    ) -> Self {
        let refresh = RefreshCoordinator::new(repo.clone(), store.clone());
        Self {
            http,
            base_url: config.base_url.clone(),
            store,
            repo,
            refresh,
        }
    }

    /// The session repository this client refreshes through.
    pub fn session_repository(&self) -> Arc<dyn SessionRepository> {
        self.repo.clone()
    }

    /// The refresh coordinator this client recovers through. The auth
    /// state manager must share this instance so its startup refresh and
    /// 401-triggered ones collapse into a single in-flight attempt.
    pub fn refresh_coordinator(&self) -> Arc<RefreshCoordinator> {
        self.refresh.clone()
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request(Method::GET, path, None::<&()>).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.request(Method::POST, path, Some(body)).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.request(Method::PUT, path, Some(body)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request(Method::DELETE, path, None::<&()>).await
    }

    /// True for endpoints that are dispatched without a bearer token.
    /// Exact match on the path component: `/auth/refresh` qualifies,
    /// `/auth/refresh-devices` does not.
    fn is_unauthenticated(path: &str) -> bool {
        let path = path.split('?').next().unwrap_or(path);
        UNAUTHENTICATED_PATHS.iter().any(|p| *p == path)
    }

    async fn request<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ApiError> {
        let unauthenticated = Self::is_unauthenticated(path);
        let token = if unauthenticated {
            None
        } else {
            self.store.access_token()
        };

        let response = self
            .send(method.clone(), path, body, token.as_deref())
            .await?;

        if response.status() != StatusCode::UNAUTHORIZED || unauthenticated {
            return Self::parse(response).await;
        }

        // 401 on an authenticated endpoint: suspend until the shared
        // refresh resolves, then retry once with the renewed token.
        debug!(path, "request unauthorized, entering refresh protocol");
        let renewed = self.refresh.recover(token.as_deref()).await?;
        let retried = self.send(method, path, body, Some(&renewed)).await?;
        Self::parse(retried).await
    }

    async fn send<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        token: Option<&str>,
    ) -> Result<reqwest::Response, ApiError> {
        let mut request = self
            .http
            .request(method, format!("{}{}", self.base_url, path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }

    async fn parse<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status, &body));
        }
        Ok(response.json::<T>().await?)
    }
}
