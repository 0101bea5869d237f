//! Remote identity endpoints.
//!
//! `SessionRepository` is the capability interface the auth core consumes:
//! exchange an external login token for a session, refresh the session,
//! fetch the current user, invalidate the session. The HTTP implementation
//! is pure request/response; retry-on-401 orchestration lives in
//! `crate::api::client`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{AuthSession, User};
use crate::store::CredentialStore;

use super::ApiError;

// ============================================================================
// Endpoint paths
// ============================================================================

/// Exchanges a social-login (LINE) token for a first-party session.
pub(crate) const EXCHANGE_TOKEN_PATH: &str = "/auth/line/token";

/// Rotates the token pair using the stored refresh token.
pub(crate) const REFRESH_PATH: &str = "/auth/refresh";

/// Merchant portal login. Not part of the consumer session flow, but it
/// must never carry a stale consumer bearer token.
pub(crate) const MERCHANT_LOGIN_PATH: &str = "/auth/merchant/login";

/// Current-user profile.
pub(crate) const CURRENT_USER_PATH: &str = "/users/me";

/// Server-side session invalidation.
pub(crate) const LOGOUT_PATH: &str = "/auth/logout";

/// Identity operations consumed by the auth state manager and the
/// authenticated HTTP client.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Exchange an external login token for a full session.
    async fn exchange_external_token(&self, token: &str) -> Result<AuthSession, ApiError>;

    /// Rotate the token pair using the currently stored refresh token.
    /// Fails with `Authentication` when no refresh token is stored or the
    /// server rejects the rotation.
    async fn refresh(&self) -> Result<AuthSession, ApiError>;

    /// Fetch the profile of the user the stored access token belongs to.
    async fn current_user(&self) -> Result<User, ApiError>;

    /// Invalidate the session server-side. Local state is cleared by the
    /// caller regardless of this call's outcome.
    async fn invalidate_session(&self) -> Result<(), ApiError>;
}

#[derive(Serialize)]
struct ExchangeTokenRequest<'a> {
    token: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// Refresh responses may omit the user record; the repository fills it
/// back in from storage so callers always get a complete session.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    user: Option<User>,
}

/// Some endpoints report failure inside a 2xx body.
#[derive(Deserialize)]
struct StatusBody {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    error: Option<String>,
}

/// HTTP implementation of `SessionRepository`.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpSessionRepository {
    http: Client,
    base_url: String,
    store: CredentialStore,
}

impl HttpSessionRepository {
    pub fn new(http: Client, base_url: impl Into<String>, store: CredentialStore) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            store,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Check if a response is successful, classifying the status and body
    /// into an `ApiError` if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Reject 2xx bodies that carry an explicit `{"success": false}`.
    fn check_status_body(body: &str) -> Result<(), ApiError> {
        if let Ok(status) = serde_json::from_str::<StatusBody>(body) {
            if status.success == Some(false) {
                debug!(error = ?status.error, "endpoint reported failure in 2xx body");
                return Err(ApiError::Authentication);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl SessionRepository for HttpSessionRepository {
    async fn exchange_external_token(&self, token: &str) -> Result<AuthSession, ApiError> {
        let response = self
            .http
            .post(self.url(EXCHANGE_TOKEN_PATH))
            .json(&ExchangeTokenRequest { token })
            .send()
            .await?;
        let response = Self::check_response(response).await?;
        Ok(response.json::<AuthSession>().await?)
    }

    async fn refresh(&self) -> Result<AuthSession, ApiError> {
        let refresh_token = self.store.refresh_token().ok_or(ApiError::Authentication)?;

        let response = self
            .http
            .post(self.url(REFRESH_PATH))
            .json(&RefreshRequest {
                refresh_token: &refresh_token,
            })
            .send()
            .await?;
        let response = Self::check_response(response).await?;

        let body = response.text().await?;
        Self::check_status_body(&body)?;
        let renewed: RefreshResponse = serde_json::from_str(&body)
            .map_err(|e| ApiError::Unknown(format!("Failed to parse refresh response: {e}")))?;

        // Fall back to the stored user record when the rotation response
        // does not repeat it.
        let user = match renewed.user {
            Some(user) => user,
            None => self
                .store
                .user_json()
                .and_then(|json| serde_json::from_str(&json).ok())
                .ok_or_else(|| {
                    ApiError::Unknown("Refresh response carried no user record".into())
                })?,
        };

        Ok(AuthSession {
            access_token: renewed.access_token,
            refresh_token: renewed.refresh_token,
            expires_in: renewed.expires_in,
            user,
        })
    }

    async fn current_user(&self) -> Result<User, ApiError> {
        let mut request = self.http.get(self.url(CURRENT_USER_PATH));
        if let Some(token) = self.store.access_token() {
            request = request.bearer_auth(token);
        }
        let response = Self::check_response(request.send().await?).await?;
        Ok(response.json::<User>().await?)
    }

    async fn invalidate_session(&self) -> Result<(), ApiError> {
        let mut request = self.http.post(self.url(LOGOUT_PATH));
        if let Some(token) = self.store.access_token() {
            request = request.bearer_auth(token);
        }
        Self::check_response(request.send().await?).await?;
        Ok(())
    }
}
