use thiserror::Error;

/// Error taxonomy for API calls.
///
/// Every failure crossing the API boundary is classified into one of these
/// variants; nothing is thrown past the layer that classifies it. The auth
/// client recovers `Authentication` locally via the refresh protocol and
/// only re-surfaces it when refresh itself fails.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Authentication failed - session is no longer valid")]
    Authentication,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unexpected API error: {0}")]
    Unknown(String),
}

/// Maximum length for error response bodies carried in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid carrying excessive data in errors
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            format!(
                "{}... (truncated, {} total bytes)",
                &body[..MAX_ERROR_BODY_LENGTH],
                body.len()
            )
        }
    }

    /// Classify a non-success HTTP status into an error value.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            401 => ApiError::Authentication,
            404 => ApiError::NotFound(truncated),
            400 | 402 | 403 | 405..=499 => ApiError::Validation(truncated),
            _ => ApiError::Unknown(format!("Status {}: {}", status, truncated)),
        }
    }

    /// True when this failure means the current session is not accepted.
    pub fn is_authentication(&self) -> bool {
        matches!(self, ApiError::Authentication)
    }
}
