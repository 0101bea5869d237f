//! Domain models for the RescueBox session core.
//!
//! These are the values exchanged with the identity endpoints and the
//! credential store. Wire names are camelCase to match the backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Authenticated user profile as returned by the identity endpoints and
/// stored alongside the credential pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Transient session returned by login and refresh calls.
///
/// Never persisted directly; decomposed into the credential pair plus the
/// serialized user record before storage.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Access token lifetime in seconds, advisory only. The client reacts
    /// to 401 responses rather than scheduling refreshes off this value.
    #[serde(default)]
    pub expires_in: Option<i64>,
    pub user: User,
}

/// Point-in-time snapshot of everything the credential store holds.
///
/// The access and refresh tokens are written and read as a unit; no reader
/// may observe one half of the pair updated without the other.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredCredentials {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    /// Serialized `User` JSON, kept opaque at this layer. Decoding (and
    /// swallowing decode failures) is the auth state manager's job.
    pub user_json: Option<String>,
    /// When the current pair was written. Observability only.
    pub issued_at: Option<DateTime<Utc>>,
}

impl StoredCredentials {
    /// True when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none() && self.user_json.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_parses_camel_case_wire_names() {
        let json = r#"{
            "id": "u-1",
            "displayName": "Mina",
            "pictureUrl": "https://cdn.example.com/p/mina.png",
            "lineUserId": "U4af4980629"
        }"#;
        let user: User = serde_json::from_str(json).expect("user should parse");
        assert_eq!(user.id, "u-1");
        assert_eq!(user.display_name, "Mina");
        assert_eq!(user.line_user_id.as_deref(), Some("U4af4980629"));
        assert!(user.created_at.is_none());
    }

    #[test]
    fn auth_session_tolerates_missing_refresh_token() {
        let json = r#"{
            "accessToken": "A1",
            "expiresIn": 3600,
            "user": {"id": "u-1", "displayName": "Mina"}
        }"#;
        let session: AuthSession = serde_json::from_str(json).expect("session should parse");
        assert_eq!(session.access_token, "A1");
        assert!(session.refresh_token.is_none());
        assert_eq!(session.expires_in, Some(3600));
    }

    #[test]
    fn empty_snapshot_reports_empty() {
        assert!(StoredCredentials::default().is_empty());
        let populated = StoredCredentials {
            access_token: Some("A1".into()),
            ..Default::default()
        };
        assert!(!populated.is_empty());
    }
}
