//! Client session store
//!
//! Holds the four flat keys the reference flow persists between page loads:
//! user identity, session expiry, issued token, encrypted payload. The keys
//! live and die together: `clear()` swaps the whole record out in one step,
//! so no observer can see a half-cleared session. Only the session
//! controller writes here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Key name for the stored user identity
pub const KEY_USER: &str = "sso_user";
/// Key name for the session expiry timestamp
pub const KEY_SESSION_EXPIRY: &str = "session_expiry";
/// Key name for the issued session token
pub const KEY_JWT_TOKEN: &str = "jwt_token";
/// Key name for the encrypted handshake payload
pub const KEY_ENCRYPTED_PAYLOAD: &str = "encrypted_payload";

/// Identity claims kept for the lifetime of a client session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub user_id: String,
    pub username: String,
}

#[derive(Debug, Clone)]
struct SessionRecord {
    user: SessionUser,
    expires_at: DateTime<Utc>,
    jwt_token: Option<String>,
    encrypted_payload: Option<String>,
}

/// The controller-owned session store.
#[derive(Debug, Default)]
pub struct SessionStore {
    record: Option<SessionRecord>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a session. Replaces any previous record wholesale.
    pub fn create(&mut self, user: SessionUser, expires_at: DateTime<Utc>) {
        self.record = Some(SessionRecord {
            user,
            expires_at,
            jwt_token: None,
            encrypted_payload: None,
        });
    }

    /// Extend the stored expiry after a successful refresh.
    pub fn set_expiry(&mut self, expires_at: DateTime<Utc>) {
        if let Some(record) = self.record.as_mut() {
            record.expires_at = expires_at;
        }
    }

    /// Attach the handshake artifacts produced after login.
    pub fn set_artifacts(&mut self, jwt_token: String, encrypted_payload: String) {
        if let Some(record) = self.record.as_mut() {
            record.jwt_token = Some(jwt_token);
            record.encrypted_payload = Some(encrypted_payload);
        }
    }

    /// Drop every key at once.
    pub fn clear(&mut self) {
        self.record = None;
    }

    pub fn is_empty(&self) -> bool {
        self.record.is_none()
    }

    pub fn user(&self) -> Option<&SessionUser> {
        self.record.as_ref().map(|r| &r.user)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.record.as_ref().map(|r| r.expires_at)
    }

    /// Read one of the four flat keys by its fixed name.
    ///
    /// Values are rendered the way the reference client persists them:
    /// the user as JSON, the expiry as RFC 3339, token and payload verbatim.
    pub fn get(&self, key: &str) -> Option<String> {
        let record = self.record.as_ref()?;
        match key {
            KEY_USER => serde_json::to_string(&record.user).ok(),
            KEY_SESSION_EXPIRY => Some(record.expires_at.to_rfc3339()),
            KEY_JWT_TOKEN => record.jwt_token.clone(),
            KEY_ENCRYPTED_PAYLOAD => record.encrypted_payload.clone(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn test_user() -> SessionUser {
        SessionUser {
            user_id: "u1".into(),
            username: "alice".into(),
        }
    }

    #[test]
    fn test_create_and_read_keys() {
        let mut store = SessionStore::new();
        let expiry = Utc::now() + Duration::minutes(5);
        store.create(test_user(), expiry);
        store.set_artifacts("tok".into(), "payload".into());

        assert_eq!(
            store.get(KEY_USER).unwrap(),
            r#"{"userId":"u1","username":"alice"}"#
        );
        assert_eq!(store.get(KEY_SESSION_EXPIRY).unwrap(), expiry.to_rfc3339());
        assert_eq!(store.get(KEY_JWT_TOKEN).unwrap(), "tok");
        assert_eq!(store.get(KEY_ENCRYPTED_PAYLOAD).unwrap(), "payload");
        assert_eq!(store.get("unknown_key"), None);
    }

    #[test]
    fn test_clear_removes_all_keys_at_once() {
        let mut store = SessionStore::new();
        store.create(test_user(), Utc::now() + Duration::minutes(5));
        store.set_artifacts("tok".into(), "payload".into());

        store.clear();

        assert!(store.is_empty());
        for key in [KEY_USER, KEY_SESSION_EXPIRY, KEY_JWT_TOKEN, KEY_ENCRYPTED_PAYLOAD] {
            assert_eq!(store.get(key), None);
        }
    }

    #[test]
    fn test_artifacts_absent_until_handshake() {
        let mut store = SessionStore::new();
        store.create(test_user(), Utc::now() + Duration::minutes(5));

        assert!(store.get(KEY_USER).is_some());
        assert_eq!(store.get(KEY_JWT_TOKEN), None);
        assert_eq!(store.get(KEY_ENCRYPTED_PAYLOAD), None);
    }

    #[test]
    fn test_refresh_extends_expiry() {
        let mut store = SessionStore::new();
        let first = Utc::now() + Duration::minutes(5);
        store.create(test_user(), first);

        let extended = first + Duration::minutes(5);
        store.set_expiry(extended);
        assert_eq!(store.expires_at(), Some(extended));
    }
}
