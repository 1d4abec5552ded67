//! Credential issuance and session resolution.
//!
//! Passwords are hashed with Argon2 at signup and verified at login; a
//! successful login mints an opaque random session token held in an
//! in-memory [`SessionStore`] with a TTL. HTTP requests present the token
//! as `Authorization: Bearer <token>`; the live-channel handshake presents
//! it as a `token` query parameter.

use std::collections::HashMap;

use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use axum::http::HeaderMap;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use rand::RngCore;
use tracing::debug;

use murmur_shared::types::UserId;

use crate::error::ServerError;

/// Hash a password using default Argon2 settings.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    Ok(argon2
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

/// Verify a password against a stored Argon2 PHC string.
///
/// An unparseable stored hash verifies as false rather than erroring; it can
/// only mean a corrupted row, and login should fail closed.
pub fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

struct Session {
    user_id: UserId,
    expires_at: DateTime<Utc>,
}

/// In-memory map from session token to identity.
///
/// Tokens are 32 random bytes, hex-encoded. Sessions expire after the
/// configured TTL; a periodic background task evicts the stale ones so the
/// map does not grow without bound.
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Session>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl: Duration::seconds(ttl_secs as i64),
        }
    }

    /// Mint a fresh token for the given user.
    pub fn issue(&self, user_id: UserId) -> String {
        let mut bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        let token = hex::encode(bytes);

        self.sessions.lock().insert(
            token.clone(),
            Session {
                user_id,
                expires_at: Utc::now() + self.ttl,
            },
        );

        token
    }

    /// Resolve a token to its user, if the session exists and has not
    /// expired. An expired session is evicted on the spot.
    pub fn resolve(&self, token: &str) -> Option<UserId> {
        let mut sessions = self.sessions.lock();

        match sessions.get(token) {
            Some(session) if session.expires_at > Utc::now() => Some(session.user_id),
            Some(_) => {
                sessions.remove(token);
                debug!("evicted expired session");
                None
            }
            None => None,
        }
    }

    /// Drop the session for this token, if any. Idempotent.
    pub fn revoke(&self, token: &str) {
        self.sessions.lock().remove(token);
    }

    /// Evict every expired session.
    pub fn purge_expired(&self) {
        let now = Utc::now();
        self.sessions.lock().retain(|_, s| s.expires_at > now);
    }

    /// Number of live sessions (including not-yet-purged expired ones).
    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }
}

/// Extract the bearer token from an `Authorization` header, if present.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Resolve the caller's identity from request headers or reject with 401.
pub fn require_session(headers: &HeaderMap, sessions: &SessionStore) -> Result<UserId, ServerError> {
    let token = bearer_token(headers)
        .ok_or_else(|| ServerError::Unauthorized("No token provided".to_string()))?;

    sessions
        .resolve(token)
        .ok_or_else(|| ServerError::Unauthorized("Invalid or expired token".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
    }

    #[test]
    fn corrupted_hash_fails_closed() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[test]
    fn issue_and_resolve_session() {
        let store = SessionStore::new(3600);
        let user = UserId::new();

        let token = store.issue(user);
        assert_eq!(store.resolve(&token), Some(user));
        assert_eq!(store.resolve("deadbeef"), None);
    }

    #[test]
    fn expired_session_is_rejected_and_evicted() {
        let store = SessionStore::new(0);
        let token = store.issue(UserId::new());

        assert_eq!(store.resolve(&token), None);
        assert_eq!(store.session_count(), 0);
    }

    #[test]
    fn revoke_is_idempotent() {
        let store = SessionStore::new(3600);
        let token = store.issue(UserId::new());

        store.revoke(&token);
        store.revoke(&token);
        assert_eq!(store.resolve(&token), None);
    }

    #[test]
    fn purge_drops_only_expired_sessions() {
        let live = SessionStore::new(3600);
        let token = live.issue(UserId::new());
        live.purge_expired();
        assert!(live.resolve(&token).is_some());

        let dead = SessionStore::new(0);
        dead.issue(UserId::new());
        dead.purge_expired();
        assert_eq!(dead.session_count(), 0);
    }

    #[test]
    fn bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        assert!(bearer_token(&headers).is_none());

        headers.insert("authorization", "Bearer abc123".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc123"));

        headers.insert("authorization", "Basic abc123".parse().unwrap());
        assert!(bearer_token(&headers).is_none());
    }
}
