//! Session storage for browser logins.
//!
//! The store keeps two kinds of state: established sessions (cookie value is
//! the session ID) and pending authorization states created when a login
//! flow starts. Both are behind the `SessionStore` trait so multi-node
//! deployments can plug in a shared backend; the in-memory store is the
//! single-node default.

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::principal::Principal;

/// Result type for session store operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors that can occur during session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session not found")]
    NotFound,

    #[error("Session expired")]
    Expired,

    #[error("Session backend error: {0}")]
    Backend(String),
}

/// An established login session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Session ID (the cookie value).
    pub id: Uuid,

    /// The authenticated identity.
    pub principal: Principal,

    /// When the session was created.
    pub created_at: DateTime<Utc>,

    /// When the session expires.
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn new(principal: Principal, duration: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            principal,
            created_at: now,
            expires_at: now
                + chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::hours(8)),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Pending authorization state, stored between the redirect to the provider
/// and the callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationState {
    /// State parameter, echoed back by the provider.
    pub state: String,

    /// Nonce for ID token replay protection.
    pub nonce: String,

    /// PKCE code verifier.
    pub code_verifier: String,

    /// When this state was created.
    pub created_at: DateTime<Utc>,
}

impl AuthorizationState {
    /// Check if the state has expired (10 minute limit).
    pub fn is_expired(&self) -> bool {
        Utc::now() - self.created_at > chrono::Duration::minutes(10)
    }
}

/// Trait for session storage.
///
/// Implementations must be thread-safe and handle concurrent access.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Store a new session.
    async fn create_session(&self, session: Session) -> SessionResult<Uuid>;

    /// Get a session by ID. Expired sessions are removed and reported as absent.
    async fn get_session(&self, id: Uuid) -> SessionResult<Option<Session>>;

    /// Delete a session.
    async fn delete_session(&self, id: Uuid) -> SessionResult<()>;

    /// Store pending authorization state.
    async fn store_auth_state(&self, state: AuthorizationState) -> SessionResult<()>;

    /// Get and remove pending authorization state (one-time use).
    async fn take_auth_state(&self, state: &str) -> SessionResult<Option<AuthorizationState>>;

    /// Clean up expired sessions and stale auth states.
    async fn cleanup(&self) -> SessionResult<()>;
}

/// Type alias for a shared session store.
pub type SharedSessionStore = Arc<dyn SessionStore>;

// ─────────────────────────────────────────────────────────────────────────────
// Memory Session Store
// ─────────────────────────────────────────────────────────────────────────────

/// In-memory session store.
///
/// Suitable for development and single-node deployments.
/// Sessions are lost on restart and not shared across nodes.
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<Uuid, Session>>,
    pending_auth: RwLock<HashMap<String, AuthorizationState>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            pending_auth: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create_session(&self, session: Session) -> SessionResult<Uuid> {
        let id = session.id;
        let mut sessions = self.sessions.write().await;
        sessions.insert(id, session);
        Ok(id)
    }

    async fn get_session(&self, id: Uuid) -> SessionResult<Option<Session>> {
        {
            let sessions = self.sessions.read().await;
            match sessions.get(&id) {
                Some(session) if !session.is_expired() => return Ok(Some(session.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }

        // Expired: drop it so the map does not grow unbounded
        let mut sessions = self.sessions.write().await;
        sessions.remove(&id);
        Ok(None)
    }

    async fn delete_session(&self, id: Uuid) -> SessionResult<()> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(&id);
        Ok(())
    }

    async fn store_auth_state(&self, state: AuthorizationState) -> SessionResult<()> {
        let mut pending = self.pending_auth.write().await;
        pending.insert(state.state.clone(), state);
        Ok(())
    }

    async fn take_auth_state(&self, state: &str) -> SessionResult<Option<AuthorizationState>> {
        let mut pending = self.pending_auth.write().await;
        Ok(pending.remove(state))
    }

    async fn cleanup(&self) -> SessionResult<()> {
        let now = Utc::now();

        {
            let mut sessions = self.sessions.write().await;
            sessions.retain(|_, s| s.expires_at > now);
        }

        {
            let cutoff = now - chrono::Duration::minutes(10);
            let mut pending = self.pending_auth.write().await;
            pending.retain(|_, s| s.created_at > cutoff);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal() -> Principal {
        Principal {
            id: "user-123".to_string(),
            issuer: "https://id.example".to_string(),
            email: Some("user@example.com".to_string()),
            name: Some("Test User".to_string()),
        }
    }

    #[tokio::test]
    async fn session_round_trip() {
        let store = MemorySessionStore::new();
        let session = Session::new(principal(), Duration::from_secs(3600));
        let id = session.id;

        store.create_session(session).await.unwrap();

        let retrieved = store.get_session(id).await.unwrap().unwrap();
        assert_eq!(retrieved.principal.id, "user-123");

        store.delete_session(id).await.unwrap();
        assert!(store.get_session(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_session_is_absent() {
        let store = MemorySessionStore::new();
        let mut session = Session::new(principal(), Duration::from_secs(3600));
        session.expires_at = Utc::now() - chrono::Duration::hours(1);
        let id = session.id;

        store.create_session(session).await.unwrap();
        assert!(store.get_session(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn auth_state_is_one_time_use() {
        let store = MemorySessionStore::new();

        let state = AuthorizationState {
            state: "test-state".to_string(),
            nonce: "test-nonce".to_string(),
            code_verifier: "verifier".to_string(),
            created_at: Utc::now(),
        };

        store.store_auth_state(state).await.unwrap();

        let retrieved = store.take_auth_state("test-state").await.unwrap().unwrap();
        assert_eq!(retrieved.code_verifier, "verifier");

        assert!(store.take_auth_state("test-state").await.unwrap().is_none());
    }

    #[test]
    fn auth_state_expires_after_ten_minutes() {
        let state = AuthorizationState {
            state: "test".to_string(),
            nonce: "test-nonce".to_string(),
            code_verifier: "verifier".to_string(),
            created_at: Utc::now() - chrono::Duration::minutes(15),
        };

        assert!(state.is_expired());
    }

    #[tokio::test]
    async fn cleanup_drops_stale_entries() {
        let store = MemorySessionStore::new();

        let mut expired = Session::new(principal(), Duration::from_secs(3600));
        expired.expires_at = Utc::now() - chrono::Duration::hours(1);
        store.create_session(expired).await.unwrap();

        let live = Session::new(principal(), Duration::from_secs(3600));
        let live_id = live.id;
        store.create_session(live).await.unwrap();

        store
            .store_auth_state(AuthorizationState {
                state: "stale".to_string(),
                nonce: "n".to_string(),
                code_verifier: "v".to_string(),
                created_at: Utc::now() - chrono::Duration::minutes(20),
            })
            .await
            .unwrap();

        store.cleanup().await.unwrap();

        assert!(store.get_session(live_id).await.unwrap().is_some());
        assert!(store.take_auth_state("stale").await.unwrap().is_none());
    }
}
