//! Server-side sessions carrying sign-in state and pending authorizations.
//!
//! The browser only holds a random session id in the `simpleident_session`
//! cookie. State lives in the `SessionManager`:
//! - the signed-in account, if any
//! - the pending authorization between the two legs of `/oauth2/authorize`
//!
//! Handlers load a `Session` (a working copy), mutate it through the
//! `SessionBridge` trait, and write it back with `save`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::OAuthResult;
use crate::secret::{SESSION_ID_LEN, generate_secret};

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "simpleident_session";

/// Context recorded by the first authorize leg for the second one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAuthorization {
    pub client_id: Uuid,
    pub redirect_uri: String,
    pub state: String,
}

/// Everything stored per session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub account_id: Option<Uuid>,
    pub pending: Option<PendingAuthorization>,
}

impl SessionState {
    fn is_empty(&self) -> bool {
        self.account_id.is_none() && self.pending.is_none()
    }
}

/// Session operations the authorization engine relies on.
#[async_trait]
pub trait SessionBridge: Send {
    /// Account bound by a successful sign-in.
    fn account_id(&self) -> Option<Uuid>;

    fn set_account_id(&mut self, account_id: Uuid);

    fn pending_authorization(&self) -> Option<&PendingAuthorization>;

    fn set_pending_authorization(&mut self, pending: PendingAuthorization);

    /// Remove and return the pending authorization.
    fn take_pending_authorization(&mut self) -> Option<PendingAuthorization>;

    /// Drop all session data.
    fn clear(&mut self);

    /// Make the current state visible to later requests.
    async fn save(&mut self) -> OAuthResult<()>;
}

struct Entry {
    state: SessionState,
    last_active: Instant,
}

/// In-memory session table.
#[derive(Clone)]
pub struct SessionManager {
    sessions: Arc<RwLock<HashMap<String, Entry>>>,
    idle_timeout: Duration,
}

impl SessionManager {
    /// Create a new session manager.
    #[must_use]
    pub fn new(idle_timeout: Duration) -> Self {
        Self { sessions: Arc::new(RwLock::new(HashMap::new())), idle_timeout }
    }

    /// Load the session named by the cookie value, or start a fresh one.
    ///
    /// Unknown or idle-expired ids start a fresh session with a new id.
    pub async fn load(&self, id: Option<&str>) -> OAuthResult<Session> {
        if let Some(id) = id {
            let mut sessions = self.sessions.write().await;
            if let Some(entry) = sessions.get_mut(id) {
                if entry.last_active.elapsed() <= self.idle_timeout {
                    entry.last_active = Instant::now();
                    return Ok(Session {
                        id: id.to_owned(),
                        state: entry.state.clone(),
                        manager: self.clone(),
                        is_new: false,
                    });
                }
                sessions.remove(id);
            }
        }

        Ok(Session {
            id: generate_secret(SESSION_ID_LEN)?,
            state: SessionState::default(),
            manager: self.clone(),
            is_new: true,
        })
    }

    async fn store(&self, id: &str, state: &SessionState) {
        let mut sessions = self.sessions.write().await;
        if state.is_empty() {
            sessions.remove(id);
        } else {
            sessions
                .insert(id.to_owned(), Entry { state: state.clone(), last_active: Instant::now() });
        }
    }

    async fn remove(&self, id: &str) {
        self.sessions.write().await.remove(id);
    }

    /// Remove sessions idle for longer than the timeout.
    pub async fn cleanup_stale_sessions(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| entry.last_active.elapsed() <= self.idle_timeout);
        before - sessions.len()
    }

    /// Get session count (for monitoring).
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Start background cleanup task.
    pub fn start_cleanup_task(self, interval: Duration) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(interval);
            loop {
                interval.tick().await;
                let cleaned = self.cleanup_stale_sessions().await;
                if cleaned > 0 {
                    tracing::debug!(count = cleaned, "Session cleanup completed");
                }
            }
        });
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager").field("idle_timeout", &self.idle_timeout).finish()
    }
}

/// Working copy of one session.
pub struct Session {
    id: String,
    state: SessionState,
    manager: SessionManager,
    is_new: bool,
}

impl Session {
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether the id was minted by this request (the cookie must be set).
    #[must_use]
    pub const fn is_new(&self) -> bool {
        self.is_new
    }

    #[must_use]
    pub const fn state(&self) -> &SessionState {
        &self.state
    }

    /// Move the state to a fresh id and drop the old entry.
    ///
    /// Used on sign-in. The new id is stored on the next `save`.
    pub async fn regenerate(&mut self) -> OAuthResult<()> {
        let fresh = generate_secret(SESSION_ID_LEN)?;
        let previous = std::mem::replace(&mut self.id, fresh);
        self.manager.remove(&previous).await;
        self.is_new = true;
        Ok(())
    }

    /// Cookie carrying this session's id.
    #[must_use]
    pub fn cookie(&self) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, self.id.clone()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .build()
    }
}

#[async_trait]
impl SessionBridge for Session {
    fn account_id(&self) -> Option<Uuid> {
        self.state.account_id
    }

    fn set_account_id(&mut self, account_id: Uuid) {
        self.state.account_id = Some(account_id);
    }

    fn pending_authorization(&self) -> Option<&PendingAuthorization> {
        self.state.pending.as_ref()
    }

    fn set_pending_authorization(&mut self, pending: PendingAuthorization) {
        self.state.pending = Some(pending);
    }

    fn take_pending_authorization(&mut self) -> Option<PendingAuthorization> {
        self.state.pending.take()
    }

    fn clear(&mut self) {
        self.state = SessionState::default();
    }

    async fn save(&mut self) -> OAuthResult<()> {
        self.manager.store(&self.id, &self.state).await;
        Ok(())
    }
}

/// Load the session named by the request's session cookie.
pub async fn load_session(manager: &SessionManager, jar: &CookieJar) -> OAuthResult<Session> {
    manager.load(jar.get(SESSION_COOKIE).map(Cookie::value)).await
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").field("is_new", &self.is_new).field("state", &self.state).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending() -> PendingAuthorization {
        PendingAuthorization {
            client_id: Uuid::from_u128(42),
            redirect_uri: "https://app.example/cb".into(),
            state: "xyz".into(),
        }
    }

    #[tokio::test]
    async fn test_new_session_not_stored_until_saved() {
        let manager = SessionManager::new(Duration::from_secs(60));
        let session = manager.load(None).await.unwrap();

        assert!(session.is_new());
        assert_eq!(session.id().len(), SESSION_ID_LEN);
        assert_eq!(manager.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_save_and_reload() {
        let manager = SessionManager::new(Duration::from_secs(60));
        let account_id = Uuid::now_v7();

        let mut session = manager.load(None).await.unwrap();
        session.set_account_id(account_id);
        session.set_pending_authorization(pending());
        session.save().await.unwrap();

        let reloaded = manager.load(Some(session.id())).await.unwrap();
        assert!(!reloaded.is_new());
        assert_eq!(reloaded.account_id(), Some(account_id));
        assert_eq!(reloaded.pending_authorization(), Some(&pending()));
    }

    #[tokio::test]
    async fn test_unsaved_changes_invisible() {
        let manager = SessionManager::new(Duration::from_secs(60));
        let mut session = manager.load(None).await.unwrap();
        session.set_account_id(Uuid::now_v7());
        session.save().await.unwrap();

        let mut copy = manager.load(Some(session.id())).await.unwrap();
        copy.set_pending_authorization(pending());

        let again = manager.load(Some(session.id())).await.unwrap();
        assert!(again.pending_authorization().is_none());
    }

    #[tokio::test]
    async fn test_clear_removes_entry() {
        let manager = SessionManager::new(Duration::from_secs(60));
        let mut session = manager.load(None).await.unwrap();
        session.set_account_id(Uuid::now_v7());
        session.save().await.unwrap();
        assert_eq!(manager.session_count().await, 1);

        session.clear();
        session.save().await.unwrap();
        assert_eq!(manager.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_unknown_id_starts_fresh() {
        let manager = SessionManager::new(Duration::from_secs(60));
        let session = manager.load(Some("forged")).await.unwrap();
        assert!(session.is_new());
        assert_ne!(session.id(), "forged");
    }

    #[tokio::test]
    async fn test_idle_sessions_expire() {
        let manager = SessionManager::new(Duration::ZERO);
        let mut session = manager.load(None).await.unwrap();
        session.set_account_id(Uuid::now_v7());
        session.save().await.unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;

        let reloaded = manager.load(Some(session.id())).await.unwrap();
        assert!(reloaded.is_new());
        assert!(reloaded.account_id().is_none());
    }

    #[tokio::test]
    async fn test_take_pending() {
        let manager = SessionManager::new(Duration::from_secs(60));
        let mut session = manager.load(None).await.unwrap();
        session.set_pending_authorization(pending());

        assert_eq!(session.take_pending_authorization(), Some(pending()));
        assert!(session.pending_authorization().is_none());
    }

    #[tokio::test]
    async fn test_regenerate_moves_state_to_new_id() {
        let manager = SessionManager::new(Duration::from_secs(60));
        let mut session = manager.load(None).await.unwrap();
        session.set_pending_authorization(pending());
        session.save().await.unwrap();
        let old_id = session.id().to_owned();

        session.regenerate().await.unwrap();
        session.set_account_id(Uuid::now_v7());
        session.save().await.unwrap();

        assert_ne!(session.id(), old_id);
        assert!(session.is_new());
        assert_eq!(manager.session_count().await, 1);

        let stale = manager.load(Some(&old_id)).await.unwrap();
        assert!(stale.is_new());
        assert!(stale.account_id().is_none());

        let current = manager.load(Some(session.id())).await.unwrap();
        assert_eq!(current.pending_authorization(), Some(&pending()));
        assert!(current.account_id().is_some());
    }
}
