//! Per-connection protocol lifecycle
//!
//! A session starts `Uninitialized`, flips to `Ready` once the `initialize`
//! exchange succeeds, and ends `Closed` when its connection is torn down.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use tokio::time::Instant;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Uninitialized,
    Ready,
    Closed,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Session {
    state: SessionState,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// One-way `Uninitialized -> Ready`. No-op when already ready or closed.
    pub fn mark_initialized(&mut self) {
        if self.state == SessionState::Uninitialized {
            self.state = SessionState::Ready;
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.state == SessionState::Ready
    }

    pub fn close(&mut self) {
        self.state = SessionState::Closed;
    }

    pub fn state(&self) -> SessionState {
        self.state
    }
}

pub const DEFAULT_SESSION_CAPACITY: usize = 1024;
pub const DEFAULT_SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone, Copy)]
struct StoredSession {
    session: Session,
    last_seen: Instant,
}

/// Sessions of the unary transport, keyed by the `Mcp-Session-Id` header.
///
/// Only initialized sessions are stored. The lock is never held across an
/// await point: callers copy a session out, dispatch, and store it back.
/// Sessions idle for longer than the timeout are forgotten, and once the
/// store is full the least recently seen session makes room for a new one.
#[derive(Debug, Clone)]
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<String, StoredSession>>>,
    capacity: usize,
    idle_timeout: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_limits(DEFAULT_SESSION_CAPACITY, DEFAULT_SESSION_IDLE_TIMEOUT)
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(capacity: usize, idle_timeout: Duration) -> Self {
        Self {
            sessions: Arc::default(),
            capacity: capacity.max(1),
            idle_timeout,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, StoredSession>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copies the session out and marks it as seen. Expired sessions are
    /// dropped instead.
    pub fn get(&self, id: &str) -> Option<Session> {
        let now = Instant::now();
        let mut sessions = self.lock();
        let entry = sessions.get_mut(id)?;

        if now.duration_since(entry.last_seen) > self.idle_timeout {
            sessions.remove(id);
            info!(session_id = %id, "unary session expired");
            return None;
        }

        entry.last_seen = now;
        Some(entry.session)
    }

    pub fn insert(&self, id: String, session: Session) {
        let now = Instant::now();
        let mut sessions = self.lock();

        let before = sessions.len();
        sessions.retain(|_, entry| now.duration_since(entry.last_seen) <= self.idle_timeout);
        if sessions.len() < before {
            debug!(expired = before - sessions.len(), "swept idle unary sessions");
        }

        if !sessions.contains_key(&id) && sessions.len() >= self.capacity {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, entry)| entry.last_seen)
                .map(|(key, _)| key.clone());
            if let Some(oldest) = oldest {
                sessions.remove(&oldest);
                info!(session_id = %oldest, "unary session evicted");
            }
        }

        sessions.insert(
            id,
            StoredSession {
                session,
                last_seen: now,
            },
        );
    }

    /// Removes the session and returns it in its `Closed` state.
    pub fn remove(&self, id: &str) -> Option<Session> {
        self.lock().remove(id).map(|entry| {
            let mut session = entry.session;
            session.close();
            session
        })
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialization_is_one_way_and_idempotent() {
        let mut session = Session::new();
        assert!(!session.is_initialized());

        session.mark_initialized();
        session.mark_initialized();
        assert!(session.is_initialized());
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[test]
    fn closed_session_cannot_be_reinitialized() {
        let mut session = Session::new();
        session.mark_initialized();
        session.close();
        session.mark_initialized();

        assert!(!session.is_initialized());
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn store_round_trips_sessions_by_id() {
        let store = SessionStore::new();
        let mut session = Session::new();
        session.mark_initialized();
        store.insert("abc".to_string(), session);

        assert!(store.get("abc").is_some_and(|s| s.is_initialized()));
        assert!(store.get("other").is_none());

        let removed = store.remove("abc").expect("session present");
        assert_eq!(removed.state(), SessionState::Closed);
        assert!(store.is_empty());
    }

    fn ready() -> Session {
        let mut session = Session::new();
        session.mark_initialized();
        session
    }

    #[tokio::test(start_paused = true)]
    async fn full_store_evicts_least_recently_seen() {
        let tick = Duration::from_secs(1);
        let store = SessionStore::with_limits(2, DEFAULT_SESSION_IDLE_TIMEOUT);
        store.insert("first".to_string(), ready());
        tokio::time::advance(tick).await;
        store.insert("second".to_string(), ready());
        tokio::time::advance(tick).await;
        assert!(store.get("first").is_some());
        tokio::time::advance(tick).await;

        store.insert("third".to_string(), ready());

        assert_eq!(store.len(), 2);
        assert!(store.get("second").is_none());
        assert!(store.get("first").is_some());
        assert!(store.get("third").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn idle_sessions_expire() {
        let idle_timeout = Duration::from_secs(60);
        let store = SessionStore::with_limits(16, idle_timeout);
        store.insert("stale".to_string(), ready());
        store.insert("lookup".to_string(), ready());

        tokio::time::advance(idle_timeout + Duration::from_secs(1)).await;

        assert!(store.get("lookup").is_none());
        store.insert("fresh".to_string(), ready());
        assert_eq!(store.len(), 1);
        assert!(store.get("fresh").is_some());
    }
}
