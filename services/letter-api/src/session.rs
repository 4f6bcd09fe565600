//! In-memory session and pending-login state
//!
//! Sessions map an opaque cookie value to the Google tokens obtained during
//! login. Pending logins hold the PKCE verifier between the redirect to
//! Google and the callback. Both stores expire entries lazily: sweeps happen
//! while a caller already holds the lock, so no background task is needed.
//! State lives in process memory only; a restart logs everyone out.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngExt;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// How long a started login may wait for its callback.
const PENDING_LOGIN_EXPIRY: Duration = Duration::from_secs(600); // 10 minutes

/// Who the session belongs to, from the Google userinfo endpoint.
#[derive(Debug, Clone)]
pub struct Identity {
    pub id: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
}

/// A logged-in user's server-side state. Holds live Google tokens, so the
/// type deliberately has no Debug impl.
#[derive(Clone)]
pub struct Session {
    pub user: Identity,
    pub access_token: String,
    pub refresh_token: Option<String>,
    created_at: Instant,
}

/// Cookie-keyed session store with a fixed TTL.
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Session>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Create a session and return its id (the cookie value).
    pub async fn create(
        &self,
        user: Identity,
        access_token: String,
        refresh_token: Option<String>,
    ) -> String {
        let id = new_session_id();
        let mut sessions = self.sessions.lock().await;
        // Lazy cleanup: remove expired entries while holding the lock
        sessions.retain(|_, s| s.created_at.elapsed() < self.ttl);
        sessions.insert(
            id.clone(),
            Session {
                user,
                access_token,
                refresh_token,
                created_at: Instant::now(),
            },
        );
        id
    }

    /// Look up a session by id. Expired entries are dropped on access.
    pub async fn get(&self, id: &str) -> Option<Session> {
        let mut sessions = self.sessions.lock().await;
        match sessions.get(id) {
            Some(session) if session.created_at.elapsed() < self.ttl => Some(session.clone()),
            Some(_) => {
                sessions.remove(id);
                None
            }
            None => None,
        }
    }

    pub async fn remove(&self, id: &str) {
        self.sessions.lock().await.remove(id);
    }

    /// Count live sessions, sweeping expired ones first.
    pub async fn len(&self) -> usize {
        let mut sessions = self.sessions.lock().await;
        sessions.retain(|_, s| s.created_at.elapsed() < self.ttl);
        sessions.len()
    }
}

struct PendingLogin {
    verifier: String,
    created_at: Instant,
}

/// Logins that have been redirected to Google but not yet called back.
/// Keyed by the `state` value; each entry is single-use.
pub struct PendingLogins {
    entries: Mutex<HashMap<String, PendingLogin>>,
}

impl PendingLogins {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub async fn insert(&self, state: String, verifier: String) {
        let mut entries = self.entries.lock().await;
        // Lazy cleanup: remove expired entries while holding the lock
        entries.retain(|_, p| p.created_at.elapsed() < PENDING_LOGIN_EXPIRY);
        entries.insert(
            state,
            PendingLogin {
                verifier,
                created_at: Instant::now(),
            },
        );
    }

    /// Consume the pending login for `state`, returning its verifier.
    /// Returns None for unknown or expired states.
    pub async fn take(&self, state: &str) -> Option<String> {
        let mut entries = self.entries.lock().await;
        let pending = entries.remove(state)?;
        if pending.created_at.elapsed() < PENDING_LOGIN_EXPIRY {
            Some(pending.verifier)
        } else {
            None
        }
    }
}

impl Default for PendingLogins {
    fn default() -> Self {
        Self::new()
    }
}

/// 32 random bytes as URL-safe base64, 43 characters. Unguessable and safe
/// to put in a cookie without further encoding.
fn new_session_id() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
