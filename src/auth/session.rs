//! In-memory session store and the middleware that resolves the caller
//!
//! Sessions are created by the superadmin login route and looked up on every
//! request, either from an `Authorization: Bearer` header or from the
//! session cookie.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::Response;
use dashmap::DashMap;
use uuid::Uuid;

use super::AuthUser;

pub const SESSION_COOKIE: &str = "spoke_session";

#[derive(Clone, Debug)]
struct Session {
    user: AuthUser,
    created_at: Instant,
}

#[derive(Debug)]
pub struct SessionStore {
    sessions: DashMap<String, Session>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
        }
    }

    /// Create a session for `user` and return its token
    pub fn create(&self, user: AuthUser) -> String {
        let token = Uuid::new_v4().simple().to_string();
        self.sessions.insert(
            token.clone(),
            Session {
                user,
                created_at: Instant::now(),
            },
        );
        token
    }

    pub fn get(&self, token: &str) -> Option<AuthUser> {
        let expired = match self.sessions.get(token) {
            Some(session) if session.created_at.elapsed() < self.ttl => {
                return Some(session.user.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            self.sessions.remove(token);
        }
        None
    }

    /// Drop expired sessions, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let before = self.sessions.len();
        self.sessions
            .retain(|_, session| session.created_at.elapsed() < self.ttl);
        before - self.sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Extract a session token from the bearer header or the session cookie
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        return Some(token.trim().to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
}

/// Attach the [`AuthUser`] for the request's session, if any
pub async fn authenticate(
    State(sessions): State<Arc<SessionStore>>,
    mut req: Request,
    next: Next,
) -> Response {
    if let Some(user) = session_token(req.headers()).and_then(|token| sessions.get(&token)) {
        tracing::debug!(user_id = user.id, "Authenticated request");
        req.extensions_mut().insert(user);
    }

    next.run(req).await
}
