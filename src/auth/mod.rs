//! Session lifecycle.
//!
//! [`SessionManager`] is the single owner of the in-memory session. It signs
//! in, signs up and signs out against an [`IdentityService`], and restores
//! sessions from the [`SessionStore`], evicting entries that are corrupt or
//! expired.
//!
//! Authentication here gates client navigation only. `check_auth` trusts the
//! persisted expiry timestamp and performs no server-side revalidation.

pub mod identity;
pub mod session;

pub use identity::{HttpIdentityService, IdentityService, MockIdentityService};
pub use session::{normalize_auth_response, Session, User};

use chrono::{Duration, Utc};
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::storage::{SessionStore, StorageError};

/// Authentication failures, returned as values so callers can render the
/// message inline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("{0}")]
    InvalidCredentials(String),

    #[error("{0}")]
    MalformedServerResponse(String),

    #[error("{0}")]
    NetworkFailure(String),

    /// Signed in remotely, but the session could not be written to the store.
    #[error("Could not save session: {0}")]
    SessionNotSaved(String),
}

#[derive(Debug, Default)]
struct AuthState {
    session: Option<Session>,
    last_error: Option<String>,
}

pub struct SessionManager {
    identity: Arc<dyn IdentityService>,
    store: Arc<dyn SessionStore>,
    session_key: String,
    session_ttl: Duration,
    state: RwLock<AuthState>,
    in_flight: AtomicUsize,
}

/// Marks an auth call as in flight until dropped.
struct LoadingGuard<'a>(&'a AtomicUsize);

impl<'a> LoadingGuard<'a> {
    fn start(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl SessionManager {
    pub fn new(
        identity: Arc<dyn IdentityService>,
        store: Arc<dyn SessionStore>,
        session_key: impl Into<String>,
        session_ttl: Duration,
    ) -> Self {
        Self {
            identity,
            store,
            session_key: session_key.into(),
            session_ttl,
            state: RwLock::new(AuthState::default()),
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Sign in with email and password. A failure leaves any existing
    /// session, in memory and persisted, untouched.
    pub async fn login(&self, email: &str, password: &str) -> Result<(), AuthError> {
        let _loading = LoadingGuard::start(&self.in_flight);
        self.state.write().last_error = None;

        let result = self.identity.sign_in(email, password).await;
        self.complete_authentication(result, "login")
    }

    /// Create an account and sign in as it. Same persistence rules as [`login`](Self::login).
    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<(), AuthError> {
        let _loading = LoadingGuard::start(&self.in_flight);
        self.state.write().last_error = None;

        let result = self.identity.sign_up(name, email, password).await;
        self.complete_authentication(result, "register")
    }

    fn complete_authentication(
        &self,
        result: Result<Value, AuthError>,
        action: &str,
    ) -> Result<(), AuthError> {
        let outcome = result
            .and_then(|payload| normalize_auth_response(&payload, self.session_ttl, Utc::now()))
            .and_then(|session| {
                self.persist(&session)
                    .map_err(|e| AuthError::SessionNotSaved(e.to_string()))?;
                Ok(session)
            });

        match outcome {
            Ok(session) => {
                info!(
                    action,
                    user_id = %session.user.id,
                    email = %session.user.email,
                    expires_at = %session.expires_at,
                    "Authenticated"
                );
                let mut state = self.state.write();
                state.session = Some(session);
                state.last_error = None;
                Ok(())
            }
            Err(e) => {
                warn!(action, error = %e, "Authentication failed");
                self.state.write().last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Sign out remotely (best effort) and drop the local session.
    ///
    /// Calling this with no active session is a local no-op and makes no
    /// remote call.
    pub async fn logout(&self) {
        let token = self.state.read().session.as_ref().map(|s| s.token.clone());

        if let Some(token) = token {
            if let Err(e) = self.identity.sign_out(&token).await {
                warn!(error = %e, "Remote sign-out failed, clearing local session anyway");
            }
        }

        {
            let mut state = self.state.write();
            if state.session.take().is_some() {
                info!("Signed out");
            }
            state.last_error = None;
        }
        self.evict();
    }

    /// Load the persisted session into memory if it exists, parses, and has
    /// not expired. Corrupt or expired entries are removed from the store.
    pub fn restore_session(&self) -> bool {
        match self.load_persisted() {
            Ok(Some(session)) if session.is_expired_at(Utc::now()) => {
                info!(expires_at = %session.expires_at, "Persisted session expired");
                self.evict();
                self.state.write().session = None;
                false
            }
            Ok(Some(session)) => {
                debug!(user_id = %session.user.id, "Restored persisted session");
                self.state.write().session = Some(session);
                true
            }
            Ok(None) => {
                self.state.write().session = None;
                false
            }
            Err(StorageError::Corrupt(reason)) => {
                warn!(reason = %reason, "Discarding corrupt persisted session");
                self.evict();
                self.state.write().session = None;
                false
            }
            Err(e) => {
                warn!(error = %e, "Failed to read persisted session");
                self.state.write().session = None;
                false
            }
        }
    }

    /// Whether navigation may treat the user as signed in.
    pub async fn check_auth(&self) -> bool {
        self.restore_session()
    }

    fn load_persisted(&self) -> Result<Option<Session>, StorageError> {
        let Some(raw) = self.store.get(&self.session_key)? else {
            return Ok(None);
        };
        Session::from_json(&raw)
            .map(Some)
            .map_err(|e| StorageError::Corrupt(e.to_string()))
    }

    fn persist(&self, session: &Session) -> Result<(), StorageError> {
        let raw = session
            .to_json()
            .map_err(|e| StorageError::Corrupt(e.to_string()))?;
        self.store.set(&self.session_key, &raw)
    }

    fn evict(&self) {
        if let Err(e) = self.store.remove(&self.session_key) {
            warn!(error = %e, "Failed to remove persisted session");
        }
    }

    /// Drop in-memory state without touching the store.
    pub fn reset(&self) {
        *self.state.write() = AuthState::default();
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.read().session.is_some()
    }

    pub fn current_user(&self) -> Option<User> {
        self.state.read().session.as_ref().map(|s| s.user.clone())
    }

    pub fn session(&self) -> Option<Session> {
        self.state.read().session.clone()
    }

    pub fn token(&self) -> Option<String> {
        self.state.read().session.as_ref().map(|s| s.token.clone())
    }

    /// Message of the most recent failed login or register.
    pub fn last_error(&self) -> Option<String> {
        self.state.read().last_error.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }
}
