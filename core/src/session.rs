//! Per-client session: endpoint, credentials and the current token.
//!
//! # Design
//! `Session` is a cloneable handle over shared state. Every component that
//! needs it receives a clone at construction; nothing reads global state.
//! The dispatcher only reads the token. Authentication, validation and the
//! explicit accessors are the only writers.
//!
//! The lock is a `std::sync::RwLock` that is never held across an `.await`.
//! A poisoned lock is recovered, not propagated.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::{ClientOptions, Endpoint};

/// Login/password pair used by password authentication.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub login: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Externally issued token plus the URL of its issuer.
#[derive(Clone, PartialEq, Eq)]
pub struct FederatedCredential {
    pub login: String,
    pub external_token: String,
    pub external_token_url: String,
    pub ttl_hint: Option<u64>,
}

impl fmt::Debug for FederatedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FederatedCredential")
            .field("login", &self.login)
            .field("external_token", &"[REDACTED]")
            .field("external_token_url", &self.external_token_url)
            .field("ttl_hint", &self.ttl_hint)
            .finish()
    }
}

/// Which credential produced the current token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    Password,
    Federated,
}

/// Observable authentication state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    Authenticating,
    Authenticated,
}

#[derive(Default)]
struct SessionState {
    credentials: Option<Credentials>,
    federated: Option<FederatedCredential>,
    active: Option<AuthMethod>,
    token: Option<String>,
    token_lifetime_hint: Option<u64>,
    /// Logins currently in flight.
    authenticating: usize,
}

struct SessionInner {
    endpoint: Endpoint,
    state: RwLock<SessionState>,
}

/// Shared handle to one client's session state.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    pub fn new(host: &str, options: ClientOptions) -> Self {
        Self::with_endpoint(Endpoint::new(host, options))
    }

    pub fn with_endpoint(endpoint: Endpoint) -> Self {
        let state = SessionState {
            token_lifetime_hint: endpoint.expires,
            ..Default::default()
        };
        Self {
            inner: Arc::new(SessionInner {
                endpoint,
                state: RwLock::new(state),
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, SessionState> {
        self.inner.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.inner.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.inner.endpoint
    }

    pub fn token(&self) -> Option<String> {
        self.read().token.clone()
    }

    /// Store an externally obtained token. Empty or blank tokens are rejected.
    pub fn set_token(&self, token: &str) -> bool {
        if token.trim().is_empty() {
            return false;
        }
        self.write().token = Some(token.to_string());
        true
    }

    /// Drop the local token. Credentials are kept for re-authentication.
    pub fn clear_token(&self) {
        let mut state = self.write();
        state.token = None;
        state.active = None;
    }

    pub fn auth_state(&self) -> AuthState {
        let state = self.read();
        if state.authenticating > 0 {
            AuthState::Authenticating
        } else if state.token.is_some() {
            AuthState::Authenticated
        } else {
            AuthState::Unauthenticated
        }
    }

    pub fn active_method(&self) -> Option<AuthMethod> {
        self.read().active
    }

    pub fn credentials(&self) -> Option<Credentials> {
        self.read().credentials.clone()
    }

    pub fn federated_credential(&self) -> Option<FederatedCredential> {
        self.read().federated.clone()
    }

    pub fn token_lifetime_hint(&self) -> Option<u64> {
        self.read().token_lifetime_hint
    }

    pub(crate) fn begin_authenticating(&self) {
        self.write().authenticating += 1;
    }

    pub(crate) fn end_authenticating(&self) {
        let mut state = self.write();
        state.authenticating = state.authenticating.saturating_sub(1);
    }

    pub(crate) fn complete_password_login(&self, credentials: Credentials, token: String) {
        let mut state = self.write();
        state.credentials = Some(credentials);
        state.active = Some(AuthMethod::Password);
        state.token = Some(token);
    }

    pub(crate) fn complete_federated_login(&self, credential: FederatedCredential, token: String) {
        let mut state = self.write();
        if credential.ttl_hint.is_some() {
            state.token_lifetime_hint = credential.ttl_hint;
        }
        state.federated = Some(credential);
        state.active = Some(AuthMethod::Federated);
        state.token = Some(token);
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.read();
        f.debug_struct("Session")
            .field("endpoint", &self.inner.endpoint)
            .field("active", &state.active)
            .field("has_token", &state.token.is_some())
            .field("authenticating", &(state.authenticating > 0))
            .finish()
    }
}

/// Marks one authentication call in flight until dropped, however the call
/// finishes. Overlapping logins keep the session `Authenticating` until the
/// last one ends.
pub(crate) struct AuthenticatingGuard<'a> {
    session: &'a Session,
}

impl<'a> AuthenticatingGuard<'a> {
    pub(crate) fn enter(session: &'a Session) -> Self {
        session.begin_authenticating();
        Self { session }
    }
}

impl Drop for AuthenticatingGuard<'_> {
    fn drop(&mut self) {
        self.session.end_authenticating();
    }
}
