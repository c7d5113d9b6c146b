//! Cityworks client: session operations on top of the dispatcher.
//!
//! # Design
//! `CityworksClient` owns one `Session` and one `Dispatcher` sharing it.
//! Domain modules either call `dispatch`/`call` directly or hold a clone of
//! the dispatcher; none of them builds wire requests on its own.
//!
//! Only the authentication operations here write session state. Each one
//! decides for itself what a non-zero `Status` means for its endpoint.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::config::ClientOptions;
use crate::detail::DetailResolver;
use crate::dispatch::{Dispatcher, WireOutcome, AUTHENTICATE_PATH, GIS_TOKEN_PATH};
use crate::error::{CallerError, ClientError, DomainFailure, Result};
use crate::http::Attachment;
use crate::payload::Payload;
use crate::session::{AuthState, AuthenticatingGuard, Credentials, FederatedCredential, Session};
use crate::transport::{ReqwestTransport, Transport};
use crate::types::{
    AuthenticateRequest, AuthenticationResult, GisTokenRequest, RevokeTokenRequest, ValidateTokenRequest,
};

pub const VALIDATE_TOKEN_PATH: &str = "General/Token/Validate";
pub const REVOKE_TOKEN_PATH: &str = "General/Token/RevokeUser";
pub const USER_PATH: &str = "General/Authentication/User";

fn payload_of<T: Serialize>(value: &T) -> std::result::Result<Payload, CallerError> {
    Payload::from_serialize(value).ok_or(CallerError::InvalidPayload)
}

/// Async client for one Cityworks install.
#[derive(Debug, Clone)]
pub struct CityworksClient {
    session: Session,
    dispatcher: Dispatcher,
}

impl CityworksClient {
    /// Client for `host` using the default `reqwest` transport.
    pub fn new(host: &str, options: ClientOptions) -> Result<Self> {
        let transport = ReqwestTransport::new().map_err(|e| ClientError::Setup(e.to_string()))?;
        Ok(Self::with_transport(host, options, Arc::new(transport)))
    }

    pub fn with_transport(host: &str, options: ClientOptions, transport: Arc<dyn Transport>) -> Self {
        Self::from_session(Session::new(host, options), transport)
    }

    pub fn from_session(session: Session, transport: Arc<dyn Transport>) -> Self {
        let dispatcher = Dispatcher::new(session.clone(), transport);
        Self { session, dispatcher }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Typed field resolver sharing this client's session.
    pub fn details(&self) -> DetailResolver {
        DetailResolver::new(self.dispatcher.clone())
    }

    pub async fn dispatch(&self, path: &str, payload: Payload) -> WireOutcome {
        self.dispatcher.dispatch(path, payload).await
    }

    pub async fn dispatch_with_attachment(
        &self,
        path: &str,
        payload: Payload,
        attachment: Attachment,
    ) -> WireOutcome {
        self.dispatcher.dispatch_with_attachment(path, payload, attachment).await
    }

    /// Dispatch a typed request merged with optional caller overrides.
    ///
    /// Fields of `required` always win over an override with the same key.
    pub async fn call<T: Serialize>(
        &self,
        path: &str,
        required: &T,
        overrides: Option<Payload>,
    ) -> WireOutcome {
        let payload = payload_of(required)?;
        let payload = match overrides {
            Some(overrides) => payload.merge_overrides(overrides),
            None => payload,
        };
        self.dispatcher.dispatch(path, payload).await
    }

    /// Log in with a login/password pair and adopt the returned token.
    pub async fn authenticate(&self, login: &str, password: &str) -> Result<String> {
        let payload = payload_of(&AuthenticateRequest {
            login_name: login,
            password,
        })?;

        let _authenticating = AuthenticatingGuard::enter(&self.session);
        let result: AuthenticationResult = self
            .dispatcher
            .dispatch(AUTHENTICATE_PATH, payload)
            .await?
            .ensure_status(DomainFailure::InvalidCredentials)?
            .decode()?;

        self.session.complete_password_login(
            Credentials {
                login: login.to_string(),
                password: password.to_string(),
            },
            result.token.clone(),
        );
        info!(login, "authenticated with password");
        Ok(result.token)
    }

    /// Log in with an externally issued token.
    ///
    /// Returns `Ok(false)` when the service does not accept the token, so a
    /// refusal can be told apart from an unreachable service.
    pub async fn authenticate_with_gis_token(
        &self,
        login: &str,
        external_token: &str,
        external_token_url: &str,
        ttl_hint: Option<u64>,
    ) -> Result<bool> {
        let payload = payload_of(&GisTokenRequest {
            login_name: login,
            gis_token: external_token,
            gis_token_url: external_token_url,
            expires: ttl_hint,
        })?;

        let _authenticating = AuthenticatingGuard::enter(&self.session);
        let envelope = self.dispatcher.dispatch(GIS_TOKEN_PATH, payload).await?;
        if !envelope.is_success() {
            info!(login, status = envelope.status, "external token refused");
            return Ok(false);
        }
        let result: AuthenticationResult = envelope.decode()?;

        self.session.complete_federated_login(
            FederatedCredential {
                login: login.to_string(),
                external_token: external_token.to_string(),
                external_token_url: external_token_url.to_string(),
                ttl_hint,
            },
            result.token,
        );
        info!(login, "authenticated with external token");
        Ok(true)
    }

    /// Ask the service whether `token` is valid.
    ///
    /// With `adopt`, a valid token replaces the session token and an invalid
    /// one leaves the session unauthenticated. A blank token is a caller
    /// error and never reaches the service.
    pub async fn validate_token(&self, token: &str, adopt: bool) -> Result<Option<Value>> {
        if token.trim().is_empty() {
            return Err(CallerError::BlankToken.into());
        }
        let payload = payload_of(&ValidateTokenRequest { token })?;
        let envelope = self.dispatcher.dispatch(VALIDATE_TOKEN_PATH, payload).await?;

        let valid = envelope.is_success() && !matches!(envelope.value, Value::Null | Value::Bool(false));
        if !valid {
            if adopt {
                self.session.clear_token();
                info!("adopted token failed validation; session cleared");
            }
            return Ok(None);
        }

        if adopt {
            self.session.set_token(token);
            info!("adopted validated token");
        }
        Ok(Some(envelope.into_value()))
    }

    /// Store an externally persisted token without checking it.
    pub fn set_token(&self, token: &str) -> bool {
        self.session.set_token(token)
    }

    pub fn get_token(&self) -> Option<String> {
        self.session.token()
    }

    pub fn clear_token(&self) {
        self.session.clear_token();
    }

    pub fn auth_state(&self) -> AuthState {
        self.session.auth_state()
    }

    /// Invalidate the current user's tokens on the service.
    ///
    /// The local token is left in place; call `clear_token` to drop it.
    pub async fn revoke_token(&self, created_before: Option<DateTime<Utc>>) -> Result<bool> {
        let payload = payload_of(&RevokeTokenRequest {
            revoke_date: created_before,
        })?;
        let envelope = self.dispatcher.dispatch(REVOKE_TOKEN_PATH, payload).await?;
        Ok(envelope.is_success() && envelope.value != Value::Bool(false))
    }

    /// Profile of the logged-in user.
    pub async fn user(&self) -> Result<Value> {
        Ok(self
            .dispatcher
            .dispatch(USER_PATH, Payload::new())
            .await?
            .ensure_status(DomainFailure::Unauthorized)?
            .into_value())
    }
}
