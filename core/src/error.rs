//! Error types for the Cityworks client core.
//!
//! # Design
//! Failures fall into three classes. `Transport` covers everything that kept
//! a well-formed envelope from reaching us (gateway HTML, bad JSON, an empty
//! envelope, network errors). `Domain` is a failure the service reported
//! inside an otherwise valid envelope; only call sites that know how their
//! endpoint encodes failure produce it. `Caller` errors are detected before
//! any request is built and always prevent the wire call.
//!
//! Every wire failure carries a `FailureContext`. Sensitive payload keys are
//! redacted before they land there.

use std::fmt;

use serde_json::Value;
use thiserror::Error;

use crate::payload::Payload;

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors returned by the dispatcher, the session operations and the resolver.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport error on {}: {kind}", .context.path)]
    Transport {
        kind: TransportFailure,
        context: Box<FailureContext>,
    },

    #[error("{kind} on {} (status {status}){}", .context.path, fmt_message(.message))]
    Domain {
        kind: DomainFailure,
        status: i64,
        message: Option<String>,
        context: Box<FailureContext>,
    },

    #[error(transparent)]
    Caller(#[from] CallerError),

    /// The HTTP stack could not be constructed.
    #[error("client setup failed: {0}")]
    Setup(String),
}

impl ClientError {
    pub(crate) fn transport(kind: TransportFailure, context: FailureContext) -> Self {
        ClientError::Transport {
            kind,
            context: Box::new(context),
        }
    }

    /// The failure context of a wire error, if this is one.
    pub fn context(&self) -> Option<&FailureContext> {
        match self {
            ClientError::Transport { context, .. } | ClientError::Domain { context, .. } => {
                Some(context)
            }
            ClientError::Caller(_) | ClientError::Setup(_) => None,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Transport { .. })
    }

    pub fn is_domain(&self) -> bool {
        matches!(self, ClientError::Domain { .. })
    }

    pub fn is_caller(&self) -> bool {
        matches!(self, ClientError::Caller(_))
    }
}

fn fmt_message(message: &Option<String>) -> String {
    match message {
        Some(m) if !m.is_empty() => format!(": {m}"),
        _ => String::new(),
    }
}

/// Why a response never became a usable envelope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportFailure {
    /// The gateway answered with its HTML login/redirect page.
    #[error("non-JSON response")]
    NonJsonResponse,

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// The envelope parsed but carried no `Value`.
    #[error("empty response")]
    EmptyResponse,

    #[error("network failure: {0}")]
    Network(String),
}

/// Service-reported failure classes. Which one applies is decided per call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainFailure {
    InvalidCredentials,
    Unauthorized,
    Rejected,
}

impl fmt::Display for DomainFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainFailure::InvalidCredentials => write!(f, "invalid credentials"),
            DomainFailure::Unauthorized => write!(f, "unauthorized"),
            DomainFailure::Rejected => write!(f, "request rejected"),
        }
    }
}

/// Invalid arguments caught before a request is built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallerError {
    #[error("unknown {vocabulary} name `{value}`; expected one of: {}", .options.join(", "))]
    UnknownName {
        vocabulary: String,
        value: String,
        options: Vec<String>,
    },

    #[error("unknown {vocabulary} code `{value}`; expected one of: {}", .options.join(", "))]
    UnknownCode {
        vocabulary: String,
        value: String,
        options: Vec<String>,
    },

    /// No detail record matches the reference.
    #[error("no detail matches reference `{0}`")]
    NotFound(String),

    #[error("detail `{reference}` has no type flag set")]
    UntypedDetail { reference: String },

    #[error("detail `{reference}` has several type flags set: {}", .flags.join(", "))]
    AmbiguousDetailType {
        reference: String,
        flags: Vec<&'static str>,
    },

    #[error("`{path}` does not accept file attachments")]
    AttachmentNotAccepted { path: String },

    #[error("invalid detail reference `{0}`")]
    InvalidReference(String),

    /// The request fields did not serialize to a JSON object.
    #[error("request payload must be a JSON object")]
    InvalidPayload,

    #[error("token must not be empty")]
    BlankToken,
}

/// Diagnostic context attached to every wire failure.
#[derive(Debug, Clone, PartialEq)]
pub struct FailureContext {
    /// Logical service path that was attempted.
    pub path: String,
    /// Posted payload with sensitive values redacted.
    pub payload: Value,
    /// HTTP status of the response, when one arrived.
    pub status: Option<u16>,
    /// Raw response body, when it could not be understood.
    pub raw_response: Option<String>,
}

impl FailureContext {
    pub(crate) fn new(path: &str, payload: &Payload) -> Self {
        Self {
            path: path.to_string(),
            payload: payload.redacted(),
            status: None,
            raw_response: None,
        }
    }

    pub(crate) fn with_response(mut self, status: u16, body: &str) -> Self {
        self.status = Some(status);
        self.raw_response = Some(body.to_string());
        self
    }
}
