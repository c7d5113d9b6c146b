//! Request dispatcher: build, send once, classify.
//!
//! # Design
//! Building (`build_request`) and classification (`classify`) are pure and
//! never touch the network, in the same build/parse split the rest of the
//! crate uses. `dispatch` glues them to a `Transport` for the common async
//! path.
//!
//! Classification only decides whether a usable envelope arrived. It never
//! interprets `Status`, because endpoints disagree on what non-zero means.
//! Call sites that know their endpoint remap through `Envelope::ensure_status`.

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{debug, warn, Instrument};
use uuid::Uuid;

use crate::error::{CallerError, ClientError, DomainFailure, FailureContext, Result, TransportFailure};
use crate::http::{Attachment, HttpRequest, HttpResponse, RequestBody, DATA_FIELD, TOKEN_FIELD};
use crate::payload::Payload;
use crate::session::Session;
use crate::transport::Transport;

pub const AUTHENTICATE_PATH: &str = "General/Authentication/Authenticate";
pub const GIS_TOKEN_PATH: &str = "General/Authentication/AuthenticateGisToken";

/// Entry points that must never carry a token.
pub const AUTHENTICATION_PATHS: [&str; 2] = [AUTHENTICATE_PATH, GIS_TOKEN_PATH];

/// The only operations that accept a binary `file` field.
pub const UPLOAD_PATHS: [&str; 2] = ["Ams/Attachments/AddWorkOrderAttachment", "Pll/CaseRelDocs/Add"];

/// Fragment of the gateway page served when a request is bounced to login.
pub const LOGIN_PAGE_MARKER: &str = "<h2>Object moved to";

/// Result of one dispatch.
pub type WireOutcome = Result<Envelope>;

fn normalize_path(path: &str) -> &str {
    path.trim_matches('/')
}

fn path_in(paths: &[&str], path: &str) -> bool {
    let path = normalize_path(path);
    paths.iter().any(|known| known.eq_ignore_ascii_case(path))
}

/// Case-insensitive, like the service's own routing.
pub fn is_authentication_path(path: &str) -> bool {
    path_in(&AUTHENTICATION_PATHS, path)
}

pub fn is_upload_path(path: &str) -> bool {
    path_in(&UPLOAD_PATHS, path)
}

/// Encode a wire request against `session`. Reads the token; writes nothing.
///
/// Hosts that execute requests with their own HTTP stack call this directly
/// and hand the response to `Dispatcher::classify`.
pub fn build_request(session: &Session, request: &WireRequest) -> Result<HttpRequest> {
    if request.attachment.is_some() && !is_upload_path(&request.path) {
        return Err(CallerError::AttachmentNotAccepted {
            path: request.path.clone(),
        }
        .into());
    }

    let mut fields = vec![(DATA_FIELD.to_string(), request.payload.to_json())];
    if request.include_token && !is_authentication_path(&request.path) {
        if let Some(token) = session.token() {
            fields.push((TOKEN_FIELD.to_string(), token));
        }
    }

    let body = match &request.attachment {
        Some(file) => RequestBody::Multipart {
            fields,
            file: file.clone(),
        },
        None => RequestBody::Form(fields),
    };

    Ok(HttpRequest {
        url: session.endpoint().service_url(&request.path),
        body,
    })
}

/// One outbound call, before encoding.
#[derive(Debug, Clone)]
pub struct WireRequest {
    pub path: String,
    pub payload: Payload,
    pub attachment: Option<Attachment>,
    pub include_token: bool,
}

impl WireRequest {
    pub fn new(path: &str, payload: Payload) -> Self {
        let path = normalize_path(path).to_string();
        let include_token = !is_authentication_path(&path);
        Self {
            path,
            payload,
            attachment: None,
            include_token,
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }

    fn context(&self) -> FailureContext {
        FailureContext::new(&self.path, &self.payload)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawEnvelope {
    #[serde(default)]
    status: i64,
    #[serde(default)]
    message: Option<String>,
    // `Value: null` is a present value; only a missing key is empty.
    #[serde(default, deserialize_with = "present")]
    value: Option<Value>,
}

fn present<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

/// A well-formed service response: `{Status, Message?, Value}`.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub status: i64,
    pub message: Option<String>,
    pub value: Value,
    context: FailureContext,
}

impl Envelope {
    pub fn path(&self) -> &str {
        &self.context.path
    }

    /// `Status == 0`. What a non-zero status means is endpoint-specific.
    pub fn is_success(&self) -> bool {
        self.status == 0
    }

    /// Remap a non-zero status to a domain failure of the given kind.
    pub fn ensure_status(self, kind: DomainFailure) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }
        Err(ClientError::Domain {
            kind,
            status: self.status,
            message: self.message,
            context: Box::new(self.context),
        })
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    /// Deserialize `Value` into a typed result.
    pub fn decode<T: DeserializeOwned>(self) -> Result<T> {
        serde_json::from_value(self.value).map_err(|e| {
            ClientError::transport(TransportFailure::MalformedPayload(e.to_string()), self.context)
        })
    }
}

/// Builds, sends and classifies wire requests for one session.
#[derive(Clone)]
pub struct Dispatcher {
    session: Session,
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher").field("session", &self.session).finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub fn new(session: Session, transport: Arc<dyn Transport>) -> Self {
        Self { session, transport }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn build_request(&self, request: &WireRequest) -> Result<HttpRequest> {
        build_request(&self.session, request)
    }

    /// Turn a raw response into an envelope or a transport failure.
    pub fn classify(request: &WireRequest, response: HttpResponse) -> WireOutcome {
        let context = request.context();

        if response.body.contains(LOGIN_PAGE_MARKER) {
            return Err(ClientError::transport(
                TransportFailure::NonJsonResponse,
                context.with_response(response.status, &response.body),
            ));
        }

        let parsed = serde_json::from_str::<Value>(&response.body)
            .map_err(|e| e.to_string())
            .and_then(|value| {
                if value.is_object() {
                    serde_json::from_value::<RawEnvelope>(value).map_err(|e| e.to_string())
                } else {
                    Err("expected a JSON object".to_string())
                }
            });
        let raw = match parsed {
            Ok(raw) => raw,
            Err(reason) => {
                return Err(ClientError::transport(
                    TransportFailure::MalformedPayload(reason),
                    context.with_response(response.status, &response.body),
                ));
            }
        };

        let Some(value) = raw.value else {
            return Err(ClientError::transport(
                TransportFailure::EmptyResponse,
                context.with_response(response.status, &response.body),
            ));
        };

        let mut context = context;
        context.status = Some(response.status);
        Ok(Envelope {
            status: raw.status,
            message: raw.message,
            value,
            context,
        })
    }

    /// Build, send once and classify.
    pub async fn send(&self, request: WireRequest) -> WireOutcome {
        let span = tracing::debug_span!(
            "dispatch",
            request_id = %Uuid::new_v4(),
            path = %request.path
        );
        async move {
            let http = self.build_request(&request)?;
            debug!(with_file = http.body.file().is_some(), "sending request");

            let response = match self.transport.execute(http).await {
                Ok(response) => response,
                Err(kind) => {
                    warn!(error = %kind, "request failed before a response arrived");
                    return Err(ClientError::transport(kind, request.context()));
                }
            };

            let status = response.status;
            match Self::classify(&request, response) {
                Ok(envelope) => {
                    debug!(http_status = status, service_status = envelope.status, "response classified");
                    Ok(envelope)
                }
                Err(err) => {
                    warn!(http_status = status, error = %err, "unusable response");
                    Err(err)
                }
            }
        }
        .instrument(span)
        .await
    }

    pub async fn dispatch(&self, path: &str, payload: Payload) -> WireOutcome {
        self.send(WireRequest::new(path, payload)).await
    }

    pub async fn dispatch_with_attachment(
        &self,
        path: &str,
        payload: Payload,
        attachment: Attachment,
    ) -> WireOutcome {
        self.send(WireRequest::new(path, payload).with_attachment(attachment)).await
    }
}
