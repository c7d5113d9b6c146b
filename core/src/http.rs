//! HTTP transport types for the host-does-IO pattern.
//!
//! # Design
//! These types describe one Cityworks round-trip as plain data. The
//! dispatcher builds an `HttpRequest`, a `Transport` (or any host HTTP stack)
//! executes it, and the resulting `HttpResponse` goes back to the dispatcher
//! for classification. The service only ever takes `POST` with a form body,
//! so there is no method field.
//!
//! `Debug` output masks the `token` form field and sensitive keys inside
//! `data`, so hosts can log requests as they are.

use std::fmt;

use crate::payload::redact_json_text;

/// Name of the form field carrying the JSON payload.
pub const DATA_FIELD: &str = "data";
/// Name of the form field carrying the session token.
pub const TOKEN_FIELD: &str = "token";
/// Name of the multipart field carrying an uploaded file.
pub const FILE_FIELD: &str = "file";

/// A binary file sent with one of the upload operations.
#[derive(Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl Attachment {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: None,
            bytes: bytes.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

impl fmt::Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attachment")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Body of a request: a URL-encoded form, or multipart when a file rides along.
#[derive(Clone, PartialEq)]
pub enum RequestBody {
    Form(Vec<(String, String)>),
    Multipart {
        fields: Vec<(String, String)>,
        file: Attachment,
    },
}

impl RequestBody {
    pub fn fields(&self) -> &[(String, String)] {
        match self {
            RequestBody::Form(fields) | RequestBody::Multipart { fields, .. } => fields,
        }
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields()
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn file(&self) -> Option<&Attachment> {
        match self {
            RequestBody::Form(_) => None,
            RequestBody::Multipart { file, .. } => Some(file),
        }
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let masked: Vec<(&str, String)> = self
            .fields()
            .iter()
            .map(|(key, value)| match key.as_str() {
                TOKEN_FIELD => (key.as_str(), "[REDACTED]".to_string()),
                DATA_FIELD => (key.as_str(), redact_json_text(value)),
                _ => (key.as_str(), value.clone()),
            })
            .collect();
        match self {
            RequestBody::Form(_) => f.debug_tuple("Form").field(&masked).finish(),
            RequestBody::Multipart { file, .. } => f
                .debug_struct("Multipart")
                .field("fields", &masked)
                .field("file", file)
                .finish(),
        }
    }
}

/// A Cityworks request described as plain data. Always sent as `POST`.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub url: String,
    pub body: RequestBody,
}

impl HttpRequest {
    /// `application/x-www-form-urlencoded` rendering of a form body.
    ///
    /// Returns `None` for multipart bodies, which the host must encode itself.
    pub fn encoded_form(&self) -> Option<String> {
        match &self.body {
            RequestBody::Form(fields) => serde_urlencoded::to_string(fields).ok(),
            RequestBody::Multipart { .. } => None,
        }
    }
}

/// An HTTP response described as plain data.
///
/// Constructed by the transport after executing an `HttpRequest`, then
/// passed to `Dispatcher::classify`.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}
