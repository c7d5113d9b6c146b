//! Executes `HttpRequest` values against the network.
//!
//! The dispatcher only depends on the `Transport` trait, so tests and hosts
//! with their own HTTP stack can swap the implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};

use crate::error::TransportFailure;
use crate::http::{HttpRequest, HttpResponse, RequestBody, FILE_FIELD};

/// Upper bound on a single call. Requests are never retried.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Sends one request and returns the raw response.
///
/// Non-2xx statuses are data, not errors: classification happens on the body.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportFailure>;
}

/// `reqwest`-backed transport with rustls.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_timeout(REQUEST_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn network(err: reqwest::Error) -> TransportFailure {
    TransportFailure::Network(err.to_string())
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportFailure> {
        let builder = self.client.post(&request.url);
        let builder = match request.body {
            RequestBody::Form(fields) => builder.form(&fields),
            RequestBody::Multipart { fields, file } => {
                let mut part = Part::bytes(file.bytes).file_name(file.file_name);
                if let Some(content_type) = file.content_type.as_deref() {
                    part = part.mime_str(content_type).map_err(network)?;
                }
                let form = fields
                    .into_iter()
                    .fold(Form::new(), |form, (key, value)| form.text(key, value))
                    .part(FILE_FIELD, part);
                builder.multipart(form)
            }
        };

        let response = builder.send().await.map_err(network)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(network)?;
        Ok(HttpResponse { status, body })
    }
}
