//! Scripted transport for unit tests.
//!
//! Replies are queued up front and handed out in order; every executed
//! request is recorded so tests can inspect what went on the wire.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::TransportFailure;
use crate::http::{HttpRequest, HttpResponse, DATA_FIELD, TOKEN_FIELD};
use crate::transport::Transport;

#[derive(Default)]
pub(crate) struct ScriptedTransport {
    replies: Mutex<VecDeque<Result<HttpResponse, TransportFailure>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn reply(&self, envelope: Value) {
        self.reply_raw(&envelope.to_string());
    }

    pub(crate) fn reply_raw(&self, body: &str) {
        self.replies.lock().unwrap().push_back(Ok(HttpResponse {
            status: 200,
            body: body.to_string(),
        }));
    }

    pub(crate) fn fail(&self, failure: TransportFailure) {
        self.replies.lock().unwrap().push_back(Err(failure));
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Path segment after `/services/` for each recorded request.
    pub(crate) fn paths(&self) -> Vec<String> {
        self.requests()
            .iter()
            .map(|r| r.url.split("/services/").nth(1).unwrap_or_default().to_string())
            .collect()
    }

    /// Decoded `data` field of the n-th request.
    pub(crate) fn data(&self, index: usize) -> Value {
        let requests = self.requests();
        let raw = requests[index].body.field(DATA_FIELD).unwrap();
        serde_json::from_str(raw).unwrap()
    }

    pub(crate) fn token(&self, index: usize) -> Option<String> {
        self.requests()[index].body.field(TOKEN_FIELD).map(str::to_string)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportFailure> {
        self.requests.lock().unwrap().push(request);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportFailure::Network("no scripted reply".to_string())))
    }
}
