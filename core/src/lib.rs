//! Async client core for the Cityworks service API.
//!
//! # Overview
//! Every call to the service funnels through one `Dispatcher`: it encodes a
//! logical path and payload into a form `POST`, attaches the session token,
//! sends exactly once and classifies the response as an envelope or a typed
//! failure. `CityworksClient` layers the token lifecycle on top, and
//! `DetailResolver` writes case details by `GROUP.CODE` reference.
//!
//! # Design
//! - Request building and response classification are pure functions over
//!   plain `HttpRequest` / `HttpResponse` values (host-does-IO). The async
//!   path plugs them into a `Transport`, `reqwest` by default.
//! - `Session` is an injected handle, never global state. Only
//!   authentication operations write it; failed requests never clear it.
//! - What a non-zero `Status` means is decided by each call site.
//! - Closed wire vocabularies live in immutable `EnumRegistry` tables.

pub mod client;
pub mod config;
pub mod detail;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod payload;
pub mod registry;
pub mod session;
pub mod transport;
pub mod types;
pub mod vocab;

#[cfg(test)]
mod testing;

pub use client::CityworksClient;
pub use config::{ClientOptions, Endpoint};
pub use detail::{DetailRecord, DetailReference, DetailResolver, DetailValueKind};
pub use dispatch::{build_request, Dispatcher, Envelope, WireOutcome, WireRequest};
pub use error::{CallerError, ClientError, DomainFailure, FailureContext, Result, TransportFailure};
pub use http::{Attachment, HttpRequest, HttpResponse, RequestBody};
pub use payload::Payload;
pub use registry::{EnumRegistry, RegistryBuilder, RegistryError};
pub use session::{AuthMethod, AuthState, Credentials, FederatedCredential, Session};
pub use transport::{ReqwestTransport, Transport};
