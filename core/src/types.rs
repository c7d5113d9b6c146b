//! Request and response DTOs for the session operations.
//!
//! Field names follow the service's PascalCase wire names. Optional fields
//! are omitted from the payload when unset rather than sent as `null`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AuthenticateRequest<'a> {
    pub login_name: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct GisTokenRequest<'a> {
    pub login_name: &'a str,
    pub gis_token: &'a str,
    pub gis_token_url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ValidateTokenRequest<'a> {
    pub token: &'a str,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RevokeTokenRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revoke_date: Option<DateTime<Utc>>,
}

/// `Value` of a successful authentication.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AuthenticationResult {
    pub token: String,
}
