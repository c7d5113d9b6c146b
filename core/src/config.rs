//! Construction options and the service endpoint.

use serde::Deserialize;
use serde_json::Value;

/// Fixed segment between the install path and the logical operation path.
pub const SERVICES_SEGMENT: &str = "services";

fn default_path() -> String {
    "cityworks".to_string()
}

fn default_secure() -> bool {
    true
}

/// Options recognized at client construction.
///
/// Unrecognized keys are ignored when deserializing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientOptions {
    /// Install path of the Cityworks web application.
    #[serde(default = "default_path")]
    pub path: String,
    /// Use `https`. Only test servers should turn this off.
    #[serde(default = "default_secure")]
    pub secure: bool,
    /// Token lifetime hint in minutes. Informational; the service decides.
    #[serde(default)]
    pub expires: Option<u64>,
    #[serde(default)]
    pub default_domain: Option<String>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            path: default_path(),
            secure: default_secure(),
            expires: None,
            default_domain: None,
        }
    }
}

impl ClientOptions {
    /// Read options from a loosely typed record such as a parsed settings file.
    pub fn from_json(value: Value) -> Result<Self, serde_json::Error> {
        match value {
            Value::Null => Ok(Self::default()),
            other => serde_json::from_value(other),
        }
    }
}

/// Where requests go. Immutable for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub install_path: String,
    pub secure: bool,
    pub expires: Option<u64>,
    pub default_domain: Option<String>,
}

impl Endpoint {
    pub fn new(host: &str, options: ClientOptions) -> Self {
        Self {
            host: host.trim().trim_end_matches('/').to_string(),
            install_path: options.path.trim_matches('/').to_string(),
            secure: options.secure,
            expires: options.expires,
            default_domain: options.default_domain,
        }
    }

    pub fn scheme(&self) -> &'static str {
        if self.secure {
            "https"
        } else {
            "http"
        }
    }

    /// Full URL for a logical operation path such as `General/Authentication/User`.
    pub fn service_url(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        if self.install_path.is_empty() {
            format!("{}://{}/{SERVICES_SEGMENT}/{path}", self.scheme(), self.host)
        } else {
            format!(
                "{}://{}/{}/{SERVICES_SEGMENT}/{path}",
                self.scheme(),
                self.host,
                self.install_path
            )
        }
    }
}
