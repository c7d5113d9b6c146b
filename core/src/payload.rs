//! Ordered request payloads.
//!
//! A `Payload` is the JSON object posted in the `data` form field. Keys keep
//! insertion order (serde_json `preserve_order`), which keeps wire bodies
//! stable for logging and test vectors.

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

/// Keys whose values never leave this crate in diagnostics.
const SENSITIVE_KEYS: &[&str] = &["password", "token", "gistoken"];

const REDACTED: &str = "[REDACTED]";

/// An ordered key/value record serialized as the request's `data` field.
#[derive(Clone, Default, PartialEq)]
pub struct Payload(Map<String, Value>);

impl Payload {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Build a payload from any value that serializes to a JSON object.
    ///
    /// Returns `None` when `value` is not an object (or fails to serialize).
    pub fn from_serialize<T: Serialize>(value: &T) -> Option<Self> {
        serde_json::to_value(value).ok().and_then(Self::from_value)
    }

    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            Value::Null => Some(Self::new()),
            _ => None,
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Merge caller-supplied overrides under the required fields.
    ///
    /// Required fields always win: an override whose key is already present
    /// in `self` is dropped. Remaining overrides are appended in their own
    /// order after the required fields.
    pub fn merge_overrides(mut self, overrides: Payload) -> Self {
        for (key, value) in overrides.0 {
            if !self.0.contains_key(&key) {
                self.0.insert(key, value);
            }
        }
        self
    }

    /// JSON text posted in the `data` form field.
    pub fn to_json(&self) -> String {
        Value::Object(self.0.clone()).to_string()
    }

    /// Copy of the payload with sensitive values masked, for diagnostics.
    pub fn redacted(&self) -> Value {
        redact(Value::Object(self.0.clone()))
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Payload").field(&self.redacted()).finish()
    }
}

/// Mask sensitive values inside an already encoded `data` field.
///
/// Text that is not JSON is masked whole.
pub(crate) fn redact_json_text(text: &str) -> String {
    match serde_json::from_str::<Value>(text) {
        Ok(value) => redact(value).to_string(),
        Err(_) => REDACTED.to_string(),
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let normalized = key.to_ascii_lowercase();
    SENSITIVE_KEYS.contains(&normalized.as_str())
}

fn redact(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| {
                    if is_sensitive_key(&key) {
                        (key, Value::String(REDACTED.to_string()))
                    } else {
                        (key, redact(value))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(redact).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn debug_never_prints_secrets() {
        let payload = Payload::new()
            .with("LoginName", "a")
            .with("Password", "hunter2")
            .with("GisToken", "g-secret");
        let rendered = format!("{payload:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("g-secret"));
        assert!(rendered.contains("LoginName"));
    }

    #[test]
    fn encoded_data_is_redacted() {
        let text = redact_json_text(r#"{"Token":"abc","Nested":{"password":"x"},"Keep":1}"#);
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["Token"], REDACTED);
        assert_eq!(value["Nested"]["password"], REDACTED);
        assert_eq!(value["Keep"], 1);
    }

    #[test]
    fn required_fields_win_over_overrides() {
        let required = Payload::new().with("CaObjectId", 7).with("Status", "OPEN");
        let overrides = Payload::new().with("Status", "CLOSED").with("Comment", "hi");
        let merged = required.merge_overrides(overrides);
        assert_eq!(merged.get("Status"), Some(&json!("OPEN")));
        assert_eq!(merged.get("Comment"), Some(&json!("hi")));
        assert_eq!(merged.keys().collect::<Vec<_>>(), vec!["CaObjectId", "Status", "Comment"]);
    }

    #[test]
    fn insertion_order_is_preserved_on_the_wire() {
        let payload = Payload::new().with("Zeta", 1).with("Alpha", 2);
        assert_eq!(payload.to_json(), r#"{"Zeta":1,"Alpha":2}"#);
    }

    #[test]
    fn redaction_masks_nested_secrets_case_insensitively() {
        let payload = Payload::from_value(json!({
            "LoginName": "alice",
            "Password": "hunter2",
            "Nested": {"token": "T1", "GisToken": "G1", "Keep": 3}
        }))
        .unwrap();
        let redacted = payload.redacted();
        assert_eq!(redacted["LoginName"], "alice");
        assert_eq!(redacted["Password"], REDACTED);
        assert_eq!(redacted["Nested"]["token"], REDACTED);
        assert_eq!(redacted["Nested"]["GisToken"], REDACTED);
        assert_eq!(redacted["Nested"]["Keep"], 3);
    }

    #[test]
    fn non_object_values_are_not_payloads() {
        assert!(Payload::from_value(json!([1, 2])).is_none());
        assert!(Payload::from_value(json!("text")).is_none());
        assert_eq!(Payload::from_value(Value::Null), Some(Payload::new()));
    }
}
