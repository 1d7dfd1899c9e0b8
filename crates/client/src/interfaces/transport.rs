//! The wrapped HTTP capability

use async_trait::async_trait;
use ledgerline_core::{Error, FieldErrors, HttpMethod, Result, RETRY_AFTER_HEADER};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::time::Duration;

/// One outbound HTTP call
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    pub method: HttpMethod,
    pub url: String,
    pub params: Option<Value>,
    pub body: Option<Value>,
    pub headers: BTreeMap<String, String>,
    pub timeout: Duration,
}

/// Whatever the server answered, success or not
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    /// Header names are lower-cased
    pub headers: BTreeMap<String, String>,
    /// Decoded JSON body; non-JSON text becomes a string, empty is `Null`
    pub body: Value,
}

/// Sends requests. Implementations return `Ok` for every response the server
/// produced, whatever its status, and `Err` only for transport failures
/// (`Error::Network`, `Error::Timeout`).
#[async_trait]
pub trait HttpTransport: Send + Sync + Debug {
    async fn send(&self, request: &TransportRequest) -> Result<TransportResponse>;
}

impl TransportResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body,
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turn a non-2xx response into `Error::Http`, keeping `Retry-After`,
    /// per-field validation detail and the body
    pub fn error_for_status(self, method: HttpMethod, url: &str) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }

        let message = error_message(&self.body, self.status);
        let mut error = Error::http(method, url, self.status, message)
            .with_field_errors(field_errors(&self.body));
        if let Some(retry_after) = self.header(RETRY_AFTER_HEADER) {
            error = error.with_retry_after(retry_after);
        }
        if !self.body.is_null() {
            error = error.with_body(self.body);
        }
        Err(error)
    }
}

fn error_message(body: &Value, status: u16) -> String {
    ["detail", "message", "error"]
        .iter()
        .find_map(|field| body.get(field).and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {status}"))
}

/// Validation detail in either `{"errors": {"field": "msg" | ["msg"]}}` or
/// top-level `{"field": ["msg"]}` form
fn field_errors(body: &Value) -> FieldErrors {
    if let Some(nested) = body.get("errors").and_then(Value::as_object) {
        return nested
            .iter()
            .filter_map(|(field, value)| messages(value, true).map(|m| (field.clone(), m)))
            .collect();
    }

    body.as_object()
        .map(|map| {
            map.iter()
                .filter_map(|(field, value)| messages(value, false).map(|m| (field.clone(), m)))
                .collect()
        })
        .unwrap_or_default()
}

fn messages(value: &Value, allow_plain: bool) -> Option<Vec<String>> {
    let found: Vec<String> = match value {
        Value::String(message) if allow_plain => vec![message.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => return None,
    };
    (!found.is_empty()).then_some(found)
}
