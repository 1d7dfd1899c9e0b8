//! Core error type definitions

use crate::http::HttpMethod;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Result type alias for Ledgerline API operations
pub type Result<T> = std::result::Result<T, Error>;

/// Per-field validation messages returned by the server, keyed by field name
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Core error type for the resilience layer using thiserror
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The server answered with a non-success status code
    #[error("{method} {url} failed with HTTP {status}: {message}")]
    Http {
        method: HttpMethod,
        url: String,
        status: u16,
        message: String,
        /// Raw `Retry-After` header value, if the server sent one
        retry_after: Option<String>,
        /// Structured per-field detail from validation responses
        field_errors: FieldErrors,
        body: Option<serde_json::Value>,
    },

    /// The request never produced a response (DNS, refused, reset, ...)
    #[error("network error for '{endpoint}': {message}")]
    Network { endpoint: String, message: String },

    /// Operation timeout errors
    #[error("operation '{operation}' timed out after {duration:?}")]
    Timeout {
        operation: String,
        duration: Duration,
    },

    /// The device reported no connectivity before dispatch
    #[error("device is offline, cannot reach '{endpoint}'")]
    Offline { endpoint: String },

    /// The endpoint's circuit breaker rejected the call
    #[error("circuit breaker is open for '{endpoint}', next probe in {retry_in:?}")]
    CircuitOpen { endpoint: String, retry_in: Duration },

    /// Credentials were rejected and could not be refreshed
    #[error("authentication failed: {message}")]
    Authentication { message: String },

    /// Persistent key/value storage failures
    #[error("storage {operation} failed for '{key}': {message}")]
    Storage {
        operation: &'static str,
        key: String,
        message: String,
    },

    /// File system operations
    #[error("file system {operation} operation failed for '{path}': {source}")]
    FileSystem {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: serde_json::Error,
    },

    /// Configuration errors
    #[error("configuration error: {message}")]
    Configuration { message: String },
}

impl Error {
    /// HTTP status code, when the failure carried a response
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether a response object exists for this failure
    pub fn has_response(&self) -> bool {
        matches!(self, Error::Http { .. })
    }

    /// Raw `Retry-After` header value sent with the response
    pub fn retry_after(&self) -> Option<&str> {
        match self {
            Error::Http { retry_after, .. } => retry_after.as_deref(),
            _ => None,
        }
    }

    /// Per-field validation detail, empty when the server sent none
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            Error::Http { field_errors, .. } if !field_errors.is_empty() => Some(field_errors),
            _ => None,
        }
    }

    /// Whether this is a request-timeout condition
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    /// Whether the circuit breaker produced this error
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Error::CircuitOpen { .. })
    }
}
