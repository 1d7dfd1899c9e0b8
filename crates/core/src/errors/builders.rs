//! Builder methods for creating errors with context

use super::types::{Error, FieldErrors};
use crate::http::HttpMethod;
use std::path::PathBuf;
use std::time::Duration;

// Helper methods for creating errors with context
impl Error {
    /// Create an HTTP status error without a body
    #[must_use]
    pub fn http(
        method: HttpMethod,
        url: impl Into<String>,
        status: u16,
        message: impl Into<String>,
    ) -> Self {
        Error::Http {
            method,
            url: url.into(),
            status,
            message: message.into(),
            retry_after: None,
            field_errors: FieldErrors::new(),
            body: None,
        }
    }

    /// Attach a `Retry-After` header value to an HTTP error
    #[must_use]
    pub fn with_retry_after(mut self, value: impl Into<String>) -> Self {
        if let Error::Http { retry_after, .. } = &mut self {
            *retry_after = Some(value.into());
        }
        self
    }

    /// Attach per-field validation detail to an HTTP error
    #[must_use]
    pub fn with_field_errors(mut self, errors: FieldErrors) -> Self {
        if let Error::Http { field_errors, .. } = &mut self {
            *field_errors = errors;
        }
        self
    }

    /// Attach the decoded response body to an HTTP error
    #[must_use]
    pub fn with_body(mut self, value: serde_json::Value) -> Self {
        if let Error::Http { body, .. } = &mut self {
            *body = Some(value);
        }
        self
    }

    /// Create a network error
    #[must_use]
    pub fn network(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Network {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Create a timeout error
    #[must_use]
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Error::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create an offline error
    #[must_use]
    pub fn offline(endpoint: impl Into<String>) -> Self {
        Error::Offline {
            endpoint: endpoint.into(),
        }
    }

    /// Create a circuit-open rejection
    #[must_use]
    pub fn circuit_open(endpoint: impl Into<String>, retry_in: Duration) -> Self {
        Error::CircuitOpen {
            endpoint: endpoint.into(),
            retry_in,
        }
    }

    /// Create a terminal authentication error
    #[must_use]
    pub fn authentication(message: impl Into<String>) -> Self {
        Error::Authentication {
            message: message.into(),
        }
    }

    /// Create a storage error
    #[must_use]
    pub fn storage(
        operation: &'static str,
        key: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::Storage {
            operation,
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create a file system error with context
    #[must_use]
    pub fn file_system(
        path: impl Into<PathBuf>,
        operation: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Error::FileSystem {
            path: path.into(),
            operation: operation.into(),
            source,
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }
}
