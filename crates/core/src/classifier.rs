//! Error classification
//!
//! [`classify`] is the only place a failure is turned into an
//! [`ErrorCategory`]. The retry selector, the request orchestrator and the
//! error tracker all call it, so they can never disagree about what kind of
//! failure they are looking at.

use crate::errors::Error;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The fixed set of failure categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    NetworkError,
    Unauthorized,
    Forbidden,
    NotFound,
    ValidationError,
    RateLimited,
    ServerError,
    ClientError,
    Unknown,
}

impl ErrorCategory {
    pub const ALL: [ErrorCategory; 9] = [
        ErrorCategory::NetworkError,
        ErrorCategory::Unauthorized,
        ErrorCategory::Forbidden,
        ErrorCategory::NotFound,
        ErrorCategory::ValidationError,
        ErrorCategory::RateLimited,
        ErrorCategory::ServerError,
        ErrorCategory::ClientError,
        ErrorCategory::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::NetworkError => "NETWORK_ERROR",
            ErrorCategory::Unauthorized => "UNAUTHORIZED",
            ErrorCategory::Forbidden => "FORBIDDEN",
            ErrorCategory::NotFound => "NOT_FOUND",
            ErrorCategory::ValidationError => "VALIDATION_ERROR",
            ErrorCategory::RateLimited => "RATE_LIMITED",
            ErrorCategory::ServerError => "SERVER_ERROR",
            ErrorCategory::ClientError => "CLIENT_ERROR",
            ErrorCategory::Unknown => "UNKNOWN",
        }
    }

    /// Transient categories that the retry layer may retry locally
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCategory::NetworkError | ErrorCategory::RateLimited | ErrorCategory::ServerError
        )
    }

    /// 4xx categories the server will reject identically on a retry
    pub fn is_client_fault(&self) -> bool {
        matches!(
            self,
            ErrorCategory::Forbidden
                | ErrorCategory::NotFound
                | ErrorCategory::ValidationError
                | ErrorCategory::ClientError
        )
    }

    /// Short title for a user-facing notice
    pub fn title(&self) -> &'static str {
        match self {
            ErrorCategory::NetworkError => "Connection problem",
            ErrorCategory::Unauthorized => "Session expired",
            ErrorCategory::Forbidden => "Access denied",
            ErrorCategory::NotFound => "Not found",
            ErrorCategory::ValidationError => "Check your input",
            ErrorCategory::RateLimited => "Too many requests",
            ErrorCategory::ServerError => "Server error",
            ErrorCategory::ClientError => "Request rejected",
            ErrorCategory::Unknown => "Something went wrong",
        }
    }

    /// Message body for a user-facing notice
    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorCategory::NetworkError => {
                "We couldn't reach the server. Check your connection and try again."
            }
            ErrorCategory::Unauthorized => "Please sign in again to continue.",
            ErrorCategory::Forbidden => "You don't have permission to do that.",
            ErrorCategory::NotFound => "The item you're looking for no longer exists.",
            ErrorCategory::ValidationError => "Some fields need your attention.",
            ErrorCategory::RateLimited => "You're going a bit fast. Please wait a moment.",
            ErrorCategory::ServerError => {
                "The server ran into a problem. We'll keep trying in the background."
            }
            ErrorCategory::ClientError => "The request couldn't be processed.",
            ErrorCategory::Unknown => "An unexpected error occurred.",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map an HTTP status code onto a category
pub fn category_for_status(status: u16) -> ErrorCategory {
    match status {
        401 => ErrorCategory::Unauthorized,
        403 => ErrorCategory::Forbidden,
        404 => ErrorCategory::NotFound,
        422 => ErrorCategory::ValidationError,
        429 => ErrorCategory::RateLimited,
        500..=u16::MAX => ErrorCategory::ServerError,
        400..=499 => ErrorCategory::ClientError,
        _ => ErrorCategory::Unknown,
    }
}

/// Classify a failed request. Pure and total.
///
/// Transport-level failures that never produced a response are
/// `NetworkError`; failures with a response map by status code. A rejected
/// credential is `Unauthorized` whether it came back as a raw 401 or as
/// [`Error::Authentication`] after a failed token refresh. Everything else is
/// `Unknown`.
pub fn classify(error: &Error) -> ErrorCategory {
    match error {
        Error::Network { .. } | Error::Timeout { .. } | Error::Offline { .. } => {
            ErrorCategory::NetworkError
        }
        Error::Http { status, .. } => category_for_status(*status),
        Error::Authentication { .. } => ErrorCategory::Unauthorized,
        _ => ErrorCategory::Unknown,
    }
}

/// Helper to suggest recovery actions based on error type
pub fn suggest_recovery(error: &Error) -> String {
    match error {
        Error::Network { .. } | Error::Offline { .. } => {
            "Network error: check the device connection. Cached data is shown where available."
                .to_string()
        }
        Error::Timeout { duration, .. } => format!(
            "The server did not answer within {duration:?}. Try again, or retry on a faster connection."
        ),
        Error::CircuitOpen { retry_in, .. } => format!(
            "This service is failing repeatedly and calls are paused. It will be probed again in {}s.",
            retry_in.as_secs()
        ),
        Error::Authentication { .. } => "Sign in again to refresh your credentials.".to_string(),
        Error::Http { .. } => classify(error).user_message().to_string(),
        Error::Storage { key, .. } => format!(
            "Local storage failed for '{key}'. Free up device space or clear the app cache."
        ),
        Error::FileSystem { .. } => {
            "File system error: check permissions and free space for the app data directory."
                .to_string()
        }
        Error::Json { message, .. } => {
            format!("The server sent data the app could not read: {message}.")
        }
        Error::Configuration { message } => {
            format!(
                "Configuration error: {message}. Check resilience.json and LEDGERLINE_* variables."
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpMethod;
    use proptest::prelude::*;
    use std::time::Duration;

    fn http(status: u16) -> Error {
        Error::http(HttpMethod::Get, "/products", status, "failed")
    }

    #[test]
    fn maps_documented_status_codes() {
        let cases = [
            (400, ErrorCategory::ClientError),
            (401, ErrorCategory::Unauthorized),
            (403, ErrorCategory::Forbidden),
            (404, ErrorCategory::NotFound),
            (409, ErrorCategory::ClientError),
            (422, ErrorCategory::ValidationError),
            (429, ErrorCategory::RateLimited),
            (500, ErrorCategory::ServerError),
            (502, ErrorCategory::ServerError),
            (503, ErrorCategory::ServerError),
        ];
        for (status, expected) in cases {
            assert_eq!(classify(&http(status)), expected, "status {status}");
        }
    }

    #[test]
    fn responseless_failures_are_network_errors() {
        assert_eq!(
            classify(&Error::network("/orders", "connection refused")),
            ErrorCategory::NetworkError
        );
        assert_eq!(
            classify(&Error::timeout("GET /orders", Duration::from_secs(15))),
            ErrorCategory::NetworkError
        );
        assert_eq!(
            classify(&Error::offline("/orders")),
            ErrorCategory::NetworkError
        );
    }

    #[test]
    fn rejected_credentials_are_unauthorized() {
        assert_eq!(
            classify(&Error::authentication("Refresh token blacklisted")),
            ErrorCategory::Unauthorized
        );
        assert_eq!(classify(&http(401)), ErrorCategory::Unauthorized);
    }

    #[test]
    fn everything_else_is_unknown() {
        assert_eq!(
            classify(&Error::configuration("bad")),
            ErrorCategory::Unknown
        );
        assert_eq!(
            classify(&Error::circuit_open("GET:/a", Duration::from_secs(1))),
            ErrorCategory::Unknown
        );
        assert_eq!(classify(&http(302)), ErrorCategory::Unknown);
    }

    #[test]
    fn serializes_as_screaming_snake_case() {
        let json = serde_json::to_string(&ErrorCategory::RateLimited).unwrap();
        assert_eq!(json, "\"RATE_LIMITED\"");
        for category in ErrorCategory::ALL {
            assert_eq!(
                serde_json::to_string(&category).unwrap(),
                format!("\"{}\"", category.as_str())
            );
        }
    }

    #[test]
    fn suggest_recovery_mentions_pause_for_open_circuit() {
        let err = Error::circuit_open("POST:/orders", Duration::from_secs(42));
        assert!(suggest_recovery(&err).contains("42s"));
    }

    proptest! {
        /// Every status code lands in exactly the bucket its range dictates
        #[test]
        fn classify_is_total_over_status_codes(status in 0u16..1000) {
            let category = classify(&http(status));
            let expected = match status {
                401 => ErrorCategory::Unauthorized,
                403 => ErrorCategory::Forbidden,
                404 => ErrorCategory::NotFound,
                422 => ErrorCategory::ValidationError,
                429 => ErrorCategory::RateLimited,
                s if s >= 500 => ErrorCategory::ServerError,
                s if (400..500).contains(&s) => ErrorCategory::ClientError,
                _ => ErrorCategory::Unknown,
            };
            prop_assert_eq!(category, expected);
        }

        /// Messages never influence classification of response-less failures
        #[test]
        fn network_messages_do_not_matter(message in ".{0,64}") {
            prop_assert_eq!(
                classify(&Error::network("/x", message)),
                ErrorCategory::NetworkError
            );
        }
    }
}
