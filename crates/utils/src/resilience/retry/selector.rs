//! Picks the retry policy for a failed request.

use super::backoff::BackoffKind;
use super::policy::{BeforeRetry, RetryPolicy};
use ledgerline_core::{classify, Endpoint, Error, ErrorCategory, SharedClock};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Named policy families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrategyKind {
    Critical,
    Network,
    RateLimited,
    ServerError,
    Timeout,
    Unauthorized,
    NoRetry,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Critical => "CRITICAL",
            StrategyKind::Network => "NETWORK_ERROR",
            StrategyKind::RateLimited => "RATE_LIMITED",
            StrategyKind::ServerError => "SERVER_ERROR",
            StrategyKind::Timeout => "TIMEOUT",
            StrategyKind::Unauthorized => "UNAUTHORIZED",
            StrategyKind::NoRetry => "NO_RETRY",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn is_transient(error: &Error) -> bool {
    error.is_timeout() || classify(error).is_retryable()
}

fn is_unauthorized(error: &Error) -> bool {
    classify(error) == ErrorCategory::Unauthorized
}

/// Everything except client errors the server would reject again
fn is_not_client_rejection(error: &Error) -> bool {
    !matches!(error.status_code(), Some(status) if (400..500).contains(&status) && status != 429)
}

/// Holds one long-lived policy per [`StrategyKind`]
#[derive(Debug, Clone)]
pub struct RetryStrategySelector {
    critical: Arc<RetryPolicy>,
    network: Arc<RetryPolicy>,
    rate_limited: Arc<RetryPolicy>,
    server_error: Arc<RetryPolicy>,
    timeout: Arc<RetryPolicy>,
    unauthorized: Arc<RetryPolicy>,
    no_retry: Arc<RetryPolicy>,
}

impl Default for RetryStrategySelector {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryStrategySelector {
    /// Selector without a credential refresh hook; 401s are not retried
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Selector whose `Unauthorized` policy runs `hook` before its single retry
    pub fn with_token_refresh(hook: Arc<dyn BeforeRetry>) -> Self {
        Self::build(Some(hook))
    }

    /// Measure `Retry-After` dates against `clock` in every policy
    #[must_use]
    pub fn with_clock(self, clock: SharedClock) -> Self {
        let timed = |policy: Arc<RetryPolicy>| Arc::new((*policy).clone().clock(clock.clone()));
        Self {
            critical: timed(self.critical),
            network: timed(self.network),
            rate_limited: timed(self.rate_limited),
            server_error: timed(self.server_error),
            timeout: timed(self.timeout),
            unauthorized: timed(self.unauthorized),
            no_retry: timed(self.no_retry),
        }
    }

    fn build(refresh: Option<Arc<dyn BeforeRetry>>) -> Self {
        let critical = RetryPolicy::new(StrategyKind::Critical.as_str())
            .max_retries(5)
            .backoff(BackoffKind::Fibonacci, Duration::from_secs(1), Duration::from_secs(30))
            .jitter(true)
            .retry_on(is_not_client_rejection);

        let network = RetryPolicy::new(StrategyKind::Network.as_str())
            .max_retries(3)
            .backoff(BackoffKind::Exponential, Duration::from_secs(1), Duration::from_secs(10))
            .jitter(true)
            .retry_on(is_transient);

        let rate_limited = RetryPolicy::new(StrategyKind::RateLimited.as_str())
            .max_retries(5)
            .backoff(BackoffKind::Exponential, Duration::from_secs(60), Duration::from_secs(300))
            .honor_retry_after(true)
            .retry_on(is_transient);

        let server_error = RetryPolicy::new(StrategyKind::ServerError.as_str())
            .max_retries(2)
            .backoff(BackoffKind::Exponential, Duration::from_secs(2), Duration::from_secs(10))
            .retry_on(is_transient);

        let timeout = RetryPolicy::new(StrategyKind::Timeout.as_str())
            .max_retries(2)
            .backoff(BackoffKind::Linear, Duration::from_millis(500), Duration::from_secs(2))
            .retry_on(is_transient);

        let unauthorized = match refresh {
            Some(hook) => RetryPolicy::new(StrategyKind::Unauthorized.as_str())
                .max_retries(1)
                .backoff(BackoffKind::Linear, Duration::ZERO, Duration::ZERO)
                .retry_on(is_unauthorized)
                .before_retry(hook),
            None => RetryPolicy::new(StrategyKind::Unauthorized.as_str()),
        };

        Self {
            critical: Arc::new(critical),
            network: Arc::new(network),
            rate_limited: Arc::new(rate_limited),
            server_error: Arc::new(server_error),
            timeout: Arc::new(timeout),
            unauthorized: Arc::new(unauthorized),
            no_retry: Arc::new(RetryPolicy::new(StrategyKind::NoRetry.as_str())),
        }
    }

    /// Which family applies to `error` raised by a call to `endpoint`
    pub fn kind_for(&self, error: &Error, endpoint: &Endpoint) -> StrategyKind {
        if endpoint.is_payment_submission() {
            return StrategyKind::NoRetry;
        }
        if endpoint.is_payment() {
            return StrategyKind::Critical;
        }
        if error.is_timeout() {
            return StrategyKind::Timeout;
        }

        match classify(error) {
            ErrorCategory::NetworkError => StrategyKind::Network,
            ErrorCategory::RateLimited => StrategyKind::RateLimited,
            ErrorCategory::ServerError => StrategyKind::ServerError,
            ErrorCategory::Unauthorized => StrategyKind::Unauthorized,
            ErrorCategory::Forbidden
            | ErrorCategory::NotFound
            | ErrorCategory::ValidationError
            | ErrorCategory::ClientError
            | ErrorCategory::Unknown => StrategyKind::NoRetry,
        }
    }

    /// Policy for `error` raised by a call to `endpoint`
    pub fn select(&self, error: &Error, endpoint: &Endpoint) -> Arc<RetryPolicy> {
        let kind = self.kind_for(error, endpoint);
        tracing::debug!(endpoint = %endpoint, strategy = %kind, "selected retry strategy");
        self.policy(kind)
    }

    /// The shared policy instance for `kind`
    pub fn policy(&self, kind: StrategyKind) -> Arc<RetryPolicy> {
        let policy = match kind {
            StrategyKind::Critical => &self.critical,
            StrategyKind::Network => &self.network,
            StrategyKind::RateLimited => &self.rate_limited,
            StrategyKind::ServerError => &self.server_error,
            StrategyKind::Timeout => &self.timeout,
            StrategyKind::Unauthorized => &self.unauthorized,
            StrategyKind::NoRetry => &self.no_retry,
        };
        Arc::clone(policy)
    }
}
