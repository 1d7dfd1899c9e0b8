//! Retry policies and their execution loop.

use super::backoff::BackoffKind;
use super::retry_after::parse_retry_after;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use ledgerline_core::{system_clock, Error, Result, SharedClock};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

/// Hook run after the backoff delay and before the next attempt.
///
/// Used for credential refresh ahead of retrying a 401. An error from the
/// hook ends the retry loop and is returned to the caller.
#[async_trait]
pub trait BeforeRetry: Send + Sync {
    async fn before_retry(&self, attempt: u32, error: &Error) -> Result<()>;
}

type RetryPredicate = Arc<dyn Fn(&Error) -> bool + Send + Sync>;

/// Immutable retry configuration. One instance is shared by every call that
/// selects it; execution keeps no state between calls.
#[derive(Clone)]
pub struct RetryPolicy {
    name: String,
    max_retries: u32,
    backoff: BackoffKind,
    base_delay: Duration,
    max_delay: Duration,
    jitter: bool,
    honor_retry_after: bool,
    retry_on: RetryPredicate,
    before_retry: Option<Arc<dyn BeforeRetry>>,
    clock: SharedClock,
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("name", &self.name)
            .field("max_retries", &self.max_retries)
            .field("backoff", &self.backoff)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("jitter", &self.jitter)
            .field("honor_retry_after", &self.honor_retry_after)
            .field("before_retry", &self.before_retry.is_some())
            .finish()
    }
}

impl RetryPolicy {
    /// A policy that never retries. Chain the builder methods to change that.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            max_retries: 0,
            backoff: BackoffKind::Exponential,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            jitter: false,
            honor_retry_after: false,
            retry_on: Arc::new(|_| true),
            before_retry: None,
            clock: system_clock(),
        }
    }

    #[must_use]
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn backoff(mut self, kind: BackoffKind, base: Duration, max: Duration) -> Self {
        self.backoff = kind;
        self.base_delay = base;
        self.max_delay = max;
        self
    }

    #[must_use]
    pub fn jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    #[must_use]
    pub fn honor_retry_after(mut self, honor: bool) -> Self {
        self.honor_retry_after = honor;
        self
    }

    #[must_use]
    pub fn retry_on(mut self, predicate: impl Fn(&Error) -> bool + Send + Sync + 'static) -> Self {
        self.retry_on = Arc::new(predicate);
        self
    }

    /// Clock that HTTP-date `Retry-After` values are measured against
    #[must_use]
    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn before_retry(mut self, hook: Arc<dyn BeforeRetry>) -> Self {
        self.before_retry = Some(hook);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_retry_count(&self) -> u32 {
        self.max_retries
    }

    pub fn backoff_kind(&self) -> BackoffKind {
        self.backoff
    }

    /// Whether retry number `attempt` (1-based) may follow `error`
    pub fn should_retry(&self, attempt: u32, error: &Error) -> bool {
        attempt <= self.max_retries && (self.retry_on)(error)
    }

    /// Delay before retry number `attempt`.
    ///
    /// A server-supplied `Retry-After` wins when the policy honors it; it is
    /// capped at `max_delay` but never jittered.
    pub fn calculate_delay(&self, attempt: u32, error: &Error) -> Duration {
        if self.honor_retry_after {
            let now = Utc.timestamp_millis_opt(self.clock.now_ms()).single();
            if let Some(delay) = error
                .retry_after()
                .zip(now)
                .and_then(|(value, now)| parse_retry_after(value, now))
            {
                return delay.min(self.max_delay);
            }
        }

        let delay = self.backoff.delay(self.base_delay, attempt);
        let delay = if self.jitter {
            delay.mul_f64(1.0 + rand::random::<f64>() * 0.2)
        } else {
            delay
        };
        delay.min(self.max_delay)
    }

    /// Run `operation`, retrying failures this policy accepts
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        match operation().await {
            Ok(value) => Ok(value),
            Err(error) => self.resume(error, operation).await,
        }
    }

    /// Continue after a first attempt that already failed with `first_error`
    pub async fn resume<F, Fut, T>(&self, first_error: Error, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut error = first_error;
        let mut attempt = 1;

        loop {
            if !self.should_retry(attempt, &error) {
                if attempt > 1 {
                    tracing::warn!(
                        policy = %self.name,
                        retries = attempt - 1,
                        error = %error,
                        "retries exhausted"
                    );
                }
                return Err(error);
            }

            let delay = self.calculate_delay(attempt, &error);
            tracing::warn!(
                policy = %self.name,
                attempt,
                max_retries = self.max_retries,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "request failed, retrying"
            );
            sleep(delay).await;

            if let Some(hook) = &self.before_retry {
                if let Err(hook_error) = hook.before_retry(attempt, &error).await {
                    tracing::warn!(
                        policy = %self.name,
                        error = %hook_error,
                        "before-retry hook failed"
                    );
                    return Err(hook_error);
                }
            }

            match operation().await {
                Ok(value) => {
                    tracing::info!(
                        policy = %self.name,
                        retries = attempt,
                        "request succeeded after retry"
                    );
                    return Ok(value);
                }
                Err(next) => {
                    error = next;
                    attempt += 1;
                }
            }
        }
    }
}
