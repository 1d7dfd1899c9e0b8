//! Circuit breaker execution logic.

use super::config::CircuitBreakerConfig;
use super::metrics::MetricsState;
use super::transitions::{Admission, StateTransitions};
use super::types::{CircuitBreakerStats, CircuitState};
use ledgerline_core::{system_clock, Error, Result, SharedClock};
use std::future::Future;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Circuit breaker guarding a single endpoint key
#[derive(Debug)]
pub struct CircuitBreaker {
    key: String,
    metrics: Arc<MetricsState>,
    transitions: StateTransitions,
    clock: SharedClock,
}

impl CircuitBreaker {
    /// Create a new circuit breaker on the system clock
    pub fn new(key: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self::with_clock(key, config, system_clock())
    }

    /// Create a circuit breaker reading time from `clock`
    pub fn with_clock(
        key: impl Into<String>,
        config: CircuitBreakerConfig,
        clock: SharedClock,
    ) -> Self {
        let key = key.into();
        let metrics = Arc::new(MetricsState::new());
        let transitions = StateTransitions::new(key.clone(), config, Arc::clone(&metrics));

        Self {
            key,
            metrics,
            transitions,
            clock,
        }
    }

    /// Endpoint key this breaker guards
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Get the current state of the circuit.
    ///
    /// An open circuit whose timeout has elapsed still reports `Open` here;
    /// it only moves to `HalfOpen` when the next call arrives.
    pub fn state(&self) -> CircuitState {
        self.transitions.state()
    }

    /// Execute an operation through the circuit breaker
    pub async fn execute<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.execute_with_fallback(operation, |rejection| async move { Err(rejection) })
            .await
    }

    /// Execute an operation, answering with `fallback` while the circuit is
    /// open. The fallback receives the `CircuitOpen` error and `operation` is
    /// never invoked in that case.
    pub async fn execute_with_fallback<F, Fut, T, FB, FbFut>(
        &self,
        operation: F,
        fallback: FB,
    ) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
        FB: FnOnce(Error) -> FbFut,
        FbFut: Future<Output = Result<T>>,
    {
        let generation = match self.transitions.admit(self.clock.now_ms()) {
            Admission::Allowed { generation } => generation,
            Admission::Rejected { retry_in } => {
                self.metrics.record_rejection();
                tracing::debug!(
                    endpoint = %self.key,
                    retry_in_ms = retry_in.as_millis() as u64,
                    "circuit open, rejecting call"
                );
                return fallback(Error::circuit_open(self.key.clone(), retry_in)).await;
            }
        };

        self.metrics.record_call();
        let result = operation().await;

        // State may have moved while the call was in flight; the transitions
        // re-check the generation under their lock
        match &result {
            Ok(_) => {
                self.metrics.record_success();
                self.transitions
                    .record_success(generation, self.clock.now_ms());
            }
            Err(_) => {
                self.metrics.record_failure();
                self.transitions
                    .record_failure(generation, self.clock.now_ms());
            }
        }

        result
    }

    /// Force the breaker back to a fresh closed state
    pub fn reset(&self) {
        self.transitions.reset(self.clock.now_ms());
    }

    /// Get current circuit breaker statistics
    pub fn stats(&self) -> CircuitBreakerStats {
        self.transitions.with_state(|inner| CircuitBreakerStats {
            key: self.key.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
            next_attempt_at_ms: inner.next_attempt_at_ms,
            last_failure_at_ms: inner.last_failure_at_ms,
            total_calls: self.metrics.total_calls.load(Ordering::Relaxed),
            total_successes: self.metrics.total_successes.load(Ordering::Relaxed),
            total_failures: self.metrics.total_failures.load(Ordering::Relaxed),
            total_rejections: self.metrics.total_rejections.load(Ordering::Relaxed),
            success_rate: self.metrics.success_rate(),
            rejection_rate: self.metrics.rejection_rate(),
            history: inner.history.iter().cloned().collect(),
        })
    }
}
