//! State transition logic for circuit breaker.

use super::config::CircuitBreakerConfig;
use super::metrics::MetricsState;
use super::types::{CircuitState, StateTransition};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// Mutable state of one breaker. Only touched under the mutex, never across
/// an await point.
#[derive(Debug)]
pub struct BreakerState {
    pub state: CircuitState,
    pub failure_count: usize,
    pub success_count: usize,
    pub next_attempt_at_ms: Option<i64>,
    pub last_failure_at_ms: Option<i64>,
    pub history: VecDeque<StateTransition>,
}

impl BreakerState {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            next_attempt_at_ms: None,
            last_failure_at_ms: None,
            history: VecDeque::new(),
        }
    }
}

/// Outcome of asking the breaker whether a call may run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Run the call and report its result against this generation
    Allowed { generation: u64 },
    /// Circuit is open; the next probe is allowed after `retry_in`
    Rejected { retry_in: Duration },
}

/// Handles state transitions for circuit breaker
#[derive(Debug)]
pub struct StateTransitions {
    key: String,
    config: CircuitBreakerConfig,
    metrics: Arc<MetricsState>,
    inner: Mutex<BreakerState>,
}

impl StateTransitions {
    /// Create new state transitions handler
    pub fn new(key: String, config: CircuitBreakerConfig, metrics: Arc<MetricsState>) -> Self {
        Self {
            key,
            config,
            metrics,
            inner: Mutex::new(BreakerState::new()),
        }
    }

    /// Decide whether a call may run at `now_ms`, moving `Open -> HalfOpen`
    /// once the open timeout has elapsed
    pub fn admit(&self, now_ms: i64) -> Admission {
        let mut inner = self.inner.lock();

        if inner.state == CircuitState::Open {
            let next_attempt = inner.next_attempt_at_ms.unwrap_or(now_ms);
            if now_ms < next_attempt {
                return Admission::Rejected {
                    retry_in: Duration::from_millis((next_attempt - now_ms) as u64),
                };
            }
            self.transition(&mut inner, CircuitState::HalfOpen, now_ms, "open timeout elapsed");
        }

        Admission::Allowed {
            generation: self.metrics.current_generation(),
        }
    }

    /// Record a successful call and handle state transitions
    pub fn record_success(&self, generation: u64, now_ms: i64) {
        let mut inner = self.inner.lock();

        // A call that started before the last transition says nothing about
        // the current state
        if generation != self.metrics.current_generation() {
            tracing::trace!(endpoint = %self.key, "ignoring success from previous generation");
            return;
        }

        inner.failure_count = 0;

        if inner.state == CircuitState::HalfOpen {
            inner.success_count += 1;
            if inner.success_count >= self.config.success_threshold {
                self.transition(&mut inner, CircuitState::Closed, now_ms, "probe succeeded");
            }
        }
    }

    /// Record a failed call and handle state transitions
    pub fn record_failure(&self, generation: u64, now_ms: i64) {
        let mut inner = self.inner.lock();

        if generation != self.metrics.current_generation() {
            tracing::trace!(endpoint = %self.key, "ignoring failure from previous generation");
            return;
        }

        inner.failure_count += 1;
        inner.last_failure_at_ms = Some(now_ms);

        match inner.state {
            CircuitState::Closed => {
                if inner.failure_count >= self.config.failure_threshold {
                    self.transition(
                        &mut inner,
                        CircuitState::Open,
                        now_ms,
                        "failure threshold reached",
                    );
                }
            }
            CircuitState::HalfOpen => {
                // Any failure in half-open state reopens the circuit
                self.transition(&mut inner, CircuitState::Open, now_ms, "probe failed");
            }
            CircuitState::Open => {}
        }
    }

    /// Put the breaker back into its initial closed state.
    ///
    /// This is an operator action outside the automatic state machine; it is
    /// still written to the history so diagnostics show it happened.
    pub fn reset(&self, now_ms: i64) {
        let mut inner = self.inner.lock();
        let from = inner.state;
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
        inner.success_count = 0;
        inner.next_attempt_at_ms = None;
        inner.last_failure_at_ms = None;
        self.push_history(
            &mut inner,
            StateTransition {
                from,
                to: CircuitState::Closed,
                at_ms: now_ms,
                reason: "manual reset".to_string(),
            },
        );
        self.metrics.increment_generation();
        tracing::info!(endpoint = %self.key, from = %from, "circuit breaker reset");
    }

    /// Current state without side effects
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Run `f` against a consistent view of the state
    pub fn with_state<R>(&self, f: impl FnOnce(&BreakerState) -> R) -> R {
        f(&self.inner.lock())
    }

    fn transition(&self, inner: &mut BreakerState, to: CircuitState, now_ms: i64, reason: &str) {
        let from = inner.state;
        if !from.can_transition_to(to) {
            debug_assert!(false, "illegal circuit transition {from} -> {to}");
            return;
        }

        inner.state = to;
        match to {
            CircuitState::Open => {
                inner.success_count = 0;
                inner.next_attempt_at_ms = Some(now_ms + self.config.timeout.as_millis() as i64);
                tracing::warn!(
                    endpoint = %self.key,
                    from = %from,
                    failures = inner.failure_count,
                    retry_in_ms = self.config.timeout.as_millis() as u64,
                    "circuit breaker opening"
                );
            }
            CircuitState::HalfOpen => {
                inner.success_count = 0;
                tracing::info!(endpoint = %self.key, "circuit breaker entering half-open state");
            }
            CircuitState::Closed => {
                inner.failure_count = 0;
                inner.success_count = 0;
                inner.next_attempt_at_ms = None;
                tracing::info!(endpoint = %self.key, "circuit breaker closing");
            }
        }

        self.push_history(
            inner,
            StateTransition {
                from,
                to,
                at_ms: now_ms,
                reason: reason.to_string(),
            },
        );
        self.metrics.increment_generation();
    }

    fn push_history(&self, inner: &mut BreakerState, transition: StateTransition) {
        if self.config.history_limit == 0 {
            return;
        }
        while inner.history.len() >= self.config.history_limit {
            inner.history.pop_front();
        }
        inner.history.push_back(transition);
    }
}
