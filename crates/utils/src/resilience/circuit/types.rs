//! Core types for circuit breaker functionality.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Circuit is closed - requests pass through normally
    Closed,
    /// Circuit is open - requests are rejected without being sent
    Open,
    /// Circuit is half-open - requests probe whether the endpoint recovered
    HalfOpen,
}

impl CircuitState {
    /// Whether `self -> to` is one of the four legal transitions
    pub fn can_transition_to(&self, to: CircuitState) -> bool {
        matches!(
            (self, to),
            (CircuitState::Closed, CircuitState::Open)
                | (CircuitState::Open, CircuitState::HalfOpen)
                | (CircuitState::HalfOpen, CircuitState::Closed)
                | (CircuitState::HalfOpen, CircuitState::Open)
        )
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        };
        f.write_str(name)
    }
}

/// One recorded state change, kept in a bounded history for diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: CircuitState,
    pub to: CircuitState,
    pub at_ms: i64,
    pub reason: String,
}

/// Statistics about one circuit breaker
#[derive(Debug, Clone, Serialize)]
pub struct CircuitBreakerStats {
    pub key: String,
    pub state: CircuitState,
    pub failure_count: usize,
    pub success_count: usize,
    pub next_attempt_at_ms: Option<i64>,
    pub last_failure_at_ms: Option<i64>,
    pub total_calls: u64,
    pub total_successes: u64,
    pub total_failures: u64,
    pub total_rejections: u64,
    /// Successes over calls that actually ran
    pub success_rate: f64,
    /// Rejections over all calls, including rejected ones
    pub rejection_rate: f64,
    pub history: Vec<StateTransition>,
}
