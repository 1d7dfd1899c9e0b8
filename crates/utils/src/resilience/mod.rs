//! Resilience patterns: circuit breakers and retry strategies.
//!
//! ## Key Components
//!
//! - **`circuit`**: Per-endpoint circuit breakers that stop calling an
//!   endpoint known to be failing, and a manager that creates them lazily.
//! - **`retry`**: Retry policies (linear, exponential, fibonacci backoff) and
//!   the selector that picks one from a classified failure.

pub mod circuit;
pub mod retry;

pub use circuit::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerManager, CircuitBreakerStats,
    CircuitState, StateTransition,
};
pub use retry::{
    parse_retry_after, BackoffKind, BeforeRetry, RetryPolicy, RetryStrategySelector,
    StrategyKind,
};
