//! Circuit breakers keyed by endpoint
//!
//! A breaker guards one endpoint key (`METHOD:/path/:id`). After
//! `failure_threshold` consecutive failures it opens and rejects calls
//! without invoking them until `timeout` has elapsed; the next call then
//! probes in the half-open state, and `success_threshold` successful probes
//! close it again. A single failed probe re-opens it.
//!
//! ## Architecture
//!
//! - [`types`] - Circuit states, transition records and statistics
//! - [`config`] - Thresholds and timeouts
//! - [`metrics`] - Lifetime counters and the state generation
//! - [`transitions`] - The state machine itself
//! - [`state`] - `CircuitBreaker::execute` and friends
//! - [`manager`] - One breaker per endpoint key, created lazily
//!
//! ## Example
//!
//! ```rust,no_run
//! use ledgerline_utils::resilience::circuit::{CircuitBreakerConfig, CircuitBreakerManager};
//!
//! # async fn example() -> ledgerline_core::Result<String> {
//! let manager = CircuitBreakerManager::new(CircuitBreakerConfig::default());
//! let breaker = manager.get("GET:/products/:id");
//!
//! let result = breaker
//!     .execute(|| async {
//!         // Your request here
//!         Ok("product".to_string())
//!     })
//!     .await;
//! result
//! # }
//! ```

pub mod config;
pub mod manager;
pub mod metrics;
pub mod state;
pub mod transitions;
pub mod types;

// Re-export public API
pub use config::CircuitBreakerConfig;
pub use manager::CircuitBreakerManager;
pub use state::CircuitBreaker;
pub use types::{CircuitBreakerStats, CircuitState, StateTransition};
