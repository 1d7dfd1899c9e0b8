//! Retry policies and the selector that picks one per failure
//!
//! The selector maps an error and the endpoint it came from to one of a
//! fixed set of shared [`RetryPolicy`] instances. Payment submissions are
//! never retried; payment reads get the most persistent policy.

pub mod backoff;
pub mod policy;
pub mod retry_after;
pub mod selector;

pub use backoff::BackoffKind;
pub use policy::{BeforeRetry, RetryPolicy};
pub use retry_after::parse_retry_after;
pub use selector::{RetryStrategySelector, StrategyKind};
