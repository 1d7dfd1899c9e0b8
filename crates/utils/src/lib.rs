//! Shared resilience primitives for the Ledgerline API client
//!
//! This crate holds the stateful building blocks that the request
//! orchestrator composes: per-endpoint circuit breakers and the retry
//! policies chosen for each failure category. It also owns the tracing
//! subscriber setup used by applications embedding the client.

pub mod resilience;
pub mod tracing;

pub use resilience::*;
