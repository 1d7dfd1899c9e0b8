//! Core domain types and errors for the Ledgerline API resilience layer.
//!
//! Everything the other crates agree on lives here, so that the retry
//! selector, the request orchestrator and the error tracker all speak the
//! same language about failures.
//!
//! ## Key Components
//!
//! - **`errors`**: The primary `Error` enum and `Result` alias. Every failure
//!   mode of an outbound request (HTTP status, transport, timeout, circuit
//!   rejection, storage) is a variant here.
//! - **`classifier`**: The single `classify` function that maps an `Error`
//!   onto an `ErrorCategory`.
//! - **`http`**: `HttpMethod` and `Endpoint`, including endpoint-key
//!   templating and payment endpoint detection.
//! - **`clock`**: Wall-clock abstraction so TTLs and breaker timeouts can be
//!   driven deterministically in tests.
//! - **`constants`**: Header names, storage prefixes and default timings.

pub mod classifier;
pub mod clock;
pub mod constants;
pub mod errors;
pub mod http;

pub use self::{
    classifier::{category_for_status, classify, suggest_recovery, ErrorCategory},
    clock::{system_clock, Clock, ManualClock, SharedClock, SystemClock},
    constants::*,
    errors::{Error, FieldErrors, Result, ResultExt},
    http::{Endpoint, HttpMethod},
};
