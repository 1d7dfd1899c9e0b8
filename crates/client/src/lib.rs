//! Resilient API client for the Ledgerline mobile app
//!
//! [`ApiClient`] composes the pieces from the lower crates into one request
//! pipeline: correlation ids on every call, a per-endpoint circuit breaker,
//! retries chosen from the classified failure, a two-tier response cache with
//! stale fallbacks, and a persistent log of terminal errors.
//!
//! ```no_run
//! use ledgerline_client::{ApiClient, ApiRequest};
//! use ledgerline_config::ResilienceConfig;
//! use std::time::Duration;
//!
//! # async fn demo() -> ledgerline_core::Result<()> {
//! let client = ApiClient::builder(ResilienceConfig::default()).build()?;
//! let outcome = client
//!     .request(ApiRequest::get("/products/42").cache_ttl(Duration::from_secs(600)))
//!     .await?;
//! if outcome.is_degraded() {
//!     // show a "data may be out of date" banner
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod correlation;
pub mod error_tracker;
pub mod interfaces;
pub mod outcome;
pub mod request;
pub mod transport;

pub use auth::TokenRefresher;
pub use client::{ApiClient, ApiClientBuilder, Diagnostics};
pub use correlation::{CorrelationManager, CorrelationRecord, CorrelationStats};
pub use error_tracker::{ErrorContext, ErrorRecord, ErrorTracker, NetworkState};
pub use interfaces::{
    ErrorNotifier, HttpTransport, MemorySecureStore, NetworkMonitor, RetryAction, SecureStore,
    TracingNotifier, TransportRequest, TransportResponse, UserNotice, WatchNetworkMonitor,
};
pub use outcome::{ApiOutcome, ApiResponse};
pub use request::{ApiRequest, CachePolicy, OfflinePolicy};
pub use transport::ReqwestTransport;
