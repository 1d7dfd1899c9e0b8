//! Resilience settings with defaults and validation

use ledgerline_core::{
    Error, Result, CACHE_STORAGE_PREFIX, CORRELATION_RETENTION_MS, DEFAULT_REQUEST_TIMEOUT_MS,
    ERROR_LOG_STORAGE_KEY, PAYMENT_REQUEST_TIMEOUT_MS,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Complete configuration for the resilience layer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    pub http: HttpSettings,
    pub circuit_breaker: CircuitBreakerSettings,
    pub cache: CacheSettings,
    pub correlation: CorrelationSettings,
    pub error_tracker: ErrorTrackerSettings,
}

/// Transport settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// Base URL every request path is joined onto
    pub base_url: String,
    /// Per-request timeout for ordinary endpoints
    pub timeout_ms: u64,
    /// Per-request timeout for payment endpoints
    pub payment_timeout_ms: u64,
    /// Path the token refresh hook posts to
    pub refresh_path: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api".to_string(),
            timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            payment_timeout_ms: PAYMENT_REQUEST_TIMEOUT_MS,
            refresh_path: "/auth/refresh".to_string(),
        }
    }
}

impl HttpSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn payment_timeout(&self) -> Duration {
        Duration::from_millis(self.payment_timeout_ms)
    }
}

/// Circuit breaker thresholds shared by every endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    /// Consecutive failures that open a closed circuit
    pub failure_threshold: usize,
    /// Successful probes that close a half-open circuit
    pub success_threshold: usize,
    /// How long a circuit stays open before probing
    pub timeout_ms: u64,
    /// Number of state transitions kept for diagnostics
    pub history_limit: usize,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            timeout_ms: 60_000,
            history_limit: 20,
        }
    }
}

/// Response cache settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Entries kept in the in-memory tier before FIFO eviction
    pub max_memory_items: usize,
    /// TTL applied when a caller does not pass one
    pub default_ttl_ms: u64,
    /// Prefix for keys written to persistent storage
    pub storage_prefix: String,
    /// Entry format version; entries with another version are misses
    pub version: u32,
    /// How long past its TTL an entry is kept for stale reads
    pub max_stale_ms: u64,
    /// Interval of the background expiry sweep
    pub sweep_interval_ms: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_memory_items: 100,
            default_ttl_ms: 5 * 60 * 1000,
            storage_prefix: CACHE_STORAGE_PREFIX.to_string(),
            version: 1,
            max_stale_ms: 24 * 60 * 60 * 1000,
            sweep_interval_ms: 60_000,
        }
    }
}

/// Correlation record retention
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationSettings {
    pub retention_ms: u64,
    pub sweep_interval_ms: u64,
}

impl Default for CorrelationSettings {
    fn default() -> Self {
        Self {
            retention_ms: CORRELATION_RETENTION_MS,
            sweep_interval_ms: 60_000,
        }
    }
}

/// Error tracker ring buffer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorTrackerSettings {
    pub max_records: usize,
    pub storage_key: String,
}

impl Default for ErrorTrackerSettings {
    fn default() -> Self {
        Self {
            max_records: 100,
            storage_key: ERROR_LOG_STORAGE_KEY.to_string(),
        }
    }
}

impl ResilienceConfig {
    /// Reject settings that would disable a component outright
    pub fn validate(&self) -> Result<()> {
        let checks: [(&str, bool); 8] = [
            ("circuit_breaker.failure_threshold", self.circuit_breaker.failure_threshold > 0),
            ("circuit_breaker.success_threshold", self.circuit_breaker.success_threshold > 0),
            ("circuit_breaker.timeout_ms", self.circuit_breaker.timeout_ms > 0),
            ("cache.max_memory_items", self.cache.max_memory_items > 0),
            ("error_tracker.max_records", self.error_tracker.max_records > 0),
            ("http.timeout_ms", self.http.timeout_ms > 0),
            ("http.payment_timeout_ms", self.http.payment_timeout_ms > 0),
            ("correlation.retention_ms", self.correlation.retention_ms > 0),
        ];

        if let Some((field, _)) = checks.iter().find(|(_, ok)| !ok) {
            return Err(Error::configuration(format!("{field} must be greater than zero")));
        }

        if self.http.base_url.trim().is_empty() {
            return Err(Error::configuration("http.base_url must not be empty"));
        }

        Ok(())
    }
}
