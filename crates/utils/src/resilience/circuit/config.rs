//! Configuration for circuit breaker behavior.

use ledgerline_config::CircuitBreakerSettings;
use std::time::Duration;

/// Default consecutive failures before the circuit opens
const DEFAULT_FAILURE_THRESHOLD: usize = 5;

/// Default successful probes before a half-open circuit closes
const DEFAULT_SUCCESS_THRESHOLD: usize = 2;

/// Default time an open circuit waits before probing (60s)
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default number of transitions kept per breaker
const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening the circuit
    pub failure_threshold: usize,
    /// Success threshold to close the circuit from half-open state
    pub success_threshold: usize,
    /// Duration to wait before attempting half-open state
    pub timeout: Duration,
    /// Maximum number of state transitions kept for diagnostics
    pub history_limit: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            success_threshold: DEFAULT_SUCCESS_THRESHOLD,
            timeout: DEFAULT_TIMEOUT,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl From<&CircuitBreakerSettings> for CircuitBreakerConfig {
    fn from(settings: &CircuitBreakerSettings) -> Self {
        Self {
            failure_threshold: settings.failure_threshold.max(1),
            success_threshold: settings.success_threshold.max(1),
            timeout: Duration::from_millis(settings.timeout_ms),
            history_limit: settings.history_limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_convert_to_durations() {
        let settings = CircuitBreakerSettings {
            failure_threshold: 3,
            success_threshold: 1,
            timeout_ms: 1_500,
            history_limit: 4,
        };
        let config = CircuitBreakerConfig::from(&settings);
        assert_eq!(config.failure_threshold, 3);
        assert_eq!(config.timeout, Duration::from_millis(1_500));
        assert_eq!(config.history_limit, 4);
    }

    #[test]
    fn defaults_match_settings_defaults() {
        let from_settings = CircuitBreakerConfig::from(&CircuitBreakerSettings::default());
        assert_eq!(from_settings, CircuitBreakerConfig::default());
    }
}
