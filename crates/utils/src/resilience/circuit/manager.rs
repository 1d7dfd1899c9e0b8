//! One circuit breaker per endpoint key.

use super::config::CircuitBreakerConfig;
use super::state::CircuitBreaker;
use super::types::{CircuitBreakerStats, CircuitState};
use dashmap::DashMap;
use ledgerline_core::{system_clock, Error, Result, SharedClock};
use std::future::Future;
use std::sync::Arc;

/// Lazily creates and indexes breakers by endpoint key
#[derive(Debug)]
pub struct CircuitBreakerManager {
    config: CircuitBreakerConfig,
    clock: SharedClock,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl CircuitBreakerManager {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self::with_clock(config, system_clock())
    }

    pub fn with_clock(config: CircuitBreakerConfig, clock: SharedClock) -> Self {
        Self {
            config,
            clock,
            breakers: DashMap::new(),
        }
    }

    /// Breaker for `key`, created on first use
    pub fn get(&self, key: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(key) {
            return Arc::clone(existing.value());
        }

        let entry = self.breakers.entry(key.to_string()).or_insert_with(|| {
            tracing::debug!(endpoint = %key, "creating circuit breaker");
            Arc::new(CircuitBreaker::with_clock(
                key,
                self.config.clone(),
                Arc::clone(&self.clock),
            ))
        });
        Arc::clone(entry.value())
    }

    /// Execute `operation` through the breaker for `key`
    pub async fn execute<F, Fut, T>(&self, key: &str, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.get(key).execute(operation).await
    }

    /// Execute `operation` through the breaker for `key` with a fallback
    pub async fn execute_with_fallback<F, Fut, T, FB, FbFut>(
        &self,
        key: &str,
        operation: F,
        fallback: FB,
    ) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
        FB: FnOnce(Error) -> FbFut,
        FbFut: Future<Output = Result<T>>,
    {
        self.get(key).execute_with_fallback(operation, fallback).await
    }

    /// Current state for `key`; unknown keys are closed
    pub fn state(&self, key: &str) -> CircuitState {
        self.breakers
            .get(key)
            .map(|breaker| breaker.state())
            .unwrap_or(CircuitState::Closed)
    }

    /// Reset one breaker. Returns false when the key was never used.
    pub fn reset(&self, key: &str) -> bool {
        match self.breakers.get(key) {
            Some(breaker) => {
                breaker.reset();
                true
            }
            None => false,
        }
    }

    /// Reset every known breaker
    pub fn reset_all(&self) {
        for breaker in self.breakers.iter() {
            breaker.reset();
        }
    }

    /// Statistics for one key
    pub fn stats_for(&self, key: &str) -> Option<CircuitBreakerStats> {
        self.breakers.get(key).map(|breaker| breaker.stats())
    }

    /// Statistics for every key, sorted by key
    pub fn stats(&self) -> Vec<CircuitBreakerStats> {
        let mut stats: Vec<_> = self.breakers.iter().map(|b| b.stats()).collect();
        stats.sort_by(|a, b| a.key.cmp(&b.key));
        stats
    }

    /// Keys whose circuit is currently open
    pub fn open_circuits(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .breakers
            .iter()
            .filter(|b| b.state() == CircuitState::Open)
            .map(|b| b.key().to_string())
            .collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }
}

impl Default for CircuitBreakerManager {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}
