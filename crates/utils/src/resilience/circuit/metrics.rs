//! Lifetime counters for circuit breakers.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters that survive state transitions and resets of the state machine
#[derive(Debug, Default)]
pub struct MetricsState {
    pub total_calls: AtomicU64,
    pub total_successes: AtomicU64,
    pub total_failures: AtomicU64,
    pub total_rejections: AtomicU64,
    pub generation: AtomicU64,
}

impl MetricsState {
    /// Create new metrics state
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_call(&self) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self) {
        self.total_successes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.total_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejection(&self) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        self.total_rejections.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment generation counter for state changes
    pub fn increment_generation(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Get current generation
    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Successes over calls that were allowed through
    pub fn success_rate(&self) -> f64 {
        let executed = self.total_successes.load(Ordering::Relaxed)
            + self.total_failures.load(Ordering::Relaxed);
        if executed == 0 {
            return 1.0;
        }
        self.total_successes.load(Ordering::Relaxed) as f64 / executed as f64
    }

    /// Rejections over every call, including rejected ones
    pub fn rejection_rate(&self) -> f64 {
        let calls = self.total_calls.load(Ordering::Relaxed);
        if calls == 0 {
            return 0.0;
        }
        self.total_rejections.load(Ordering::Relaxed) as f64 / calls as f64
    }
}
