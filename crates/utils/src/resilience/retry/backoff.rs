//! Backoff shapes.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How the delay grows between retries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    /// `base * n`
    Linear,
    /// `base * 2^(n-1)`
    Exponential,
    /// `base * fib(n)` with `fib(1) = fib(2) = 1`
    Fibonacci,
}

impl BackoffKind {
    /// Un-jittered, uncapped delay before retry number `attempt` (1-based).
    /// Saturates instead of overflowing.
    pub fn delay(self, base: Duration, attempt: u32) -> Duration {
        let n = attempt.max(1);
        let factor: u64 = match self {
            BackoffKind::Linear => u64::from(n),
            BackoffKind::Exponential => 1u64.checked_shl(n - 1).unwrap_or(u64::MAX),
            BackoffKind::Fibonacci => fibonacci(n),
        };
        let factor = u32::try_from(factor).unwrap_or(u32::MAX);
        base.saturating_mul(factor)
    }
}

fn fibonacci(n: u32) -> u64 {
    let (mut a, mut b) = (1u64, 1u64);
    for _ in 2..n {
        let next = a.saturating_add(b);
        a = b;
        b = next;
    }
    b
}
