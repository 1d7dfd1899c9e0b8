//! Cached response entries

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// A cached response body with its freshness metadata.
///
/// Timestamps are wall-clock milliseconds so entries read back from
/// persistent storage after a restart still age correctly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub data: Value,
    pub timestamp_ms: i64,
    pub ttl_ms: u64,
    pub version: u32,
}

/// How an entry relates to the moment it is read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    /// Past its TTL but still kept for stale reads
    Stale,
    /// Past the stale window, or written by another format version
    Dead,
}

impl CacheEntry {
    pub fn new(data: Value, now_ms: i64, ttl: Duration, version: u32) -> Self {
        Self {
            data,
            timestamp_ms: now_ms,
            ttl_ms: ttl.as_millis() as u64,
            version,
        }
    }

    /// Age at `now_ms`; clocks that moved backwards count as zero
    pub fn age(&self, now_ms: i64) -> Duration {
        Duration::from_millis(now_ms.saturating_sub(self.timestamp_ms).max(0) as u64)
    }

    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.age(now_ms).as_millis() as u64 > self.ttl_ms
    }

    pub fn freshness(&self, now_ms: i64, version: u32, max_stale: Duration) -> Freshness {
        if self.version != version {
            return Freshness::Dead;
        }
        let age = self.age(now_ms).as_millis() as u64;
        if age <= self.ttl_ms {
            Freshness::Fresh
        } else if age - self.ttl_ms <= max_stale.as_millis() as u64 {
            Freshness::Stale
        } else {
            Freshness::Dead
        }
    }
}
