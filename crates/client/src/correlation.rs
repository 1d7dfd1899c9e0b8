//! Request correlation
//!
//! Every dispatched request gets a correlation id of the form
//! `{session_id}-{request_id}`, sent as headers so server logs can be joined
//! with client diagnostics. Records are kept for a short retention window
//! and swept periodically; they exist for observability only.

use dashmap::DashMap;
use ledgerline_config::CorrelationSettings;
use ledgerline_core::{
    system_clock, HttpMethod, SharedClock, CORRELATION_ID_HEADER, REQUEST_ID_HEADER,
    SESSION_ID_HEADER,
};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Lifecycle of one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorrelationRecord {
    pub correlation_id: String,
    pub session_id: String,
    pub request_id: String,
    pub created_at_ms: i64,
    pub endpoint: String,
    pub method: HttpMethod,
    pub completed_at_ms: Option<i64>,
    pub duration_ms: Option<u64>,
    pub success: Option<bool>,
}

impl CorrelationRecord {
    pub fn is_completed(&self) -> bool {
        self.completed_at_ms.is_some()
    }
}

/// Aggregate view over retained records
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationStats {
    pub active: usize,
    pub completed: usize,
    pub successful: usize,
    pub failed: usize,
    pub average_response_ms: f64,
}

#[derive(Debug)]
pub struct CorrelationManager {
    session_id: String,
    sequence: AtomicU64,
    records: DashMap<String, CorrelationRecord>,
    retention: Duration,
    clock: SharedClock,
}

impl CorrelationManager {
    pub fn new(settings: &CorrelationSettings) -> Self {
        Self::with_clock(settings, system_clock())
    }

    pub fn with_clock(settings: &CorrelationSettings, clock: SharedClock) -> Self {
        let session_id = uuid::Uuid::new_v4().simple().to_string()[..12].to_string();
        Self {
            session_id,
            sequence: AtomicU64::new(0),
            records: DashMap::new(),
            retention: Duration::from_millis(settings.retention_ms),
            clock,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    fn next_request_id(&self) -> String {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        format!("{:x}{:06x}", self.clock.now_ms(), sequence & 0xff_ffff)
    }

    /// A fresh id; unique within the session, and across sessions with
    /// overwhelming likelihood
    pub fn create_correlation_id(&self) -> String {
        format!("{}-{}", self.session_id, self.next_request_id())
    }

    /// Open a record for a request about to be dispatched
    pub fn track_request(&self, method: HttpMethod, endpoint: &str) -> String {
        let request_id = self.next_request_id();
        let correlation_id = format!("{}-{}", self.session_id, request_id);

        self.records.insert(
            correlation_id.clone(),
            CorrelationRecord {
                correlation_id: correlation_id.clone(),
                session_id: self.session_id.clone(),
                request_id,
                created_at_ms: self.clock.now_ms(),
                endpoint: endpoint.to_string(),
                method,
                completed_at_ms: None,
                duration_ms: None,
                success: None,
            },
        );
        correlation_id
    }

    /// Close a record. Only the first completion counts; later calls, and
    /// calls for unknown or already-swept ids, return `false`.
    pub fn complete_request(&self, correlation_id: &str, success: bool) -> bool {
        let Some(mut record) = self.records.get_mut(correlation_id) else {
            return false;
        };
        if record.is_completed() {
            return false;
        }

        let now = self.clock.now_ms();
        record.completed_at_ms = Some(now);
        record.duration_ms = Some(now.saturating_sub(record.created_at_ms).max(0) as u64);
        record.success = Some(success);
        true
    }

    pub fn get(&self, correlation_id: &str) -> Option<CorrelationRecord> {
        self.records.get(correlation_id).map(|r| r.value().clone())
    }

    /// Headers identifying `correlation_id` to the server
    pub fn headers(&self, correlation_id: &str) -> Vec<(&'static str, String)> {
        let request_id = self
            .records
            .get(correlation_id)
            .map(|r| r.request_id.clone())
            .unwrap_or_else(|| {
                correlation_id
                    .strip_prefix(&format!("{}-", self.session_id))
                    .unwrap_or(correlation_id)
                    .to_string()
            });

        vec![
            (CORRELATION_ID_HEADER, correlation_id.to_string()),
            (SESSION_ID_HEADER, self.session_id.clone()),
            (REQUEST_ID_HEADER, request_id),
        ]
    }

    /// Drop records created more than the retention window ago
    pub fn cleanup_expired(&self) -> usize {
        let cutoff = self.clock.now_ms() - self.retention.as_millis() as i64;
        let before = self.records.len();
        self.records.retain(|_, record| record.created_at_ms >= cutoff);
        let removed = before.saturating_sub(self.records.len());
        if removed > 0 {
            tracing::debug!(removed, "swept correlation records");
        }
        removed
    }

    /// Run [`cleanup_expired`](Self::cleanup_expired) every `interval` until
    /// the manager is dropped
    pub fn spawn_sweep(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let manager: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match manager.upgrade() {
                    Some(manager) => {
                        manager.cleanup_expired();
                    }
                    None => break,
                }
            }
        })
    }

    pub fn stats(&self) -> CorrelationStats {
        let mut active = 0;
        let mut successful = 0;
        let mut failed = 0;
        let mut total_ms = 0u64;

        for record in self.records.iter() {
            match record.success {
                None => active += 1,
                Some(true) => successful += 1,
                Some(false) => failed += 1,
            }
            total_ms += record.duration_ms.unwrap_or(0);
        }

        let completed = successful + failed;
        CorrelationStats {
            active,
            completed,
            successful,
            failed,
            average_response_ms: if completed == 0 {
                0.0
            } else {
                total_ms as f64 / completed as f64
            },
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerline_core::ManualClock;

    fn manager() -> (CorrelationManager, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let manager =
            CorrelationManager::with_clock(&CorrelationSettings::default(), clock.clone());
        (manager, clock)
    }

    #[test]
    fn ids_carry_session_prefix_and_are_unique() {
        let (manager, _) = manager();
        let a = manager.create_correlation_id();
        let b = manager.create_correlation_id();
        assert_ne!(a, b);
        assert!(a.starts_with(&format!("{}-", manager.session_id())));
    }

    #[test]
    fn completion_is_recorded_once() {
        let (manager, clock) = manager();
        let id = manager.track_request(HttpMethod::Get, "GET:/products/:id");

        clock.advance(Duration::from_millis(120));
        assert!(manager.complete_request(&id, true));
        clock.advance(Duration::from_millis(500));
        assert!(!manager.complete_request(&id, false));

        let record = manager.get(&id).unwrap();
        assert_eq!(record.duration_ms, Some(120));
        assert_eq!(record.success, Some(true));
        assert!(!manager.complete_request("unknown", true));
    }

    #[test]
    fn headers_identify_request() {
        let (manager, _) = manager();
        let id = manager.track_request(HttpMethod::Post, "POST:/orders");
        let record = manager.get(&id).unwrap();
        let headers = manager.headers(&id);

        assert_eq!(headers[0], (CORRELATION_ID_HEADER, id.clone()));
        assert_eq!(headers[1].1, manager.session_id());
        assert_eq!(headers[2].1, record.request_id);
    }

    #[test]
    fn sweep_removes_records_past_retention() {
        let (manager, clock) = manager();
        let old = manager.track_request(HttpMethod::Get, "GET:/a");
        clock.advance(Duration::from_secs(4 * 60));
        let recent = manager.track_request(HttpMethod::Get, "GET:/b");
        clock.advance(Duration::from_secs(2 * 60));

        assert_eq!(manager.cleanup_expired(), 1);
        assert!(manager.get(&old).is_none());
        assert!(manager.get(&recent).is_some());
    }

    #[test]
    fn stats_average_completed_requests() {
        let (manager, clock) = manager();
        let a = manager.track_request(HttpMethod::Get, "GET:/a");
        let b = manager.track_request(HttpMethod::Get, "GET:/b");
        let _pending = manager.track_request(HttpMethod::Get, "GET:/c");

        clock.advance(Duration::from_millis(100));
        manager.complete_request(&a, true);
        clock.advance(Duration::from_millis(200));
        manager.complete_request(&b, false);

        let stats = manager.stats();
        assert_eq!(stats.active, 1);
        assert_eq!(stats.completed, 2);
        assert_eq!(stats.successful, 1);
        assert_eq!(stats.failed, 1);
        assert!((stats.average_response_ms - 200.0).abs() < f64::EPSILON);
    }
}
