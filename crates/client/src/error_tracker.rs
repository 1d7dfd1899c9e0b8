//! Terminal error log
//!
//! Keeps the newest `max_records` terminal failures in a ring buffer and
//! mirrors it to persistent storage so the log survives restarts. Records
//! for an endpoint key are marked recovered once a later call to that key
//! succeeds.

use ledgerline_cache::PersistentStorage;
use ledgerline_config::ErrorTrackerSettings;
use ledgerline_core::{
    classify, system_clock, Error, ErrorCategory, HttpMethod, Result, ResultExt, SharedClock,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Connectivity when the failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkState {
    Online,
    Offline,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub id: String,
    pub timestamp_ms: i64,
    pub session_id: String,
    pub correlation_id: Option<String>,
    pub category: ErrorCategory,
    pub message: String,
    pub endpoint: String,
    pub method: HttpMethod,
    pub status_code: Option<u16>,
    pub network_state: NetworkState,
    pub recovered: bool,
}

/// Where a failure came from
#[derive(Debug, Clone)]
pub struct ErrorContext<'a> {
    pub endpoint: &'a str,
    pub method: HttpMethod,
    pub correlation_id: Option<&'a str>,
    pub network_state: NetworkState,
}

#[derive(Debug)]
pub struct ErrorTracker {
    settings: ErrorTrackerSettings,
    session_id: String,
    storage: Arc<dyn PersistentStorage>,
    records: Mutex<VecDeque<ErrorRecord>>,
    sequence: AtomicU64,
    clock: SharedClock,
}

impl ErrorTracker {
    pub fn new(
        settings: ErrorTrackerSettings,
        session_id: impl Into<String>,
        storage: Arc<dyn PersistentStorage>,
    ) -> Self {
        Self::with_clock(settings, session_id, storage, system_clock())
    }

    pub fn with_clock(
        settings: ErrorTrackerSettings,
        session_id: impl Into<String>,
        storage: Arc<dyn PersistentStorage>,
        clock: SharedClock,
    ) -> Self {
        Self {
            settings,
            session_id: session_id.into(),
            storage,
            records: Mutex::new(VecDeque::new()),
            sequence: AtomicU64::new(0),
            clock,
        }
    }

    /// Record a terminal failure and persist the log
    pub async fn record(&self, error: &Error, context: ErrorContext<'_>) -> ErrorRecord {
        let now = self.clock.now_ms();
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let record = ErrorRecord {
            id: format!("err-{now:x}-{sequence}"),
            timestamp_ms: now,
            session_id: self.session_id.clone(),
            correlation_id: context.correlation_id.map(str::to_string),
            category: classify(error),
            message: error.to_string(),
            endpoint: context.endpoint.to_string(),
            method: context.method,
            status_code: error.status_code(),
            network_state: context.network_state,
            recovered: false,
        };

        tracing::warn!(
            category = %record.category,
            endpoint = %record.endpoint,
            correlation_id = record.correlation_id.as_deref().unwrap_or(""),
            status = record.status_code.unwrap_or_default(),
            "{}",
            record.message
        );

        {
            let mut records = self.records.lock();
            records.push_back(record.clone());
            while records.len() > self.settings.max_records {
                records.pop_front();
            }
        }

        self.persist_logged().await;
        record
    }

    /// Mark every unrecovered record for `endpoint` as recovered. Returns how
    /// many changed.
    pub async fn mark_recovered(&self, endpoint: &str) -> usize {
        let changed = {
            let mut records = self.records.lock();
            let mut changed = 0;
            for record in records
                .iter_mut()
                .filter(|r| !r.recovered && r.endpoint == endpoint)
            {
                record.recovered = true;
                changed += 1;
            }
            changed
        };

        if changed > 0 {
            tracing::info!(endpoint = %endpoint, records = changed, "endpoint recovered");
            self.persist_logged().await;
        }
        changed
    }

    /// Newest first
    pub fn recent(&self, limit: usize) -> Vec<ErrorRecord> {
        self.records
            .lock()
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    /// Retained records per category
    pub fn counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for record in self.records.lock().iter() {
            *counts.entry(record.category.as_str().to_string()).or_insert(0) += 1;
        }
        counts
    }

    pub fn unrecovered(&self) -> usize {
        self.records.lock().iter().filter(|r| !r.recovered).count()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Write the current log to storage
    pub async fn persist(&self) -> Result<()> {
        let snapshot: Vec<ErrorRecord> = self.records.lock().iter().cloned().collect();
        let raw = serde_json::to_string(&snapshot)?;
        self.storage
            .set_item(&self.settings.storage_key, &raw)
            .await
            .storage_context("persist", &self.settings.storage_key)
    }

    async fn persist_logged(&self) {
        if let Err(e) = self.persist().await {
            tracing::warn!(error = %e, "failed to persist error log");
        }
    }

    /// Load the persisted log, replacing what is in memory. Returns the number
    /// of records restored.
    pub async fn restore(&self) -> Result<usize> {
        let Some(raw) = self.storage.get_item(&self.settings.storage_key).await? else {
            return Ok(0);
        };
        let mut restored: VecDeque<ErrorRecord> = serde_json::from_str(&raw)?;
        while restored.len() > self.settings.max_records {
            restored.pop_front();
        }

        let count = restored.len();
        *self.records.lock() = restored;
        tracing::debug!(records = count, "restored error log");
        Ok(count)
    }

    /// Forget everything, in memory and in storage
    pub async fn clear(&self) -> Result<()> {
        self.records.lock().clear();
        self.storage.remove_item(&self.settings.storage_key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerline_cache::MemoryStorage;
    use ledgerline_core::ManualClock;

    fn tracker(max_records: usize) -> (ErrorTracker, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        let settings = ErrorTrackerSettings {
            max_records,
            ..ErrorTrackerSettings::default()
        };
        let tracker = ErrorTracker::with_clock(
            settings,
            "session",
            storage.clone(),
            Arc::new(ManualClock::default()),
        );
        (tracker, storage)
    }

    fn context(endpoint: &str) -> ErrorContext<'_> {
        ErrorContext {
            endpoint,
            method: HttpMethod::Get,
            correlation_id: Some("session-1"),
            network_state: NetworkState::Online,
        }
    }

    #[tokio::test]
    async fn records_are_classified_and_bounded() {
        let (tracker, _) = tracker(2);
        tracker
            .record(&Error::network("/a", "reset"), context("GET:/a"))
            .await;
        tracker
            .record(&Error::http(HttpMethod::Get, "/b", 503, "down"), context("GET:/b"))
            .await;
        let last = tracker
            .record(&Error::http(HttpMethod::Get, "/c", 404, "gone"), context("GET:/c"))
            .await;

        assert_eq!(last.category, ErrorCategory::NotFound);
        assert_eq!(last.status_code, Some(404));
        assert_eq!(tracker.len(), 2);
        let recent: Vec<_> = tracker.recent(10).into_iter().map(|r| r.endpoint).collect();
        assert_eq!(recent, vec!["GET:/c", "GET:/b"]);
    }

    #[tokio::test]
    async fn recovery_marks_matching_endpoint() {
        let (tracker, _) = tracker(10);
        tracker
            .record(&Error::network("/a", "reset"), context("GET:/a"))
            .await;
        tracker
            .record(&Error::network("/a", "reset"), context("GET:/a"))
            .await;
        tracker
            .record(&Error::network("/b", "reset"), context("GET:/b"))
            .await;

        assert_eq!(tracker.mark_recovered("GET:/a").await, 2);
        assert_eq!(tracker.mark_recovered("GET:/a").await, 0);
        assert_eq!(tracker.unrecovered(), 1);
    }

    #[tokio::test]
    async fn log_survives_restore() {
        let (tracker, storage) = tracker(10);
        tracker
            .record(&Error::http(HttpMethod::Post, "/orders", 500, "boom"), context("POST:/orders"))
            .await;

        let reopened = ErrorTracker::new(ErrorTrackerSettings::default(), "next", storage);
        assert_eq!(reopened.restore().await.unwrap(), 1);
        assert_eq!(reopened.counts().get("SERVER_ERROR"), Some(&1));

        reopened.clear().await.unwrap();
        assert!(reopened.is_empty());
        assert_eq!(reopened.restore().await.unwrap(), 0);
    }
}
