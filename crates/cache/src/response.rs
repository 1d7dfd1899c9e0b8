//! Two-tier response cache
//!
//! The memory tier is an insertion-ordered map capped at `max_memory_items`;
//! the oldest insertion is evicted first. Every persistent write also goes to
//! a [`PersistentStorage`] under `storage_prefix`, and storage hits are
//! promoted back into memory.
//!
//! Storage failures never fail a read: they are logged and count as a miss.

use crate::entry::{CacheEntry, Freshness};
use crate::stats::{CacheCounters, CacheStats};
use crate::storage::{MemoryStorage, PersistentStorage};
use indexmap::IndexMap;
use ledgerline_config::CacheSettings;
use ledgerline_core::{system_clock, Result, SharedClock};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Which tier answered a read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
    Memory,
    Storage,
}

impl CacheSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheSource::Memory => "memory",
            CacheSource::Storage => "storage",
        }
    }
}

/// A successful cache read
#[derive(Debug, Clone, PartialEq)]
pub struct CacheHit {
    pub data: Value,
    pub source: CacheSource,
    pub age: Duration,
    pub stale: bool,
}

/// Per-write options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetOptions {
    /// Overrides the configured default TTL
    pub ttl: Option<Duration>,
    /// Also write to persistent storage
    pub persistent: bool,
}

impl Default for SetOptions {
    fn default() -> Self {
        Self {
            ttl: None,
            persistent: true,
        }
    }
}

impl SetOptions {
    pub fn ttl(ttl: Duration) -> Self {
        Self {
            ttl: Some(ttl),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn memory_only(mut self) -> Self {
        self.persistent = false;
        self
    }
}

/// Memory plus persistent response cache
#[derive(Debug)]
pub struct ResponseCache {
    settings: CacheSettings,
    memory: Mutex<IndexMap<String, CacheEntry>>,
    storage: Arc<dyn PersistentStorage>,
    clock: SharedClock,
    counters: CacheCounters,
}

impl ResponseCache {
    pub fn new(settings: CacheSettings, storage: Arc<dyn PersistentStorage>) -> Self {
        Self::with_clock(settings, storage, system_clock())
    }

    pub fn with_clock(
        settings: CacheSettings,
        storage: Arc<dyn PersistentStorage>,
        clock: SharedClock,
    ) -> Self {
        Self {
            settings,
            memory: Mutex::new(IndexMap::new()),
            storage,
            clock,
            counters: CacheCounters::default(),
        }
    }

    /// Cache whose second tier only lives as long as the process
    pub fn in_memory(settings: CacheSettings) -> Self {
        Self::new(settings, Arc::new(MemoryStorage::new()))
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    fn storage_key(&self, key: &str) -> String {
        format!("{}{}", self.settings.storage_prefix, key)
    }

    fn max_stale(&self) -> Duration {
        Duration::from_millis(self.settings.max_stale_ms)
    }

    fn freshness(&self, entry: &CacheEntry, now_ms: i64) -> Freshness {
        entry.freshness(now_ms, self.settings.version, self.max_stale())
    }

    fn insert_memory(&self, key: String, entry: CacheEntry) {
        let mut memory = self.memory.lock();
        // Re-inserting moves the key to the newest position
        memory.shift_remove(&key);
        memory.insert(key, entry);

        while memory.len() > self.settings.max_memory_items {
            match memory.shift_remove_index(0) {
                Some((evicted, _)) => {
                    self.counters.evict();
                    tracing::debug!(key = %evicted, "evicted oldest cache entry");
                }
                None => break,
            }
        }
    }

    fn hit(&self, key: &str, entry: CacheEntry, source: CacheSource, now_ms: i64) -> CacheHit {
        let stale = entry.is_expired(now_ms);
        self.counters.hit();
        tracing::debug!(key = %key, source = source.as_str(), stale, "cache_hit");
        CacheHit {
            age: entry.age(now_ms),
            data: entry.data,
            source,
            stale,
        }
    }

    fn miss(&self, key: &str) -> Option<CacheHit> {
        self.counters.miss();
        tracing::debug!(key = %key, "cache_miss");
        None
    }

    async fn remove_from_storage(&self, keys: &[String]) {
        let storage_keys: Vec<String> = keys.iter().map(|k| self.storage_key(k)).collect();
        if let Err(e) = self.storage.multi_remove(&storage_keys).await {
            tracing::warn!(error = %e, "failed to remove cache entries from storage");
        }
    }

    fn decode(&self, key: &str, raw: &str) -> Option<CacheEntry> {
        match serde_json::from_str(raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "discarding unreadable cache entry");
                None
            }
        }
    }

    /// Read `key`. Expired entries are only returned when `allow_stale` is set,
    /// and then with `stale: true`.
    pub async fn get(&self, key: &str, allow_stale: bool) -> Option<CacheHit> {
        let now = self.clock.now_ms();

        let in_memory = {
            let mut memory = self.memory.lock();
            match memory.get(key).map(|entry| (self.freshness(entry, now), entry.clone())) {
                Some((Freshness::Dead, _)) => {
                    memory.shift_remove(key);
                    Some(None)
                }
                Some((_, entry)) => Some(Some(entry)),
                None => None,
            }
        };

        match in_memory {
            Some(Some(entry)) => {
                if entry.is_expired(now) && !allow_stale {
                    return self.miss(key);
                }
                return Some(self.hit(key, entry, CacheSource::Memory, now));
            }
            Some(None) => {
                self.remove_from_storage(&[key.to_string()]).await;
                return self.miss(key);
            }
            None => {}
        }

        let raw = match self.storage.get_item(&self.storage_key(key)).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return self.miss(key),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "cache storage read failed");
                return self.miss(key);
            }
        };

        let Some(entry) = self.decode(key, &raw) else {
            self.remove_from_storage(&[key.to_string()]).await;
            return self.miss(key);
        };

        self.resolve_stored(key, entry, allow_stale, now).await
    }

    async fn resolve_stored(
        &self,
        key: &str,
        entry: CacheEntry,
        allow_stale: bool,
        now: i64,
    ) -> Option<CacheHit> {
        match self.freshness(&entry, now) {
            Freshness::Stale if !allow_stale => self.miss(key),
            Freshness::Fresh | Freshness::Stale => {
                self.insert_memory(key.to_string(), entry.clone());
                Some(self.hit(key, entry, CacheSource::Storage, now))
            }
            Freshness::Dead => {
                self.remove_from_storage(&[key.to_string()]).await;
                self.miss(key)
            }
        }
    }

    /// Store `data` under `key`
    pub async fn set(&self, key: &str, data: Value, options: SetOptions) -> Result<()> {
        let entry = self.new_entry(data, options.ttl);
        self.insert_memory(key.to_string(), entry.clone());
        self.counters.set(1);

        if options.persistent {
            let raw = serde_json::to_string(&entry)?;
            self.storage.set_item(&self.storage_key(key), &raw).await?;
        }
        Ok(())
    }

    fn new_entry(&self, data: Value, ttl: Option<Duration>) -> CacheEntry {
        let ttl = ttl.unwrap_or(Duration::from_millis(self.settings.default_ttl_ms));
        CacheEntry::new(data, self.clock.now_ms(), ttl, self.settings.version)
    }

    /// Read several keys, using one storage round-trip for memory misses
    pub async fn get_batch(&self, keys: &[String], allow_stale: bool) -> Vec<Option<CacheHit>> {
        let now = self.clock.now_ms();
        let mut results: Vec<Option<CacheHit>> = vec![None; keys.len()];
        let mut pending: Vec<usize> = Vec::new();
        let mut dead: Vec<String> = Vec::new();

        {
            let mut memory = self.memory.lock();
            for (idx, key) in keys.iter().enumerate() {
                let Some(entry) = memory.get(key).cloned() else {
                    pending.push(idx);
                    continue;
                };
                match self.freshness(&entry, now) {
                    Freshness::Dead => {
                        memory.shift_remove(key);
                        dead.push(key.clone());
                    }
                    Freshness::Stale if !allow_stale => {}
                    _ => results[idx] = Some(self.hit(key, entry, CacheSource::Memory, now)),
                }
            }
        }

        if !pending.is_empty() {
            let storage_keys: Vec<String> =
                pending.iter().map(|&idx| self.storage_key(&keys[idx])).collect();
            match self.storage.multi_get(&storage_keys).await {
                Ok(values) => {
                    for (&idx, (_, raw)) in pending.iter().zip(values) {
                        let key = &keys[idx];
                        let Some(entry) = raw.and_then(|raw| self.decode(key, &raw)) else {
                            continue;
                        };
                        match self.freshness(&entry, now) {
                            Freshness::Stale if !allow_stale => {}
                            Freshness::Fresh | Freshness::Stale => {
                                self.insert_memory(key.clone(), entry.clone());
                                results[idx] =
                                    Some(self.hit(key, entry, CacheSource::Storage, now));
                            }
                            Freshness::Dead => dead.push(key.clone()),
                        }
                    }
                }
                Err(e) => tracing::warn!(error = %e, "cache storage batch read failed"),
            }
        }

        if !dead.is_empty() {
            self.remove_from_storage(&dead).await;
        }

        for (key, result) in keys.iter().zip(&results) {
            if result.is_none() {
                self.miss(key);
            }
        }
        results
    }

    /// Write several entries, using one storage round-trip for the persistent ones
    pub async fn set_batch(&self, entries: Vec<(String, Value, SetOptions)>) -> Result<()> {
        let mut persistent = Vec::new();
        let count = entries.len() as u64;

        for (key, data, options) in entries {
            let entry = self.new_entry(data, options.ttl);
            if options.persistent {
                persistent.push((self.storage_key(&key), serde_json::to_string(&entry)?));
            }
            self.insert_memory(key, entry);
        }
        self.counters.set(count);

        if !persistent.is_empty() {
            self.storage.multi_set(&persistent).await?;
        }
        Ok(())
    }

    /// Remove `key` from both tiers
    pub async fn delete(&self, key: &str) -> Result<()> {
        self.memory.lock().shift_remove(key);
        self.counters.delete(1);
        self.storage.remove_item(&self.storage_key(key)).await
    }

    /// Remove every key starting with `prefix` from both tiers. Returns how
    /// many distinct keys were removed.
    pub async fn invalidate_prefix(&self, prefix: &str) -> Result<usize> {
        let mut removed: HashSet<String> = {
            let mut memory = self.memory.lock();
            let keys: Vec<String> = memory
                .keys()
                .filter(|k| k.starts_with(prefix))
                .cloned()
                .collect();
            for key in &keys {
                memory.shift_remove(key);
            }
            keys.into_iter().collect()
        };

        let full_prefix = self.storage_key(prefix);
        let stored: Vec<String> = self
            .storage
            .get_all_keys()
            .await?
            .into_iter()
            .filter(|k| k.starts_with(&full_prefix))
            .collect();
        self.storage.multi_remove(&stored).await?;

        let base = self.settings.storage_prefix.len();
        removed.extend(stored.into_iter().map(|k| k[base..].to_string()));

        self.counters.delete(removed.len() as u64);
        tracing::debug!(prefix = %prefix, removed = removed.len(), "invalidated cache prefix");
        Ok(removed.len())
    }

    /// Drop both tiers and reset the counters
    pub async fn clear(&self) -> Result<()> {
        self.memory.lock().clear();
        let stored: Vec<String> = self
            .storage
            .get_all_keys()
            .await?
            .into_iter()
            .filter(|k| k.starts_with(&self.settings.storage_prefix))
            .collect();
        self.storage.multi_remove(&stored).await?;
        self.counters.reset();
        Ok(())
    }

    /// Delete entries past their stale window or from another version.
    /// Returns how many entries were removed across both tiers.
    pub async fn cleanup_expired(&self) -> Result<usize> {
        let now = self.clock.now_ms();

        let mut removed = {
            let mut memory = self.memory.lock();
            let before = memory.len();
            memory.retain(|_, entry| self.freshness(entry, now) != Freshness::Dead);
            before - memory.len()
        };

        let stored: Vec<String> = self
            .storage
            .get_all_keys()
            .await?
            .into_iter()
            .filter(|k| k.starts_with(&self.settings.storage_prefix))
            .collect();
        if stored.is_empty() {
            return Ok(removed);
        }

        let doomed: Vec<String> = self
            .storage
            .multi_get(&stored)
            .await?
            .into_iter()
            .filter(|(key, raw)| match raw {
                Some(raw) => self
                    .decode(key, raw)
                    .map_or(true, |entry| self.freshness(&entry, now) == Freshness::Dead),
                None => false,
            })
            .map(|(key, _)| key)
            .collect();

        removed += doomed.len();
        self.storage.multi_remove(&doomed).await?;

        if removed > 0 {
            tracing::debug!(removed, "cache expiry sweep");
        }
        Ok(removed)
    }

    /// Run [`cleanup_expired`](Self::cleanup_expired) every `interval` until
    /// the cache is dropped
    pub fn spawn_expiry_sweep(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let cache: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(cache) = cache.upgrade() else {
                    break;
                };
                if let Err(e) = cache.cleanup_expired().await {
                    tracing::warn!(error = %e, "cache expiry sweep failed");
                }
            }
        })
    }

    /// Items currently held in memory
    pub fn memory_len(&self) -> usize {
        self.memory.lock().len()
    }

    /// Memory keys, oldest insertion first
    pub fn memory_keys(&self) -> Vec<String> {
        self.memory.lock().keys().cloned().collect()
    }

    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot(self.memory_len())
    }
}
