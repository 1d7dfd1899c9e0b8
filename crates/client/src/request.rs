//! Request description

use ledgerline_cache::{cache_key, SetOptions};
use ledgerline_core::{Endpoint, HttpMethod};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// How a GET uses the response cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// Answer from a fresh cache entry without dispatching
    pub read: bool,
    /// Store successful responses
    pub write: bool,
    /// TTL for stored responses; the cache default when `None`
    pub ttl: Option<Duration>,
    /// Also write stored responses to persistent storage
    pub persistent: bool,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            read: true,
            write: true,
            ttl: None,
            persistent: true,
        }
    }
}

impl CachePolicy {
    /// Whether the cache is involved at all, including stale fallbacks
    pub fn uses_cache(&self) -> bool {
        self.read || self.write
    }

    pub(crate) fn set_options(&self) -> SetOptions {
        SetOptions {
            ttl: self.ttl,
            persistent: self.persistent,
        }
    }
}

/// What to do when the device is offline and no cached copy can answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OfflinePolicy {
    /// Fail immediately with `Error::Offline`
    #[default]
    Fail,
    /// Wait up to the given time for connectivity, then dispatch
    WaitForConnection(Duration),
}

/// A request to send through the client
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    method: HttpMethod,
    path: String,
    params: Option<Value>,
    body: Option<Value>,
    headers: BTreeMap<String, String>,
    cache: CachePolicy,
    offline: OfflinePolicy,
    payment_submission: Option<bool>,
    timeout: Option<Duration>,
    notify: bool,
}

impl ApiRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            params: None,
            body: None,
            headers: BTreeMap::new(),
            cache: CachePolicy::default(),
            offline: OfflinePolicy::default(),
            payment_submission: None,
            timeout: None,
            notify: true,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(HttpMethod::Post, path).body(body)
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self::new(HttpMethod::Put, path).body(body)
    }

    pub fn patch(path: impl Into<String>, body: Value) -> Self {
        Self::new(HttpMethod::Patch, path).body(body)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    #[must_use]
    pub fn params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }

    #[must_use]
    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Skip the fresh cache read; the response is still stored
    #[must_use]
    pub fn bypass_cache(mut self) -> Self {
        self.cache.read = false;
        self
    }

    /// Neither read nor store
    #[must_use]
    pub fn no_cache(mut self) -> Self {
        self.cache.read = false;
        self.cache.write = false;
        self
    }

    #[must_use]
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache.ttl = Some(ttl);
        self
    }

    #[must_use]
    pub fn memory_only_cache(mut self) -> Self {
        self.cache.persistent = false;
        self
    }

    #[must_use]
    pub fn offline_policy(mut self, policy: OfflinePolicy) -> Self {
        self.offline = policy;
        self
    }

    /// Mark (or unmark) this call as moving money. Unmarked calls are judged
    /// by method and path.
    #[must_use]
    pub fn payment_submission(mut self, submission: bool) -> Self {
        self.payment_submission = Some(submission);
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Do not send failures of this request to the notifier
    #[must_use]
    pub fn silent(mut self) -> Self {
        self.notify = false;
        self
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn params_value(&self) -> Option<&Value> {
        self.params.as_ref()
    }

    pub fn body_value(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn cache_policy(&self) -> CachePolicy {
        self.cache
    }

    pub fn offline(&self) -> OfflinePolicy {
        self.offline
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn notifies(&self) -> bool {
        self.notify
    }

    pub fn is_read(&self) -> bool {
        self.method == HttpMethod::Get
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.method, self.path.as_str())
            .with_payment_submission(self.payment_submission)
    }

    pub fn cache_key(&self) -> String {
        cache_key(self.method, &self.path, self.params.as_ref())
    }
}
