//! Request orchestration
//!
//! [`ApiClient::request`] runs one request through the full pipeline:
//!
//! 1. open a correlation record;
//! 2. when offline, answer from cache or apply the request's [`OfflinePolicy`];
//! 3. answer GETs from a fresh cache entry without touching the network;
//! 4. otherwise send through the endpoint's circuit breaker, retrying the
//!    first real failure with the policy the selector picks for it;
//! 5. cache successful GETs, or turn a terminal failure into a fallback
//!    outcome or a surfaced error.
//!
//! Client-fault responses (4xx other than 429) are returned to the caller but
//! do not count against the endpoint's breaker.

use crate::auth::TokenRefresher;
use crate::correlation::{CorrelationManager, CorrelationStats};
use crate::error_tracker::{ErrorContext, ErrorRecord, ErrorTracker, NetworkState};
use crate::interfaces::{
    ErrorNotifier, HttpTransport, NetworkMonitor, RetryAction, SecureStore, TracingNotifier,
    TransportRequest, UserNotice, WatchNetworkMonitor,
};
use crate::outcome::{ApiOutcome, ApiResponse};
use crate::request::{ApiRequest, OfflinePolicy};
use crate::transport::ReqwestTransport;
use ledgerline_cache::{CacheStats, MemoryStorage, PersistentStorage, ResponseCache};
use ledgerline_config::{ResilienceConfig, ResilienceConfigLoader};
use ledgerline_core::{
    classify, suggest_recovery, system_clock, Endpoint, Error, ErrorCategory, Result, ResultExt,
    SharedClock,
};
use ledgerline_utils::tracing::{cache_event, request_completed, request_span};
use ledgerline_utils::{
    CircuitBreakerConfig, CircuitBreakerManager, CircuitBreakerStats, RetryStrategySelector,
};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::Instrument;

const RECENT_ERRORS_IN_DIAGNOSTICS: usize = 20;

/// Result of the breaker-guarded part of a request
enum Attempt {
    Done(ApiOutcome),
    /// The server rejected the request itself; not an endpoint health signal
    Rejected(Error),
}

/// Point-in-time view of every resilience component
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostics {
    pub session_id: String,
    pub breakers: Vec<CircuitBreakerStats>,
    pub open_circuits: Vec<String>,
    pub cache: CacheStats,
    pub correlation: CorrelationStats,
    pub error_counts: BTreeMap<String, usize>,
    pub recent_errors: Vec<ErrorRecord>,
}

struct Inner {
    config: ResilienceConfig,
    base_url: String,
    transport: Arc<dyn HttpTransport>,
    cache: Arc<ResponseCache>,
    breakers: CircuitBreakerManager,
    selector: RetryStrategySelector,
    correlation: Arc<CorrelationManager>,
    tracker: ErrorTracker,
    network: Arc<dyn NetworkMonitor>,
    notifier: Arc<dyn ErrorNotifier>,
    tokens: Option<Arc<TokenRefresher>>,
}

/// Resilient API client. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url)
            .field("session_id", &self.inner.correlation.session_id())
            .field("breakers", &self.inner.breakers.len())
            .field("token_refresh", &self.inner.tokens.is_some())
            .finish()
    }
}

impl ApiClient {
    pub fn builder(config: ResilienceConfig) -> ApiClientBuilder {
        ApiClientBuilder::new(config)
    }

    /// Send a request through the resilience pipeline
    pub async fn request(&self, request: ApiRequest) -> Result<ApiOutcome> {
        let endpoint = request.endpoint();
        let key = endpoint.key();
        let correlation_id = self
            .inner
            .correlation
            .track_request(request.method(), &key);
        let span = request_span(request.method().as_str(), &key, &correlation_id);

        let result = self
            .run(&request, &endpoint, &key, &correlation_id)
            .instrument(span)
            .await;

        let success = result.as_ref().is_ok_and(|outcome| !outcome.is_degraded());
        self.inner
            .correlation
            .complete_request(&correlation_id, success);
        if let Ok(ApiOutcome::Fresh(_)) = &result {
            self.inner.tracker.mark_recovered(&key).await;
        }

        let duration_ms = self
            .inner
            .correlation
            .get(&correlation_id)
            .and_then(|record| record.duration_ms)
            .unwrap_or_default();
        let status = match &result {
            Ok(ApiOutcome::Fresh(response)) => Some(response.status),
            Ok(ApiOutcome::NotFound) => Some(404),
            Ok(_) => None,
            Err(error) => error.status_code(),
        };
        request_completed(&key, duration_ms, status, success);

        result
    }

    pub async fn get(&self, path: &str) -> Result<ApiOutcome> {
        self.request(ApiRequest::get(path)).await
    }

    pub async fn post(&self, path: &str, body: Value) -> Result<ApiOutcome> {
        self.request(ApiRequest::post(path, body)).await
    }

    pub async fn put(&self, path: &str, body: Value) -> Result<ApiOutcome> {
        self.request(ApiRequest::put(path, body)).await
    }

    pub async fn patch(&self, path: &str, body: Value) -> Result<ApiOutcome> {
        self.request(ApiRequest::patch(path, body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiOutcome> {
        self.request(ApiRequest::delete(path)).await
    }

    async fn run(
        &self,
        request: &ApiRequest,
        endpoint: &Endpoint,
        key: &str,
        correlation_id: &str,
    ) -> Result<ApiOutcome> {
        let inner = &self.inner;
        let cache_key = request.cache_key();
        let cache_policy = request.cache_policy();

        if !inner.network.is_connected() {
            if request.is_read() && cache_policy.uses_cache() {
                if let Some(hit) = inner.cache.get(&cache_key, true).await {
                    tracing::info!(
                        age_ms = hit.age.as_millis() as u64,
                        "offline, serving cached response"
                    );
                    return Ok(ApiOutcome::Offline {
                        data: hit.data,
                        age: hit.age,
                    });
                }
            }
            if let Err(error) = self.wait_for_connection(request, key).await {
                return self
                    .fail(request, key, &cache_key, correlation_id, error)
                    .await;
            }
        }

        if request.is_read() && cache_policy.read {
            let hit = inner.cache.get(&cache_key, false).await;
            cache_event(
                &cache_key,
                hit.is_some(),
                hit.as_ref().map_or("none", |hit| hit.source.as_str()),
            );
            if let Some(hit) = hit {
                return Ok(ApiOutcome::Cached {
                    data: hit.data,
                    stale: false,
                    age: hit.age,
                });
            }
        }

        let attempt = inner
            .breakers
            .execute_with_fallback(
                key,
                || self.attempt(request, endpoint, &cache_key, correlation_id),
                |rejection| self.circuit_fallback(request, &cache_key, rejection),
            )
            .await;

        match attempt {
            Ok(Attempt::Done(outcome)) => Ok(outcome),
            Ok(Attempt::Rejected(error)) | Err(error) => {
                self.fail(request, key, &cache_key, correlation_id, error)
                    .await
            }
        }
    }

    /// The breaker-guarded call: send once, then retry with the policy chosen
    /// from the real failure. Only endpoint health failures are returned as
    /// `Err` so that they, and nothing else, trip the breaker.
    async fn attempt(
        &self,
        request: &ApiRequest,
        endpoint: &Endpoint,
        cache_key: &str,
        correlation_id: &str,
    ) -> Result<Attempt> {
        let result = match self.send(request, endpoint, correlation_id).await {
            Ok(response) => Ok(response),
            Err(first) => {
                self.inner
                    .selector
                    .select(&first, endpoint)
                    .resume(first, || self.send(request, endpoint, correlation_id))
                    .await
            }
        };

        match result {
            Ok(response) => {
                let cache_policy = request.cache_policy();
                if request.is_read() && cache_policy.write {
                    if let Err(e) = self
                        .inner
                        .cache
                        .set(cache_key, response.data.clone(), cache_policy.set_options())
                        .await
                    {
                        tracing::warn!(key = %cache_key, error = %e, "failed to cache response");
                    }
                }
                Ok(Attempt::Done(ApiOutcome::Fresh(response)))
            }
            Err(error) if classify(&error).is_retryable() => Err(error),
            Err(error) => Ok(Attempt::Rejected(error)),
        }
    }

    async fn circuit_fallback(
        &self,
        request: &ApiRequest,
        cache_key: &str,
        rejection: Error,
    ) -> Result<Attempt> {
        if request.is_read() && request.cache_policy().uses_cache() {
            if let Some(hit) = self.inner.cache.get(cache_key, true).await {
                tracing::info!(key = %cache_key, "circuit open, serving cached response");
                return Ok(Attempt::Done(ApiOutcome::CircuitOpen {
                    data: hit.data,
                    age: hit.age,
                }));
            }
        }
        Err(rejection)
    }

    /// One transport round trip with correlation and auth headers
    async fn send(
        &self,
        request: &ApiRequest,
        endpoint: &Endpoint,
        correlation_id: &str,
    ) -> Result<ApiResponse> {
        let inner = &self.inner;
        let timeout = request.request_timeout().unwrap_or_else(|| {
            if endpoint.is_payment() {
                inner.config.http.payment_timeout()
            } else {
                inner.config.http.timeout()
            }
        });

        let mut headers = request.headers().clone();
        for (name, value) in inner.correlation.headers(correlation_id) {
            headers.insert(name.to_string(), value);
        }
        if let Some(tokens) = &inner.tokens {
            if let Some(token) = tokens.access_token().await? {
                headers.insert("Authorization".to_string(), format!("Bearer {}", token.as_str()));
            }
        }

        let url = self.url_for(request.path());
        let transport_request = TransportRequest {
            method: request.method(),
            url: url.clone(),
            params: request.params_value().cloned(),
            body: request.body_value().cloned(),
            headers,
            timeout,
        };

        let response = inner
            .transport
            .send(&transport_request)
            .await?
            .error_for_status(request.method(), &url)?;

        Ok(ApiResponse {
            status: response.status,
            headers: response.headers,
            data: response.body,
            correlation_id: correlation_id.to_string(),
        })
    }

    async fn wait_for_connection(&self, request: &ApiRequest, key: &str) -> Result<()> {
        match request.offline() {
            OfflinePolicy::Fail => Err(Error::offline(key)),
            OfflinePolicy::WaitForConnection(timeout) => {
                tracing::info!(
                    timeout_ms = timeout.as_millis() as u64,
                    "offline, waiting for connection"
                );
                let mut status = self.inner.network.subscribe();
                let connected =
                    tokio::time::timeout(timeout, status.wait_for(|connected| *connected))
                        .await
                        .is_ok_and(|changed| changed.is_ok());
                if connected {
                    Ok(())
                } else {
                    Err(Error::offline(key))
                }
            }
        }
    }

    /// Record a terminal failure, then answer from a fallback or surface it
    async fn fail(
        &self,
        request: &ApiRequest,
        key: &str,
        cache_key: &str,
        correlation_id: &str,
        error: Error,
    ) -> Result<ApiOutcome> {
        let inner = &self.inner;
        let category = classify(&error);
        let network_state = if inner.network.is_connected() {
            NetworkState::Online
        } else {
            NetworkState::Offline
        };
        inner
            .tracker
            .record(
                &error,
                ErrorContext {
                    endpoint: key,
                    method: request.method(),
                    correlation_id: Some(correlation_id),
                    network_state,
                },
            )
            .await;

        if request.is_read() {
            if category == ErrorCategory::NotFound {
                return Ok(ApiOutcome::NotFound);
            }
            let transient = matches!(
                category,
                ErrorCategory::NetworkError | ErrorCategory::ServerError
            );
            if transient && request.cache_policy().uses_cache() {
                if let Some(hit) = inner.cache.get(cache_key, true).await {
                    tracing::info!(
                        key = %cache_key,
                        stale = hit.stale,
                        "request failed, serving cached response"
                    );
                    return Ok(ApiOutcome::Cached {
                        data: hit.data,
                        stale: hit.stale,
                        age: hit.age,
                    });
                }
            }
        }

        let error = match error {
            Error::Http {
                status: 401,
                message,
                ..
            } => Error::authentication(message),
            other => other,
        };

        if request.notifies() {
            let retry = (category.is_retryable() || error.is_circuit_open())
                .then(|| RetryAction::new(self.clone(), request.clone()));
            let message = if error.is_circuit_open() {
                suggest_recovery(&error)
            } else {
                category.user_message().to_string()
            };
            inner.notifier.notify(UserNotice {
                title: category.title().to_string(),
                message,
                category,
                correlation_id: correlation_id.to_string(),
                retry,
            });
        }

        Err(error)
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!(
            "{}/{}",
            self.inner.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.inner.cache
    }

    pub fn breakers(&self) -> &CircuitBreakerManager {
        &self.inner.breakers
    }

    pub fn correlation(&self) -> &CorrelationManager {
        &self.inner.correlation
    }

    pub fn error_tracker(&self) -> &ErrorTracker {
        &self.inner.tracker
    }

    pub fn config(&self) -> &ResilienceConfig {
        &self.inner.config
    }

    /// Load the error log persisted by a previous session
    pub async fn restore_error_log(&self) -> Result<usize> {
        self.inner.tracker.restore().await
    }

    /// Start the periodic cache and correlation sweeps. The tasks stop on
    /// their own once every clone of the client is dropped.
    pub fn spawn_maintenance(&self) -> Vec<JoinHandle<()>> {
        let config = &self.inner.config;
        vec![
            self.inner
                .cache
                .spawn_expiry_sweep(Duration::from_millis(config.cache.sweep_interval_ms)),
            self.inner
                .correlation
                .spawn_sweep(Duration::from_millis(config.correlation.sweep_interval_ms)),
        ]
    }

    pub fn diagnostics(&self) -> Diagnostics {
        let inner = &self.inner;
        Diagnostics {
            session_id: inner.correlation.session_id().to_string(),
            breakers: inner.breakers.stats(),
            open_circuits: inner.breakers.open_circuits(),
            cache: inner.cache.stats(),
            correlation: inner.correlation.stats(),
            error_counts: inner.tracker.counts(),
            recent_errors: inner.tracker.recent(RECENT_ERRORS_IN_DIAGNOSTICS),
        }
    }
}

/// Composition root for [`ApiClient`]. Every collaborator has a default.
pub struct ApiClientBuilder {
    config: ResilienceConfig,
    transport: Option<Arc<dyn HttpTransport>>,
    storage: Option<Arc<dyn PersistentStorage>>,
    network: Option<Arc<dyn NetworkMonitor>>,
    notifier: Option<Arc<dyn ErrorNotifier>>,
    secure_store: Option<Arc<dyn SecureStore>>,
    clock: Option<SharedClock>,
}

impl ApiClientBuilder {
    pub fn new(config: ResilienceConfig) -> Self {
        Self {
            config,
            transport: None,
            storage: None,
            network: None,
            notifier: None,
            secure_store: None,
            clock: None,
        }
    }

    /// Start from the config file and `LEDGERLINE_*` environment
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(ResilienceConfigLoader::load()?.config))
    }

    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    #[must_use]
    pub fn storage(mut self, storage: Arc<dyn PersistentStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    #[must_use]
    pub fn network_monitor(mut self, network: Arc<dyn NetworkMonitor>) -> Self {
        self.network = Some(network);
        self
    }

    #[must_use]
    pub fn notifier(mut self, notifier: Arc<dyn ErrorNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Enables bearer tokens and refresh-on-401
    #[must_use]
    pub fn secure_store(mut self, store: Arc<dyn SecureStore>) -> Self {
        self.secure_store = Some(store);
        self
    }

    #[must_use]
    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Result<ApiClient> {
        let config = self.config;
        config.validate()?;
        let base_url = url::Url::parse(&config.http.base_url)
            .config_context(|| format!("invalid http.base_url '{}'", config.http.base_url))?
            .to_string();

        let transport: Arc<dyn HttpTransport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new()?),
        };
        let storage = self
            .storage
            .unwrap_or_else(|| Arc::new(MemoryStorage::new()));
        let clock = self.clock.unwrap_or_else(system_clock);

        let tokens = self.secure_store.map(|store| {
            let refresh_url = format!(
                "{}/{}",
                base_url.trim_end_matches('/'),
                config.http.refresh_path.trim_start_matches('/')
            );
            Arc::new(TokenRefresher::new(
                Arc::clone(&transport),
                store,
                refresh_url,
                config.http.timeout(),
            ))
        });
        let selector = match &tokens {
            Some(tokens) => RetryStrategySelector::with_token_refresh(tokens.clone()),
            None => RetryStrategySelector::new(),
        }
        .with_clock(Arc::clone(&clock));

        let correlation = Arc::new(CorrelationManager::with_clock(
            &config.correlation,
            Arc::clone(&clock),
        ));
        let tracker = ErrorTracker::with_clock(
            config.error_tracker.clone(),
            correlation.session_id(),
            Arc::clone(&storage),
            Arc::clone(&clock),
        );
        let cache = Arc::new(ResponseCache::with_clock(
            config.cache.clone(),
            storage,
            Arc::clone(&clock),
        ));
        let breakers = CircuitBreakerManager::with_clock(
            CircuitBreakerConfig::from(&config.circuit_breaker),
            clock,
        );

        tracing::debug!(
            base_url = %base_url,
            session_id = correlation.session_id(),
            token_refresh = tokens.is_some(),
            "api client ready"
        );

        Ok(ApiClient {
            inner: Arc::new(Inner {
                config,
                base_url,
                transport,
                cache,
                breakers,
                selector,
                correlation,
                tracker,
                network: self
                    .network
                    .unwrap_or_else(|| Arc::new(WatchNetworkMonitor::default())),
                notifier: self.notifier.unwrap_or_else(|| Arc::new(TracingNotifier)),
                tokens,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interfaces::TransportResponse;
    use async_trait::async_trait;

    #[derive(Debug)]
    struct Unreachable;

    #[async_trait]
    impl HttpTransport for Unreachable {
        async fn send(&self, request: &TransportRequest) -> Result<TransportResponse> {
            Err(Error::network(request.url.clone(), "unreachable"))
        }
    }

    fn client(base_url: &str) -> Result<ApiClient> {
        let mut config = ResilienceConfig::default();
        config.http.base_url = base_url.to_string();
        ApiClient::builder(config)
            .transport(Arc::new(Unreachable))
            .build()
    }

    #[test]
    fn urls_join_base_and_path() {
        let client = client("https://api.ledgerline.test/v1/").unwrap();
        assert_eq!(
            client.url_for("/products/42"),
            "https://api.ledgerline.test/v1/products/42"
        );
        assert_eq!(
            client.url_for("https://cdn.ledgerline.test/a"),
            "https://cdn.ledgerline.test/a"
        );
    }

    #[test]
    fn invalid_base_url_is_a_configuration_error() {
        let err = client("not a url").unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }
}
