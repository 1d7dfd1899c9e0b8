mod common;

use common::{config, harness, harness_with, minutes, Reply, BASE_URL};
use ledgerline_client::{ApiOutcome, ApiRequest, MemorySecureStore, OfflinePolicy, SecureStore};
use ledgerline_core::{
    Error, ErrorCategory, ACCESS_TOKEN_KEY, CORRELATION_ID_HEADER, REFRESH_TOKEN_KEY,
};
use ledgerline_utils::CircuitState;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn fresh_cache_entry_short_circuits_the_network() {
    let h = harness();
    h.transport.always(Reply::Status(200, json!({"id": 42, "name": "Tea"})));
    let request = ApiRequest::get("/products/42").cache_ttl(minutes(10));

    let first = h.client.request(request.clone()).await.unwrap();
    assert!(matches!(first, ApiOutcome::Fresh(_)));
    assert_eq!(h.transport.calls(), 1);

    h.clock.advance(minutes(5));
    match h.client.request(request).await.unwrap() {
        ApiOutcome::Cached { data, stale, age } => {
            assert_eq!(data["name"], json!("Tea"));
            assert!(!stale);
            assert_eq!(age, minutes(5));
        }
        other => panic!("expected cache hit, got {other:?}"),
    }
    assert_eq!(h.transport.calls(), 1);
}

#[tokio::test]
async fn bypass_cache_always_dispatches() {
    let h = harness();
    h.transport.always(Reply::Status(200, json!([1, 2, 3])));

    h.client.get("/products").await.unwrap();
    let outcome = h
        .client
        .request(ApiRequest::get("/products").bypass_cache())
        .await
        .unwrap();
    assert!(matches!(outcome, ApiOutcome::Fresh(_)));
    assert_eq!(h.transport.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn failing_endpoint_opens_its_circuit() {
    let h = harness();
    h.transport.always(Reply::Status(500, json!({"detail": "database unavailable"})));

    for _ in 0..5 {
        let err = h
            .client
            .post("/orders", json!({"sku": "tea-1", "qty": 1}))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), Some(500));
    }
    // One initial attempt plus two server-error retries per request
    assert_eq!(h.transport.calls(), 15);
    assert_eq!(h.client.breakers().state("POST:/orders"), CircuitState::Open);

    let err = h
        .client
        .post("/orders", json!({"sku": "tea-1", "qty": 1}))
        .await
        .unwrap_err();
    assert!(err.is_circuit_open());
    assert_eq!(h.transport.calls(), 15);
    assert_eq!(h.client.diagnostics().open_circuits, vec!["POST:/orders".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn payment_submission_is_never_retried() {
    let h = harness();
    h.transport.always(Reply::Network);

    let err = h
        .client
        .post("/payments", json!({"amount": 1999, "currency": "EUR"}))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Network { .. }));
    assert_eq!(h.transport.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn explicit_payment_flag_disables_retries() {
    let h = harness();
    h.transport.always(Reply::Timeout);

    let err = h
        .client
        .request(ApiRequest::post("/wallet/top-up", json!({"amount": 5})).payment_submission(true))
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    assert_eq!(h.transport.calls(), 1);
}

#[tokio::test]
async fn validation_errors_keep_field_detail_and_spare_the_breaker() {
    let h = harness();
    h.transport.always(Reply::Status(
        422,
        json!({"detail": "Invalid input", "errors": {"email": ["Enter a valid email address."]}}),
    ));

    let err = h
        .client
        .patch("/profile", json!({"email": "nope"}))
        .await
        .unwrap_err();

    assert_eq!(err.status_code(), Some(422));
    let fields = err.field_errors().unwrap();
    assert_eq!(fields["email"], vec!["Enter a valid email address.".to_string()]);
    assert_eq!(h.transport.calls(), 1);

    let stats = h.client.breakers().stats_for("PATCH:/profile").unwrap();
    assert_eq!(stats.state, CircuitState::Closed);
    assert_eq!(stats.failure_count, 0);
}

#[tokio::test]
async fn missing_resource_on_read_is_an_outcome() {
    let h = harness();
    h.transport.always(Reply::Status(404, json!({"detail": "Not found."})));

    let outcome = h.client.get("/products/999").await.unwrap();
    assert!(outcome.is_not_found());
    assert_eq!(h.transport.calls(), 1);
    assert_eq!(
        h.client.error_tracker().counts().get(ErrorCategory::NotFound.as_str()),
        Some(&1)
    );
}

#[tokio::test(start_paused = true)]
async fn server_error_falls_back_to_stale_cache() {
    let h = harness();
    h.transport
        .then(Reply::Status(200, json!({"balance": 120})));
    h.transport.always(Reply::Status(503, json!({"detail": "maintenance"})));

    let request = ApiRequest::get("/accounts/7/summary").cache_ttl(Duration::from_secs(1));
    h.client.request(request.clone()).await.unwrap();
    h.clock.advance(minutes(30));

    match h.client.request(request).await.unwrap() {
        ApiOutcome::Cached { data, stale, .. } => {
            assert_eq!(data, json!({"balance": 120}));
            assert!(stale);
        }
        other => panic!("expected stale fallback, got {other:?}"),
    }
    assert_eq!(h.transport.calls(), 1 + 3);

    let stats = h.client.correlation().stats();
    assert_eq!(stats.successful, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(h.client.error_tracker().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn open_circuit_serves_cached_reads() {
    let mut config = config();
    config.circuit_breaker.failure_threshold = 1;
    let h = harness_with(config, None);
    h.transport.then(Reply::Status(200, json!({"rate": 1.08})));
    h.transport.always(Reply::Network);

    let request = ApiRequest::get("/fx/eur-usd").cache_ttl(Duration::from_secs(1));
    h.client.request(request.clone()).await.unwrap();
    h.clock.advance(Duration::from_secs(5));

    // Four network attempts, then the stale copy
    let degraded = h.client.request(request.clone()).await.unwrap();
    assert!(matches!(degraded, ApiOutcome::Cached { stale: true, .. }));
    assert_eq!(h.transport.calls(), 5);
    assert_eq!(h.client.breakers().state("GET:/fx/eur-usd"), CircuitState::Open);

    let rejected = h.client.request(request).await.unwrap();
    assert!(matches!(rejected, ApiOutcome::CircuitOpen { .. }));
    assert_eq!(rejected.data().unwrap()["rate"], json!(1.08));
    assert_eq!(h.transport.calls(), 5);
}

#[tokio::test]
async fn offline_reads_come_from_cache() {
    let h = harness();
    h.transport.always(Reply::Status(200, json!({"items": []})));
    h.client
        .request(ApiRequest::get("/orders").cache_ttl(Duration::from_secs(60)))
        .await
        .unwrap();
    h.clock.advance(minutes(10));
    h.network.set_connected(false);

    let outcome = h.client.get("/orders").await.unwrap();
    match outcome {
        ApiOutcome::Offline { age, .. } => assert_eq!(age, minutes(10)),
        other => panic!("expected offline outcome, got {other:?}"),
    }

    let err = h.client.get("/products").await.unwrap_err();
    assert!(matches!(err, Error::Offline { .. }));
    assert_eq!(h.transport.calls(), 1);

    let records = h.client.error_tracker().recent(1);
    assert_eq!(records[0].network_state, ledgerline_client::NetworkState::Offline);
}

#[tokio::test(start_paused = true)]
async fn waits_for_connectivity_when_asked() {
    let h = harness();
    h.transport.always(Reply::Status(201, json!({"id": "ord_1"})));
    h.network.set_connected(false);

    let network = h.network.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(2)).await;
        network.set_connected(true);
    });

    let outcome = h
        .client
        .request(
            ApiRequest::post("/orders", json!({"sku": "tea-1"}))
                .offline_policy(OfflinePolicy::WaitForConnection(Duration::from_secs(10))),
        )
        .await
        .unwrap();
    assert!(matches!(outcome, ApiOutcome::Fresh(ref r) if r.status == 201));
}

#[tokio::test(start_paused = true)]
async fn waiting_for_connectivity_times_out() {
    let h = harness();
    h.network.set_connected(false);

    let err = h
        .client
        .request(
            ApiRequest::post("/orders", json!({}))
                .offline_policy(OfflinePolicy::WaitForConnection(Duration::from_secs(3))),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Offline { .. }));
    assert_eq!(h.transport.calls(), 0);
}

async fn signed_in_store() -> Arc<MemorySecureStore> {
    let store = Arc::new(MemorySecureStore::new());
    store.set_secure_item(ACCESS_TOKEN_KEY, "a1").await.unwrap();
    store.set_secure_item(REFRESH_TOKEN_KEY, "r1").await.unwrap();
    store
}

#[tokio::test(start_paused = true)]
async fn expired_token_is_refreshed_once() {
    let store = signed_in_store().await;
    let h = harness_with(config(), Some(store.clone()));
    h.transport
        .then(Reply::Status(401, json!({"detail": "Token expired"})))
        .then(Reply::Status(200, json!({"access": "a2", "refresh": "r2"})))
        .then(Reply::Status(200, json!({"name": "Ada"})));

    let outcome = h.client.get("/me").await.unwrap();
    assert_eq!(outcome.data().unwrap()["name"], json!("Ada"));

    let requests = h.transport.requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[0].headers["Authorization"], "Bearer a1");
    assert_eq!(requests[1].url, format!("{BASE_URL}/auth/refresh"));
    assert_eq!(requests[2].headers["Authorization"], "Bearer a2");
    assert_eq!(
        store.get_secure_item(REFRESH_TOKEN_KEY).await.unwrap().as_deref(),
        Some("r2")
    );
}

#[tokio::test(start_paused = true)]
async fn rejected_refresh_surfaces_authentication_error() {
    let store = signed_in_store().await;
    let h = harness_with(config(), Some(store.clone()));
    h.transport
        .then(Reply::Status(401, json!({"detail": "Token expired"})))
        .then(Reply::Status(401, json!({"detail": "Refresh token blacklisted"})));

    let err = h.client.get("/me").await.unwrap_err();
    assert!(matches!(err, Error::Authentication { .. }));
    assert_eq!(h.transport.calls(), 2);
    assert!(store.get_secure_item(ACCESS_TOKEN_KEY).await.unwrap().is_none());

    let counts = h.client.error_tracker().counts();
    assert_eq!(counts.get(ErrorCategory::Unauthorized.as_str()), Some(&1));
    assert_eq!(counts.len(), 1);

    let notices = h.notifier.notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].category, ErrorCategory::Unauthorized);
    assert_eq!(notices[0].title, "Session expired");
    assert!(notices[0].retry.is_none());
}

#[tokio::test(start_paused = true)]
async fn unreachable_refresh_endpoint_surfaces_network_error() {
    let store = signed_in_store().await;
    let h = harness_with(config(), Some(store.clone()));
    h.transport
        .then(Reply::Status(401, json!({"detail": "Token expired"})))
        .then(Reply::Network);

    let err = h.client.get("/me").await.unwrap_err();
    assert!(
        matches!(err, Error::Network { ref endpoint, .. } if endpoint.ends_with("/auth/refresh"))
    );
    assert_eq!(h.transport.calls(), 2);

    // Tokens survive a refresh that never reached the server
    assert!(store.get_secure_item(REFRESH_TOKEN_KEY).await.unwrap().is_some());
    assert_eq!(
        h.client.error_tracker().counts().get(ErrorCategory::NetworkError.as_str()),
        Some(&1)
    );
    let stats = h.client.breakers().stats_for("GET:/me").unwrap();
    assert_eq!(stats.failure_count, 1);
    assert_eq!(stats.state, CircuitState::Closed);
}

#[tokio::test]
async fn unauthorized_without_token_refresh_is_not_retried() {
    let h = harness();
    h.transport.always(Reply::Status(401, json!({"detail": "Authentication required"})));

    let err = h.client.get("/me").await.unwrap_err();
    assert!(
        matches!(err, Error::Authentication { ref message } if message == "Authentication required")
    );
    assert_eq!(h.transport.calls(), 1);
    assert_eq!(
        h.client.error_tracker().counts().get(ErrorCategory::Unauthorized.as_str()),
        Some(&1)
    );
}

#[tokio::test]
async fn requests_carry_correlation_headers() {
    let h = harness();
    h.transport.always(Reply::Status(200, json!({})));

    let outcome = h.client.get("/products/42").await.unwrap();
    let ApiOutcome::Fresh(response) = outcome else {
        panic!("expected fresh response");
    };

    let sent = &h.transport.requests()[0];
    assert_eq!(sent.headers[CORRELATION_ID_HEADER], response.correlation_id);
    assert_eq!(sent.url, format!("{BASE_URL}/products/42"));
    assert_eq!(sent.timeout, Duration::from_secs(15));

    let record = h.client.correlation().get(&response.correlation_id).unwrap();
    assert_eq!(record.endpoint, "GET:/products/:id");
    assert_eq!(record.success, Some(true));
}

#[tokio::test]
async fn payment_endpoints_get_the_longer_timeout() {
    let h = harness();
    h.transport.always(Reply::Status(200, json!({"status": "settled"})));

    h.client.get("/payments/pay_123").await.unwrap();
    assert_eq!(h.transport.requests()[0].timeout, Duration::from_secs(45));
}

#[tokio::test(start_paused = true)]
async fn surfaced_errors_reach_the_notifier_with_a_retry() {
    let h = harness();
    h.transport
        .then(Reply::Status(502, json!({})))
        .then(Reply::Status(502, json!({})))
        .then(Reply::Status(502, json!({})))
        .then(Reply::Status(201, json!({"id": "ord_2"})));

    let err = h.client.post("/orders", json!({"sku": "tea-2"})).await.unwrap_err();
    assert_eq!(err.status_code(), Some(502));

    let notices = h.notifier.notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].category, ErrorCategory::ServerError);
    let retry = notices[0].retry.clone().expect("server errors are retryable");
    assert_eq!(retry.request().path(), "/orders");

    let outcome = retry.run().await.unwrap();
    assert!(matches!(outcome, ApiOutcome::Fresh(_)));
    assert_eq!(h.client.error_tracker().unrecovered(), 0);
}

#[tokio::test]
async fn client_faults_are_notified_without_retry_and_silent_requests_are_not() {
    let h = harness();
    h.transport.always(Reply::Status(403, json!({"detail": "Forbidden"})));

    h.client.delete("/accounts/7").await.unwrap_err();
    h.client
        .request(ApiRequest::delete("/accounts/7").silent())
        .await
        .unwrap_err();

    let notices = h.notifier.notices();
    assert_eq!(notices.len(), 1);
    assert!(notices[0].retry.is_none());
    assert_eq!(notices[0].title, ErrorCategory::Forbidden.title());
}

#[tokio::test(start_paused = true)]
async fn diagnostics_cover_every_component() {
    let h = harness();
    h.transport
        .then(Reply::Status(200, json!({"id": 1})))
        .then(Reply::Status(404, json!({})));

    h.client.get("/products/1").await.unwrap();
    h.client.get("/products/1").await.unwrap();
    h.client.get("/products/2").await.unwrap();

    let diagnostics = h.client.diagnostics();
    assert_eq!(diagnostics.breakers.len(), 1);
    assert_eq!(diagnostics.cache.hits, 1);
    assert_eq!(diagnostics.correlation.completed, 3);
    assert_eq!(diagnostics.error_counts.get("NOT_FOUND"), Some(&1));
    assert_eq!(diagnostics.recent_errors.len(), 1);
    assert!(serde_json::to_string(&diagnostics).is_ok());
}

#[tokio::test]
async fn error_log_is_restored_by_a_new_client() {
    let h = harness();
    h.transport.always(Reply::Status(404, json!({})));
    h.client.get("/products/404").await.unwrap();

    let restarted = ledgerline_client::ApiClient::builder(config())
        .transport(h.transport.clone())
        .storage(h.storage.clone())
        .build()
        .unwrap();
    assert_eq!(restarted.restore_error_log().await.unwrap(), 1);
}

#[tokio::test]
async fn concurrent_requests_get_distinct_correlation_records() {
    let h = harness();
    h.transport.always(Reply::Status(200, json!({"ok": true})));

    let requests = (0..8).map(|i| {
        h.client
            .request(ApiRequest::get(format!("/products/{i}")).no_cache())
    });
    let outcomes = futures::future::join_all(requests).await;

    assert!(outcomes.iter().all(|o| matches!(o, Ok(ApiOutcome::Fresh(_)))));
    let ids: std::collections::BTreeSet<_> = h
        .transport
        .requests()
        .iter()
        .map(|r| r.headers[CORRELATION_ID_HEADER].clone())
        .collect();
    assert_eq!(ids.len(), 8);
    assert_eq!(h.client.correlation().stats().successful, 8);
    assert_eq!(h.client.breakers().len(), 1);
}
