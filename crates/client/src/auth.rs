//! Access token refresh
//!
//! [`TokenRefresher`] is installed as the `before_retry` hook of the
//! unauthorized retry policy: a 401 triggers one refresh, then one retry with
//! the new bearer token.

use crate::interfaces::{HttpTransport, SecureStore, TransportRequest};
use async_trait::async_trait;
use ledgerline_core::{Error, HttpMethod, Result, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
use ledgerline_utils::BeforeRetry;
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use zeroize::Zeroizing;

#[derive(Deserialize)]
struct RefreshResponse {
    access: String,
    refresh: Option<String>,
}

/// Exchanges the stored refresh token for a new access token
#[derive(Debug)]
pub struct TokenRefresher {
    transport: Arc<dyn HttpTransport>,
    store: Arc<dyn SecureStore>,
    url: String,
    timeout: Duration,
    in_flight: Mutex<()>,
}

impl TokenRefresher {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        store: Arc<dyn SecureStore>,
        url: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            store,
            url: url.into(),
            timeout,
            in_flight: Mutex::new(()),
        }
    }

    /// Current access token, if any
    pub async fn access_token(&self) -> Result<Option<Zeroizing<String>>> {
        Ok(self
            .store
            .get_secure_item(ACCESS_TOKEN_KEY)
            .await?
            .map(Zeroizing::new))
    }

    /// Refresh the token pair. Concurrent callers are serialized; when the
    /// server rejects the refresh token both tokens are removed.
    pub async fn refresh(&self) -> Result<()> {
        let _guard = self.in_flight.lock().await;

        let Some(refresh_token) = self
            .store
            .get_secure_item(REFRESH_TOKEN_KEY)
            .await?
            .map(Zeroizing::new)
        else {
            return Err(Error::authentication("no refresh token stored"));
        };

        let request = TransportRequest {
            method: HttpMethod::Post,
            url: self.url.clone(),
            params: None,
            body: Some(json!({ "refresh": refresh_token.as_str() })),
            headers: BTreeMap::new(),
            timeout: self.timeout,
        };
        let response = self.transport.send(&request).await?;

        if !response.is_success() {
            tracing::warn!(status = response.status, "token refresh rejected, signing out");
            self.store.remove_secure_item(ACCESS_TOKEN_KEY).await?;
            self.store.remove_secure_item(REFRESH_TOKEN_KEY).await?;
            return Err(Error::authentication(format!(
                "token refresh rejected with HTTP {}",
                response.status
            )));
        }

        let tokens: RefreshResponse = serde_json::from_value(response.body)
            .map_err(|e| Error::authentication(format!("malformed refresh response: {e}")))?;
        let access = Zeroizing::new(tokens.access);
        self.store.set_secure_item(ACCESS_TOKEN_KEY, &access).await?;
        if let Some(refresh) = tokens.refresh.map(Zeroizing::new) {
            self.store.set_secure_item(REFRESH_TOKEN_KEY, &refresh).await?;
        }

        tracing::info!("access token refreshed");
        Ok(())
    }
}

#[async_trait]
impl BeforeRetry for TokenRefresher {
    async fn before_retry(&self, attempt: u32, error: &Error) -> Result<()> {
        tracing::debug!(attempt, error = %error, "refreshing credentials before retry");
        self.refresh().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interfaces::{MemorySecureStore, TransportResponse};
    use parking_lot::Mutex as SyncMutex;

    #[derive(Debug)]
    struct FixedTransport {
        response: TransportResponse,
        seen: SyncMutex<Vec<TransportRequest>>,
    }

    #[async_trait]
    impl HttpTransport for FixedTransport {
        async fn send(&self, request: &TransportRequest) -> Result<TransportResponse> {
            self.seen.lock().push(request.clone());
            Ok(self.response.clone())
        }
    }

    fn refresher(
        response: TransportResponse,
    ) -> (TokenRefresher, Arc<FixedTransport>, Arc<MemorySecureStore>) {
        let transport = Arc::new(FixedTransport {
            response,
            seen: SyncMutex::new(Vec::new()),
        });
        let store = Arc::new(MemorySecureStore::new());
        let refresher = TokenRefresher::new(
            transport.clone(),
            store.clone(),
            "https://api.test/auth/refresh",
            Duration::from_secs(5),
        );
        (refresher, transport, store)
    }

    #[tokio::test]
    async fn stores_new_token_pair() {
        let (refresher, transport, store) =
            refresher(TransportResponse::new(200, json!({"access": "a2", "refresh": "r2"})));
        store.set_secure_item(REFRESH_TOKEN_KEY, "r1").await.unwrap();

        refresher.refresh().await.unwrap();

        assert_eq!(store.get_secure_item(ACCESS_TOKEN_KEY).await.unwrap().as_deref(), Some("a2"));
        assert_eq!(store.get_secure_item(REFRESH_TOKEN_KEY).await.unwrap().as_deref(), Some("r2"));
        let sent = transport.seen.lock();
        assert_eq!(sent[0].method, HttpMethod::Post);
        assert_eq!(sent[0].body, Some(json!({"refresh": "r1"})));
    }

    #[tokio::test]
    async fn missing_refresh_token_is_an_auth_error() {
        let (refresher, transport, _) = refresher(TransportResponse::new(200, json!({})));
        let err = refresher.refresh().await.unwrap_err();
        assert!(matches!(err, Error::Authentication { .. }));
        assert!(transport.seen.lock().is_empty());
    }

    #[tokio::test]
    async fn rejected_refresh_clears_tokens() {
        let (refresher, _, store) =
            refresher(TransportResponse::new(401, json!({"detail": "token expired"})));
        store.set_secure_item(ACCESS_TOKEN_KEY, "a1").await.unwrap();
        store.set_secure_item(REFRESH_TOKEN_KEY, "r1").await.unwrap();

        let err = refresher.before_retry(1, &Error::authentication("401")).await.unwrap_err();
        assert!(matches!(err, Error::Authentication { .. }));
        assert!(store.get_secure_item(ACCESS_TOKEN_KEY).await.unwrap().is_none());
        assert!(store.get_secure_item(REFRESH_TOKEN_KEY).await.unwrap().is_none());
    }
}
