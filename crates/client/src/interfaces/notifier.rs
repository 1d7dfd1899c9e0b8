//! User-facing error notices

use crate::client::ApiClient;
use crate::outcome::ApiOutcome;
use crate::request::ApiRequest;
use ledgerline_core::{ErrorCategory, Result};
use std::fmt::{self, Debug};

/// Re-issues the request that produced a notice
#[derive(Clone)]
pub struct RetryAction {
    client: ApiClient,
    request: ApiRequest,
}

impl RetryAction {
    pub(crate) fn new(client: ApiClient, request: ApiRequest) -> Self {
        Self { client, request }
    }

    pub fn request(&self) -> &ApiRequest {
        &self.request
    }

    /// Send the request again through the full resilience pipeline
    pub async fn run(self) -> Result<ApiOutcome> {
        self.client.request(self.request).await
    }
}

impl Debug for RetryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryAction")
            .field("method", &self.request.method())
            .field("path", &self.request.path())
            .finish()
    }
}

/// What the UI should show for a surfaced failure
#[derive(Debug, Clone)]
pub struct UserNotice {
    pub title: String,
    pub message: String,
    pub category: ErrorCategory,
    pub correlation_id: String,
    /// Present when trying again could plausibly succeed
    pub retry: Option<RetryAction>,
}

/// Toast/alert sink. Rendering is up to the implementation.
pub trait ErrorNotifier: Send + Sync + Debug {
    fn notify(&self, notice: UserNotice);
}

/// Writes notices to the log instead of showing them
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl ErrorNotifier for TracingNotifier {
    fn notify(&self, notice: UserNotice) {
        tracing::warn!(
            category = %notice.category,
            correlation_id = %notice.correlation_id,
            retryable = notice.retry.is_some(),
            "{}: {}",
            notice.title,
            notice.message
        );
    }
}
