#![allow(dead_code)]

use async_trait::async_trait;
use ledgerline_cache::MemoryStorage;
use ledgerline_client::{
    ApiClient, ErrorNotifier, HttpTransport, MemorySecureStore, TransportRequest,
    TransportResponse, UserNotice, WatchNetworkMonitor,
};
use ledgerline_config::ResilienceConfig;
use ledgerline_core::{Error, ManualClock, Result};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

pub const BASE_URL: &str = "https://api.ledgerline.test";

/// What the fake server does for one call
#[derive(Debug, Clone)]
pub enum Reply {
    Status(u16, Value),
    Network,
    Timeout,
}

/// Transport that replays a script, then repeats a fallback reply
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Reply>>,
    fallback: Mutex<Option<Reply>>,
    seen: Mutex<Vec<TransportRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn then(&self, reply: Reply) -> &Self {
        self.script.lock().push_back(reply);
        self
    }

    pub fn always(&self, reply: Reply) {
        *self.fallback.lock() = Some(reply);
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().len()
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: &TransportRequest) -> Result<TransportResponse> {
        self.seen.lock().push(request.clone());
        let reply = self
            .script
            .lock()
            .pop_front()
            .or_else(|| self.fallback.lock().clone());

        match reply {
            Some(Reply::Status(status, body)) => Ok(TransportResponse::new(status, body)),
            Some(Reply::Network) => Err(Error::network(request.url.clone(), "connection reset")),
            Some(Reply::Timeout) => Err(Error::timeout(
                format!("{} {}", request.method, request.url),
                request.timeout,
            )),
            None => Err(Error::network(request.url.clone(), "no scripted reply")),
        }
    }
}

/// Keeps every notice for inspection
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<UserNotice>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<UserNotice> {
        self.notices.lock().clone()
    }
}

impl ErrorNotifier for RecordingNotifier {
    fn notify(&self, notice: UserNotice) {
        self.notices.lock().push(notice);
    }
}

pub struct Harness {
    pub client: ApiClient,
    pub transport: Arc<ScriptedTransport>,
    pub clock: Arc<ManualClock>,
    pub network: Arc<WatchNetworkMonitor>,
    pub notifier: Arc<RecordingNotifier>,
    pub storage: Arc<MemoryStorage>,
}

pub fn config() -> ResilienceConfig {
    let mut config = ResilienceConfig::default();
    config.http.base_url = BASE_URL.to_string();
    config
}

pub fn harness() -> Harness {
    harness_with(config(), None)
}

pub fn harness_with(
    config: ResilienceConfig,
    secure_store: Option<Arc<MemorySecureStore>>,
) -> Harness {
    let transport = ScriptedTransport::new();
    let clock = Arc::new(ManualClock::default());
    let network = Arc::new(WatchNetworkMonitor::new(true));
    let notifier = Arc::new(RecordingNotifier::default());
    let storage = Arc::new(MemoryStorage::new());

    let mut builder = ApiClient::builder(config)
        .transport(transport.clone())
        .storage(storage.clone())
        .network_monitor(network.clone())
        .notifier(notifier.clone())
        .clock(clock.clone());
    if let Some(store) = secure_store {
        builder = builder.secure_store(store);
    }

    Harness {
        client: builder.build().expect("client builds"),
        transport,
        clock,
        network,
        notifier,
        storage,
    }
}

pub fn minutes(n: u64) -> Duration {
    Duration::from_secs(n * 60)
}
