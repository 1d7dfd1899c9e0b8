//! Connectivity status

use std::fmt::Debug;
use tokio::sync::watch;

/// Reports whether the device currently has a network connection
pub trait NetworkMonitor: Send + Sync + Debug {
    fn is_connected(&self) -> bool;

    /// Stream of connectivity changes; the current value is readable immediately
    fn subscribe(&self) -> watch::Receiver<bool>;
}

/// Monitor driven by whoever owns the platform connectivity callbacks
#[derive(Debug)]
pub struct WatchNetworkMonitor {
    sender: watch::Sender<bool>,
}

impl WatchNetworkMonitor {
    pub fn new(connected: bool) -> Self {
        let (sender, _) = watch::channel(connected);
        Self { sender }
    }

    /// Publish a connectivity change
    pub fn set_connected(&self, connected: bool) {
        let changed = self.sender.send_if_modified(|current| {
            let changed = *current != connected;
            *current = connected;
            changed
        });
        if changed {
            tracing::info!(connected, "network connectivity changed");
        }
    }
}

impl Default for WatchNetworkMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}

impl NetworkMonitor for WatchNetworkMonitor {
    fn is_connected(&self) -> bool {
        *self.sender.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }
}
