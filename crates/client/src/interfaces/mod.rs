//! Collaborators the client talks to but does not own
//!
//! Each capability is a trait so the composition root can plug in platform
//! implementations and tests can script them.

pub mod network;
pub mod notifier;
pub mod secure_store;
pub mod transport;

pub use network::{NetworkMonitor, WatchNetworkMonitor};
pub use notifier::{ErrorNotifier, RetryAction, TracingNotifier, UserNotice};
pub use secure_store::{MemorySecureStore, SecureStore};
pub use transport::{HttpTransport, TransportRequest, TransportResponse};
