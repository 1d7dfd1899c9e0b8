//! Response caching for the Ledgerline API client
//!
//! ## Key Components
//!
//! - **`response`**: [`ResponseCache`], the two-tier TTL cache the request
//!   orchestrator reads before dispatching a GET and falls back to when the
//!   network or server is unavailable.
//! - **`storage`**: The [`PersistentStorage`] trait with in-memory and
//!   file-backed implementations.
//! - **`entry`** / **`keys`**: Entry metadata and cache key construction.

pub mod entry;
pub mod keys;
pub mod response;
mod stats;
pub mod storage;

pub use entry::{CacheEntry, Freshness};
pub use keys::cache_key;
pub use response::{CacheHit, CacheSource, ResponseCache, SetOptions};
pub use stats::CacheStats;
pub use storage::{FileStorage, MemoryStorage, PersistentStorage};
