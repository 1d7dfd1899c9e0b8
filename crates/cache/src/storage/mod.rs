//! Persistent key/value storage
//!
//! The cache's second tier and the error tracker's durable queue both sit on
//! a string-to-string store. Implementations must be safe to share between
//! tasks; batched operations default to looping over the single-key ones and
//! backends with a cheaper bulk path override them.

mod file;
mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use async_trait::async_trait;
use ledgerline_core::Result;
use std::fmt::Debug;

/// Durable string key/value store
#[async_trait]
pub trait PersistentStorage: Send + Sync + Debug {
    async fn get_item(&self, key: &str) -> Result<Option<String>>;

    async fn set_item(&self, key: &str, value: &str) -> Result<()>;

    async fn remove_item(&self, key: &str) -> Result<()>;

    async fn get_all_keys(&self) -> Result<Vec<String>>;

    /// Values for `keys`, in the same order
    async fn multi_get(&self, keys: &[String]) -> Result<Vec<(String, Option<String>)>> {
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            values.push((key.clone(), self.get_item(key).await?));
        }
        Ok(values)
    }

    async fn multi_set(&self, entries: &[(String, String)]) -> Result<()> {
        for (key, value) in entries {
            self.set_item(key, value).await?;
        }
        Ok(())
    }

    async fn multi_remove(&self, keys: &[String]) -> Result<()> {
        for key in keys {
            self.remove_item(key).await?;
        }
        Ok(())
    }
}
