//! Credential storage

use async_trait::async_trait;
use ledgerline_core::Result;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt::{self, Debug};
use zeroize::Zeroizing;

/// Keychain-style storage for tokens
#[async_trait]
pub trait SecureStore: Send + Sync + Debug {
    async fn get_secure_item(&self, key: &str) -> Result<Option<String>>;

    async fn set_secure_item(&self, key: &str, value: &str) -> Result<()>;

    async fn remove_secure_item(&self, key: &str) -> Result<()>;
}

/// In-process store whose values are wiped from memory when replaced or removed
#[derive(Default)]
pub struct MemorySecureStore {
    items: Mutex<HashMap<String, Zeroizing<String>>>,
}

impl MemorySecureStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Debug for MemorySecureStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print the secrets themselves
        let keys: Vec<String> = self.items.lock().keys().cloned().collect();
        f.debug_struct("MemorySecureStore").field("keys", &keys).finish()
    }
}

#[async_trait]
impl SecureStore for MemorySecureStore {
    async fn get_secure_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.lock().get(key).map(|value| value.as_str().to_string()))
    }

    async fn set_secure_item(&self, key: &str, value: &str) -> Result<()> {
        self.items
            .lock()
            .insert(key.to_string(), Zeroizing::new(value.to_string()));
        Ok(())
    }

    async fn remove_secure_item(&self, key: &str) -> Result<()> {
        self.items.lock().remove(key);
        Ok(())
    }
}
