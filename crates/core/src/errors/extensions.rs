//! Extension traits for error handling

use super::types::{Error, Result};
use std::fmt::Display;

/// Extension trait for attaching resilience-layer context to foreign errors
pub trait ResultExt<T> {
    /// Wrap a failure as a storage error for `key`
    fn storage_context(self, operation: &'static str, key: &str) -> Result<T>;

    /// Wrap a failure as a configuration error with a lazily built prefix
    fn config_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Display,
{
    fn storage_context(self, operation: &'static str, key: &str) -> Result<T> {
        self.map_err(|e| Error::Storage {
            operation,
            key: key.to_string(),
            message: e.to_string(),
        })
    }

    fn config_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| Error::Configuration {
            message: format!("{}: {}", f(), e),
        })
    }
}
