//! Request results
//!
//! A request that returns `Ok` may still be degraded: served from cache,
//! while offline, or while the endpoint's circuit is open. Each case is its
//! own variant so callers can tell them apart.

use ledgerline_core::Result;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// A response fresh from the server
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub data: Value,
    pub correlation_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApiOutcome {
    /// Live response
    Fresh(ApiResponse),
    /// Served from the response cache. `stale` is set when the entry was
    /// past its TTL and used as a fallback for a failed request.
    Cached {
        data: Value,
        stale: bool,
        age: Duration,
    },
    /// Device offline; served from cache regardless of age
    Offline { data: Value, age: Duration },
    /// A GET answered 404
    NotFound,
    /// The endpoint's circuit is open; served from cache regardless of age
    CircuitOpen { data: Value, age: Duration },
}

impl ApiOutcome {
    pub fn data(&self) -> Option<&Value> {
        match self {
            ApiOutcome::Fresh(response) => Some(&response.data),
            ApiOutcome::Cached { data, .. }
            | ApiOutcome::Offline { data, .. }
            | ApiOutcome::CircuitOpen { data, .. } => Some(data),
            ApiOutcome::NotFound => None,
        }
    }

    pub fn into_data(self) -> Option<Value> {
        match self {
            ApiOutcome::Fresh(response) => Some(response.data),
            ApiOutcome::Cached { data, .. }
            | ApiOutcome::Offline { data, .. }
            | ApiOutcome::CircuitOpen { data, .. } => Some(data),
            ApiOutcome::NotFound => None,
        }
    }

    /// Served from a fallback rather than an authoritative answer
    pub fn is_degraded(&self) -> bool {
        match self {
            ApiOutcome::Fresh(_) | ApiOutcome::NotFound => false,
            ApiOutcome::Cached { stale, .. } => *stale,
            ApiOutcome::Offline { .. } | ApiOutcome::CircuitOpen { .. } => true,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiOutcome::NotFound)
    }

    /// Decode the payload; `None` for `NotFound`
    pub fn json<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        self.data()
            .map(|data| serde_json::from_value(data.clone()))
            .transpose()
            .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Product {
        id: u32,
        name: String,
    }

    #[test]
    fn json_decodes_any_variant_with_data() {
        let outcome = ApiOutcome::Cached {
            data: json!({"id": 42, "name": "Tea"}),
            stale: false,
            age: Duration::from_secs(300),
        };
        let product: Option<Product> = outcome.json().unwrap();
        assert_eq!(product.unwrap().name, "Tea");
        assert!(!outcome.is_degraded());

        let missing: Option<Product> = ApiOutcome::NotFound.json().unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn degraded_variants() {
        let stale = ApiOutcome::Cached {
            data: json!(1),
            stale: true,
            age: Duration::ZERO,
        };
        assert!(stale.is_degraded());
        let offline = ApiOutcome::Offline {
            data: json!(1),
            age: Duration::ZERO,
        };
        assert!(offline.is_degraded());
        assert!(ApiOutcome::NotFound.is_not_found());
    }

    #[test]
    fn decode_errors_surface() {
        let outcome = ApiOutcome::Cached {
            data: json!("not a product"),
            stale: false,
            age: Duration::ZERO,
        };
        assert!(outcome.json::<Product>().is_err());
    }
}
