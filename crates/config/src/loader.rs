//! Configuration loader with precedence handling
//!
//! Precedence, lowest to highest: built-in defaults, the JSON config file,
//! `LEDGERLINE_*` environment variables. Programmatic overrides go through
//! [`ResilienceConfigBuilder`] after loading.

use crate::config::ResilienceConfig;
use ledgerline_core::{Error, Result, ResultExt, LEDGERLINE_CONFIG_VAR};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Source of a configuration layer, kept for debugging precedence issues
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Built-in defaults
    Default,
    /// Configuration file
    ConfigFile(PathBuf),
    /// Environment variable
    EnvironmentVariable(String),
    /// Set in code through the builder
    Programmatic,
}

/// A loaded configuration plus the layers that contributed to it
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: ResilienceConfig,
    pub sources: Vec<ConfigSource>,
}

/// Configuration loader that handles precedence
pub struct ResilienceConfigLoader;

impl ResilienceConfigLoader {
    /// Load configuration with full precedence handling
    pub fn load() -> Result<LoadedConfig> {
        let path = Self::config_file_path()?;
        Self::load_with(Some(&path), |name| std::env::var(name).ok())
    }

    /// Load from an explicit file (if any) and environment lookup
    pub fn load_with<F>(path: Option<&Path>, lookup: F) -> Result<LoadedConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = ResilienceConfig::default();
        let mut sources = vec![ConfigSource::Default];

        if let Some(path) = path {
            if let Some(file_config) = Self::load_from_file(path)? {
                config = file_config;
                sources.push(ConfigSource::ConfigFile(path.to_path_buf()));
            }
        }

        let applied = Self::apply_env_overrides(&mut config, lookup)?;
        sources.extend(applied.into_iter().map(ConfigSource::EnvironmentVariable));

        config.validate()?;
        tracing::debug!(sources = ?sources, "resilience configuration loaded");

        Ok(LoadedConfig { config, sources })
    }

    /// Read a JSON config file; a missing file is not an error
    pub fn load_from_file(path: &Path) -> Result<Option<ResilienceConfig>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::file_system(path, "read config file", e))?;

        let config = serde_json::from_str::<ResilienceConfig>(&content)
            .config_context(|| format!("invalid config file '{}'", path.display()))?;

        Ok(Some(config))
    }

    /// Apply `LEDGERLINE_*` overrides, returning the variables that were set
    pub fn apply_env_overrides<F>(config: &mut ResilienceConfig, lookup: F) -> Result<Vec<String>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut applied = Vec::new();

        if let Some(url) = lookup("LEDGERLINE_API_BASE_URL") {
            config.http.base_url = url;
            applied.push("LEDGERLINE_API_BASE_URL".to_string());
        }

        macro_rules! numeric_override {
            ($var:literal, $field:expr) => {
                if let Some(raw) = lookup($var) {
                    $field = parse_number(&raw, $var)?;
                    applied.push($var.to_string());
                }
            };
        }

        numeric_override!("LEDGERLINE_API_TIMEOUT_MS", config.http.timeout_ms);
        numeric_override!(
            "LEDGERLINE_PAYMENT_TIMEOUT_MS",
            config.http.payment_timeout_ms
        );
        numeric_override!(
            "LEDGERLINE_CIRCUIT_FAILURE_THRESHOLD",
            config.circuit_breaker.failure_threshold
        );
        numeric_override!(
            "LEDGERLINE_CIRCUIT_SUCCESS_THRESHOLD",
            config.circuit_breaker.success_threshold
        );
        numeric_override!(
            "LEDGERLINE_CIRCUIT_TIMEOUT_MS",
            config.circuit_breaker.timeout_ms
        );
        numeric_override!(
            "LEDGERLINE_CACHE_MAX_ITEMS",
            config.cache.max_memory_items
        );
        numeric_override!("LEDGERLINE_CACHE_TTL_MS", config.cache.default_ttl_ms);
        numeric_override!(
            "LEDGERLINE_ERROR_LOG_MAX",
            config.error_tracker.max_records
        );

        Ok(applied)
    }

    /// Get the configuration file path
    pub fn config_file_path() -> Result<PathBuf> {
        if let Ok(explicit) = std::env::var(LEDGERLINE_CONFIG_VAR) {
            return Ok(PathBuf::from(explicit));
        }

        let config_dir = if let Ok(xdg_config_home) = std::env::var("XDG_CONFIG_HOME") {
            PathBuf::from(xdg_config_home)
        } else {
            dirs::config_dir().ok_or_else(|| {
                Error::configuration(
                    "could not determine config directory; set XDG_CONFIG_HOME or LEDGERLINE_CONFIG",
                )
            })?
        };

        Ok(config_dir.join("ledgerline").join("resilience.json"))
    }
}

fn parse_number<T>(raw: &str, var: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .config_context(|| format!("invalid value '{raw}' for {var}"))
}

/// Builder for creating configurations in code
#[derive(Debug, Clone, Default)]
pub struct ResilienceConfigBuilder {
    config: ResilienceConfig,
}

impl ResilienceConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an already loaded configuration
    pub fn from_config(config: ResilienceConfig) -> Self {
        Self { config }
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.http.base_url = url.into();
        self
    }

    pub fn request_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.config.http.timeout_ms = timeout_ms;
        self
    }

    pub fn failure_threshold(mut self, threshold: usize) -> Self {
        self.config.circuit_breaker.failure_threshold = threshold;
        self
    }

    pub fn success_threshold(mut self, threshold: usize) -> Self {
        self.config.circuit_breaker.success_threshold = threshold;
        self
    }

    pub fn circuit_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.config.circuit_breaker.timeout_ms = timeout_ms;
        self
    }

    pub fn cache_max_items(mut self, items: usize) -> Self {
        self.config.cache.max_memory_items = items;
        self
    }

    pub fn cache_ttl_ms(mut self, ttl_ms: u64) -> Self {
        self.config.cache.default_ttl_ms = ttl_ms;
        self
    }

    pub fn error_log_max(mut self, records: usize) -> Self {
        self.config.error_tracker.max_records = records;
        self
    }

    /// Validate and build the configuration
    pub fn build(self) -> Result<ResilienceConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("resilience.json");

        let loaded = ResilienceConfigLoader::load_with(Some(&path), lookup_from(&[])).unwrap();
        assert_eq!(loaded.config, ResilienceConfig::default());
        assert_eq!(loaded.sources, vec![ConfigSource::Default]);
    }

    #[test]
    fn env_overrides_file_values() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("resilience.json");
        std::fs::write(
            &path,
            r#"{"circuit_breaker": {"failure_threshold": 8}, "http": {"base_url": "https://file.example"}}"#,
        )
        .unwrap();

        let loaded = ResilienceConfigLoader::load_with(
            Some(&path),
            lookup_from(&[("LEDGERLINE_CIRCUIT_FAILURE_THRESHOLD", "3")]),
        )
        .unwrap();

        assert_eq!(loaded.config.circuit_breaker.failure_threshold, 3);
        assert_eq!(loaded.config.http.base_url, "https://file.example");
        assert_eq!(
            loaded.sources,
            vec![
                ConfigSource::Default,
                ConfigSource::ConfigFile(path),
                ConfigSource::EnvironmentVariable(
                    "LEDGERLINE_CIRCUIT_FAILURE_THRESHOLD".to_string()
                ),
            ]
        );
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let err = ResilienceConfigLoader::load_with(
            None,
            lookup_from(&[("LEDGERLINE_CACHE_MAX_ITEMS", "lots")]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("LEDGERLINE_CACHE_MAX_ITEMS"));
    }

    #[test]
    fn malformed_file_is_a_configuration_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("resilience.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = ResilienceConfigLoader::load_from_file(&path).unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    #[serial]
    fn explicit_config_path_wins() {
        std::env::set_var(LEDGERLINE_CONFIG_VAR, "/etc/ledgerline/custom.json");
        let path = ResilienceConfigLoader::config_file_path().unwrap();
        std::env::remove_var(LEDGERLINE_CONFIG_VAR);
        assert_eq!(path, PathBuf::from("/etc/ledgerline/custom.json"));
    }

    #[test]
    fn builder_validates() {
        assert!(ResilienceConfigBuilder::new()
            .failure_threshold(0)
            .build()
            .is_err());

        let config = ResilienceConfigBuilder::new()
            .base_url("https://api.ledgerline.test")
            .cache_max_items(5)
            .build()
            .unwrap();
        assert_eq!(config.cache.max_memory_items, 5);
    }
}
