/// Constants used throughout the Ledgerline resilience layer
// Correlation headers attached to every outbound request
pub const CORRELATION_ID_HEADER: &str = "X-Correlation-ID";
pub const SESSION_ID_HEADER: &str = "X-Session-ID";
pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

// Response header consulted by the rate-limit retry policy
pub const RETRY_AFTER_HEADER: &str = "retry-after";

// Persistent storage key prefixes
pub const CACHE_STORAGE_PREFIX: &str = "@ledgerline/api_cache:";
pub const ERROR_LOG_STORAGE_KEY: &str = "@ledgerline/error_log";

// Secure store keys used by the token refresh hook
pub const ACCESS_TOKEN_KEY: &str = "auth.access_token";
pub const REFRESH_TOKEN_KEY: &str = "auth.refresh_token";

// Default request timeouts (milliseconds)
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 15_000;
pub const PAYMENT_REQUEST_TIMEOUT_MS: u64 = 45_000;

// Correlation records are kept this long before the sweep drops them
pub const CORRELATION_RETENTION_MS: u64 = 5 * 60 * 1000;

// Environment variables
pub const LEDGERLINE_LOG_VAR: &str = "LEDGERLINE_LOG";
pub const LEDGERLINE_CONFIG_VAR: &str = "LEDGERLINE_CONFIG";
