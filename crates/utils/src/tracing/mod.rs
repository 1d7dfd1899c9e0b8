use ledgerline_core::LEDGERLINE_LOG_VAR;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Re-export tracing macros for convenience
pub use tracing::{debug, error, info, instrument, span, trace, warn, Level, Span};

const DEFAULT_DIRECTIVE: &str = "info";

/// Initialize the tracing system
///
/// The filter comes from `LEDGERLINE_LOG`, then `RUST_LOG`, then defaults to
/// `info`. Output is compact and goes to stderr; ANSI colours are only used
/// when stderr is a terminal.
pub fn init() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let directive = std::env::var(LEDGERLINE_LOG_VAR)
        .or_else(|_| std::env::var(EnvFilter::DEFAULT_ENV))
        .unwrap_or_else(|_| DEFAULT_DIRECTIVE.to_string());
    init_with_directive(&directive)
}

/// Initialize tracing with an explicit filter directive such as
/// `ledgerline_client=debug,info`
pub fn init_with_directive(
    directive: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let filter = EnvFilter::try_new(directive).or_else(|_| EnvFilter::try_new(DEFAULT_DIRECTIVE))?;

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(is_tty())
        .compact()
        .with_target(true)
        .with_thread_ids(false)
        .with_level(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

/// Check if we're running in a TTY environment
fn is_tty() -> bool {
    std::io::IsTerminal::is_terminal(&std::io::stderr())
}

/// Span wrapping one logical API request
pub fn request_span(method: &str, endpoint: &str, correlation_id: &str) -> Span {
    span!(
        Level::INFO,
        "api_request",
        method = %method,
        endpoint = %endpoint,
        correlation_id = %correlation_id
    )
}

/// Emit a structured event for request completion
pub fn request_completed(endpoint: &str, duration_ms: u64, status: Option<u16>, success: bool) {
    if success {
        info!(
            endpoint = %endpoint,
            duration_ms,
            status = status.unwrap_or_default(),
            "request_completed"
        );
    } else {
        warn!(
            endpoint = %endpoint,
            duration_ms,
            status = status.unwrap_or_default(),
            "request_failed"
        );
    }
}

/// Emit a structured event for cache operations
pub fn cache_event(key: &str, hit: bool, source: &str) {
    if hit {
        debug!(key = %key, source = %source, "cache_hit");
    } else {
        debug!(key = %key, source = %source, "cache_miss");
    }
}
