//! `Retry-After` header parsing.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Parse a `Retry-After` value, either delta-seconds or an HTTP-date.
///
/// Dates in the past yield a zero delay. Anything unparseable is `None` so
/// the caller falls back to computed backoff.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    Some((at - now).to_std().unwrap_or(Duration::ZERO))
}
