//! Retry classification for calls against the hosting platform.

use std::time::Duration;

/// Upper bound on any computed backoff pause.
const BACKOFF_CEILING: Duration = Duration::from_secs(20);
/// Doubling stops after eight steps.
const MAX_DOUBLINGS: u32 = 8;

/// True when an HTTP status is worth a second try: rate limiting or a
/// server-side failure. Client errors other than 429 are final.
pub fn should_retry_status(status: u16) -> bool {
    matches!(status, 429 | 500..=599)
}

/// True when the request never produced a usable response: connect
/// failures, timeouts, or requests that died mid-flight.
pub fn should_retry_transport(error: &reqwest::Error) -> bool {
    error.is_connect() || error.is_timeout() || error.is_request()
}

/// Seconds from a `Retry-After` header, when the server sent a numeric one.
/// HTTP-date forms are ignored.
pub fn retry_after_hint(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .ok()
}

/// Pause before the next try.
///
/// A server hint wins, clamped so it never drops below the base or climbs
/// above the ceiling; otherwise the base doubles per completed attempt.
pub fn backoff_delay(base: Duration, attempt: usize, hint: Option<Duration>) -> Duration {
    let ceiling = BACKOFF_CEILING.max(base);
    if let Some(hint) = hint {
        return hint.clamp(base, ceiling);
    }
    let doublings = attempt.saturating_sub(1).min(MAX_DOUBLINGS as usize) as u32;
    base.saturating_mul(1_u32 << doublings).min(ceiling)
}
