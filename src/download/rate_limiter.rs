//! Per-host request pacing.
//!
//! The portal and the e-label host are each paced independently: a request
//! to a host waits until at least `min_delay` has passed since the previous
//! request to that host. A server-mandated `Retry-After` pushes the host's
//! next slot further out.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use harvester_core::download::RateLimiter;
//! use url::Url;
//!
//! # async fn example() -> Result<(), url::ParseError> {
//! let limiter = RateLimiter::new(Duration::from_millis(250));
//! limiter.acquire(&Url::parse("https://portal.example.gov/pubcris")?).await;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};
use url::Url;

use super::constants::MAX_RETRY_AFTER;

/// Per-host minimum spacing between requests.
///
/// Shared across tasks behind an `Arc`. The `DashMap` shard lock is released
/// before awaiting on a host's slot so hosts never block each other.
#[derive(Debug)]
pub struct RateLimiter {
    min_delay: Duration,
    hosts: DashMap<String, Arc<Mutex<HostSlot>>>,
}

#[derive(Debug, Default)]
struct HostSlot {
    /// Earliest instant the next request may start. `None` before the first request.
    next_allowed: Option<Instant>,
}

impl RateLimiter {
    /// Creates a limiter with the given spacing. `Duration::ZERO` disables pacing
    /// but still honours recorded `Retry-After` delays.
    #[must_use]
    pub fn new(min_delay: Duration) -> Self {
        Self {
            min_delay,
            hosts: DashMap::new(),
        }
    }

    /// Creates a limiter that applies no spacing.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Waits for the host's next slot, then books the following one.
    #[instrument(level = "debug", skip(self, url), fields(host = %host_key(url)))]
    pub async fn acquire(&self, url: &Url) {
        let slot = self.slot_for(url);
        let mut slot = slot.lock().await;

        if let Some(next_allowed) = slot.next_allowed {
            let now = Instant::now();
            if next_allowed > now {
                let wait = next_allowed - now;
                debug!(wait_ms = wait.as_millis(), "pacing request");
                tokio::time::sleep_until(next_allowed).await;
            }
        }

        slot.next_allowed = Some(Instant::now() + self.min_delay);
    }

    /// Records a server-mandated delay for the URL's host.
    pub async fn record_retry_after(&self, url: &Url, delay: Duration) {
        let delay = delay.min(MAX_RETRY_AFTER);
        let slot = self.slot_for(url);
        let mut slot = slot.lock().await;
        let candidate = Instant::now() + delay;
        if slot.next_allowed.is_none_or(|current| current < candidate) {
            slot.next_allowed = Some(candidate);
        }
        debug!(host = %host_key(url), delay_ms = delay.as_millis(), "recorded server rate limit");
    }

    fn slot_for(&self, url: &Url) -> Arc<Mutex<HostSlot>> {
        self.hosts
            .entry(host_key(url))
            .or_insert_with(|| Arc::new(Mutex::new(HostSlot::default())))
            .clone()
    }
}

fn host_key(url: &Url) -> String {
    url.host_str()
        .map_or_else(|| "unknown".to_string(), str::to_ascii_lowercase)
}

/// Parses a Retry-After header value into a Duration.
///
/// Supports integer seconds (`Retry-After: 120`) and HTTP-dates
/// (`Retry-After: Wed, 21 Oct 2025 07:28:00 GMT`). Past dates yield zero;
/// values above one hour are capped.
///
/// ```
/// use std::time::Duration;
/// use harvester_core::download::parse_retry_after;
///
/// assert_eq!(parse_retry_after("120"), Some(Duration::from_secs(120)));
/// assert_eq!(parse_retry_after("invalid"), None);
/// ```
#[must_use]
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    let header_value = header_value.trim();

    if let Ok(seconds) = header_value.parse::<i64>() {
        let Ok(seconds) = u64::try_from(seconds) else {
            debug!(seconds, "negative Retry-After value, ignoring");
            return None;
        };
        return Some(cap_retry_after(Duration::from_secs(seconds)));
    }

    let Ok(datetime) = httpdate::parse_http_date(header_value) else {
        debug!(header_value, "unparseable Retry-After value");
        return None;
    };
    match datetime.duration_since(std::time::SystemTime::now()) {
        Ok(duration) => Some(cap_retry_after(duration)),
        Err(_) => Some(Duration::ZERO),
    }
}

fn cap_retry_after(duration: Duration) -> Duration {
    if duration > MAX_RETRY_AFTER {
        warn!(
            delay_secs = duration.as_secs(),
            max_secs = MAX_RETRY_AFTER.as_secs(),
            "Retry-After exceeds maximum, capping at 1 hour"
        );
        MAX_RETRY_AFTER
    } else {
        duration
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_rate_limiter_disabled_no_delay() {
        tokio::time::pause();
        let limiter = RateLimiter::disabled();
        let start = Instant::now();

        limiter.acquire(&url("https://example.com/1")).await;
        limiter.acquire(&url("https://example.com/2")).await;

        assert!(start.elapsed() < Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_rate_limiter_delays_same_host() {
        tokio::time::pause();
        let limiter = RateLimiter::new(Duration::from_secs(1));
        let start = Instant::now();

        limiter.acquire(&url("https://example.com/1")).await;
        assert!(start.elapsed() < Duration::from_millis(10));

        limiter.acquire(&url("https://example.com/2")).await;
        assert!(start.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_rate_limiter_hosts_independent() {
        tokio::time::pause();
        let limiter = RateLimiter::new(Duration::from_secs(1));

        limiter.acquire(&url("https://portal.example.gov/a")).await;
        let start = Instant::now();
        limiter.acquire(&url("https://elabels.example.gov/b.pdf")).await;
        assert!(start.elapsed() < Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_record_retry_after_pushes_next_slot() {
        tokio::time::pause();
        let limiter = RateLimiter::disabled();
        let target = url("https://example.com/busy");

        limiter.acquire(&target).await;
        limiter.record_retry_after(&target, Duration::from_secs(5)).await;

        let start = Instant::now();
        limiter.acquire(&target).await;
        assert!(start.elapsed() >= Duration::from_secs(5));
    }

    #[test]
    fn test_parse_retry_after_seconds() {
        assert_eq!(parse_retry_after("120"), Some(Duration::from_secs(120)));
        assert_eq!(parse_retry_after("  0 "), Some(Duration::ZERO));
    }

    #[test]
    fn test_parse_retry_after_rejects_negative_and_garbage() {
        assert_eq!(parse_retry_after("-5"), None);
        assert_eq!(parse_retry_after("soon"), None);
        assert_eq!(parse_retry_after(""), None);
    }

    #[test]
    fn test_parse_retry_after_caps_at_one_hour() {
        assert_eq!(parse_retry_after("7200"), Some(Duration::from_secs(3600)));
    }

    #[test]
    fn test_parse_retry_after_http_date_past_is_zero() {
        assert_eq!(
            parse_retry_after("Wed, 01 Jan 2020 00:00:00 GMT"),
            Some(Duration::ZERO)
        );
    }

    #[test]
    fn test_parse_retry_after_http_date_future() {
        let future = std::time::SystemTime::now() + Duration::from_secs(60);
        let parsed = parse_retry_after(&httpdate::fmt_http_date(future)).unwrap();
        assert!(parsed >= Duration::from_secs(55) && parsed <= Duration::from_secs(61));
    }
}
