//! Bounded retry with exponential backoff.
//!
//! Every network step except session resolution goes through a
//! [`RetryPolicy`]: search page POSTs, detail page GETs and document fetches.
//! A failure is first classified into a [`FailureType`]; only transient and
//! rate-limited failures are retried.
//!
//! # Example
//!
//! ```
//! use harvester_core::download::{DownloadError, RetryDecision, RetryPolicy, classify_error};
//!
//! let policy = RetryPolicy::default();
//! let error = DownloadError::http_status("https://portal.example.gov/pubcris", 503);
//!
//! match policy.should_retry(classify_error(&error), 1) {
//!     RetryDecision::Retry { delay, attempt } => println!("attempt {attempt} in {delay:?}"),
//!     RetryDecision::DoNotRetry { reason } => println!("giving up: {reason}"),
//! }
//! ```

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, info, instrument};
use url::Url;

use super::DownloadError;
use super::rate_limiter::{RateLimiter, parse_retry_after};

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(32);
const DEFAULT_BACKOFF_MULTIPLIER: f32 = 2.0;
const MAX_JITTER: Duration = Duration::from_millis(500);

/// How a failed request should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Timeouts, connection drops, 5xx responses.
    Transient,
    /// 4xx responses other than 408/429, invalid URLs, local IO failures.
    Permanent,
    /// HTTP 429.
    RateLimited,
}

/// Outcome of [`RetryPolicy::should_retry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Try again after `delay`.
    Retry {
        /// Backoff before the next attempt.
        delay: Duration,
        /// Number of the next attempt (the first request is attempt 1).
        attempt: u32,
    },
    /// Give up.
    DoNotRetry {
        /// Why no further attempt is made.
        reason: String,
    },
}

/// Retry budget and backoff shape.
///
/// Delay before retry `n` is `min(base * multiplier^(n-1), max_delay)` plus up
/// to 500ms of jitter. Defaults: 1s base, 32s cap, doubling, 2 retries.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts including the first request.
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    backoff_multiplier: f32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::with_max_retries(DEFAULT_MAX_RETRIES)
    }
}

impl RetryPolicy {
    /// Creates a policy with explicit backoff settings.
    #[must_use]
    pub fn new(
        max_retries: u32,
        base_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f32,
    ) -> Self {
        Self {
            max_attempts: max_retries.saturating_add(1),
            base_delay,
            max_delay,
            backoff_multiplier,
        }
    }

    /// Default backoff with `max_retries` retries after the first attempt.
    #[must_use]
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self::new(
            max_retries,
            DEFAULT_BASE_DELAY,
            DEFAULT_MAX_DELAY,
            DEFAULT_BACKOFF_MULTIPLIER,
        )
    }

    /// A policy that never retries.
    #[must_use]
    pub fn no_retry() -> Self {
        Self::with_max_retries(0)
    }

    /// Attempts allowed including the first.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Decides whether to retry after attempt number `attempt` failed.
    #[must_use]
    pub fn should_retry(&self, failure_type: FailureType, attempt: u32) -> RetryDecision {
        if failure_type == FailureType::Permanent {
            return RetryDecision::DoNotRetry {
                reason: "permanent failure".to_string(),
            };
        }

        if attempt >= self.max_attempts {
            debug!(attempt, max = self.max_attempts, "retry budget exhausted");
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }

        let delay = self.calculate_delay(attempt);
        debug!(
            attempt,
            next_attempt = attempt + 1,
            delay_ms = delay.as_millis(),
            "will retry"
        );
        RetryDecision::Retry {
            delay,
            attempt: attempt + 1,
        }
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as f64;
        let exponent = f64::from(attempt.saturating_sub(1));
        let delay_ms = base_ms * f64::from(self.backoff_multiplier).powf(exponent);
        let capped_ms = delay_ms.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped_ms as u64) + jitter()
    }
}

#[allow(clippy::cast_possible_truncation)]
fn jitter() -> Duration {
    let jitter_ms = rand::thread_rng().gen_range(0..=MAX_JITTER.as_millis() as u64);
    Duration::from_millis(jitter_ms)
}

/// Classifies a failed request for retry decisions.
///
/// | Error | Type |
/// |-------|------|
/// | 408, 5xx | Transient |
/// | 429 | RateLimited |
/// | other 4xx | Permanent |
/// | Timeout | Transient |
/// | Network (TLS/certificate) | Permanent |
/// | Network (other) | Transient |
/// | Io, Store, InvalidUrl, ClientBuild | Permanent |
#[must_use]
pub fn classify_error(error: &DownloadError) -> FailureType {
    match error {
        DownloadError::HttpStatus { status, .. } => classify_http_status(*status),
        DownloadError::Timeout { .. } => FailureType::Transient,
        DownloadError::Network { source, .. } => {
            if is_tls_error(source) {
                FailureType::Permanent
            } else {
                FailureType::Transient
            }
        }
        DownloadError::Io { .. }
        | DownloadError::Store(_)
        | DownloadError::InvalidUrl { .. }
        | DownloadError::ClientBuild { .. } => FailureType::Permanent,
    }
}

fn classify_http_status(status: u16) -> FailureType {
    match status {
        408 => FailureType::Transient,
        429 => FailureType::RateLimited,
        500..=599 => FailureType::Transient,
        _ => FailureType::Permanent,
    }
}

/// Runs `operation` under `policy`, pacing every attempt through `limiter`.
///
/// A `Retry-After` on a rate-limited response is recorded with the limiter,
/// which then holds the next attempt back instead of the backoff delay.
/// Returns the last error together with the number of attempts made.
#[instrument(level = "debug", skip_all, fields(url = %url))]
pub async fn retry_with_policy<T, F, Fut>(
    policy: &RetryPolicy,
    limiter: &RateLimiter,
    url: &Url,
    mut operation: F,
) -> Result<T, (DownloadError, u32)>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DownloadError>>,
{
    let mut attempt = 0_u32;
    loop {
        attempt += 1;
        limiter.acquire(url).await;

        let error = match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        let failure_type = classify_error(&error);
        let retry_after = if failure_type == FailureType::RateLimited {
            retry_after_of(&error)
        } else {
            None
        };

        match policy.should_retry(failure_type, attempt) {
            RetryDecision::Retry {
                delay,
                attempt: next_attempt,
            } => {
                info!(
                    url = %url,
                    attempt = next_attempt,
                    max_attempts = policy.max_attempts(),
                    delay_ms = retry_after.unwrap_or(delay).as_millis(),
                    using_retry_after = retry_after.is_some(),
                    error = %error,
                    "retrying request"
                );
                match retry_after {
                    Some(server_delay) => limiter.record_retry_after(url, server_delay).await,
                    None => tokio::time::sleep(delay).await,
                }
            }
            RetryDecision::DoNotRetry { reason } => {
                debug!(url = %url, %reason, "not retrying request");
                return Err((error, attempt));
            }
        }
    }
}

fn retry_after_of(error: &DownloadError) -> Option<Duration> {
    match error {
        DownloadError::HttpStatus {
            retry_after: Some(value),
            ..
        } => parse_retry_after(value),
        _ => None,
    }
}

fn is_tls_error(error: &reqwest::Error) -> bool {
    let message = error.to_string().to_lowercase();
    message.contains("certificate")
        || message.contains("tls")
        || message.contains("ssl")
        || message.contains("handshake")
}
