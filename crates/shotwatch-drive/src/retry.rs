//! Retry policy for throttled Drive requests
//!
//! Drive answers bursts with 429 (rate limit) or 503 (backend busy). Both are
//! retried a bounded number of times, waiting for the server's `Retry-After`
//! when it sends one and backing off exponentially when it does not.

use std::time::Duration;

use tracing::warn;

/// Longest wait honoured from a `Retry-After` header
const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// How throttled requests are retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// First backoff step when the server gives no `Retry-After`
    pub base_delay: Duration,
    /// Upper bound for computed backoff
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(32),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Delay before retry number `attempt` (0-based)
    ///
    /// A parseable `Retry-After` value takes precedence over the computed
    /// exponential backoff.
    pub fn delay_for(&self, attempt: u32, retry_after: Option<&str>) -> Duration {
        let backoff = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay);

        match retry_after {
            Some(value) => parse_retry_after(value, backoff),
            None => backoff,
        }
    }
}

/// Parses the `Retry-After` header value into a Duration
///
/// The header can be either:
/// - An integer number of seconds (e.g., "30")
/// - An HTTP-date (e.g., "Fri, 31 Dec 2027 23:59:59 GMT"), parsed as seconds from now
///
/// Falls back to `default` if parsing fails or the date is in the past.
pub fn parse_retry_after(value: &str, default: Duration) -> Duration {
    let value = value.trim();

    if let Ok(seconds) = value.parse::<u64>() {
        return Duration::from_secs(seconds).min(MAX_RETRY_AFTER);
    }

    if let Ok(date) = chrono::DateTime::parse_from_rfc2822(value) {
        let remaining = date.with_timezone(&chrono::Utc) - chrono::Utc::now();
        if let Ok(remaining) = remaining.to_std() {
            return remaining.min(MAX_RETRY_AFTER);
        }
    }

    warn!(value, "Could not parse Retry-After header, using default");
    default
}
