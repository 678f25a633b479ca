//! Retry policies for tile, overlay and capabilities requests.
//!
//! # Policy Types
//!
//! - [`RetryPolicy::None`]: fail on the first error
//! - [`RetryPolicy::Linear`]: `unit × (attempt + 1)`, used for capabilities
//! - [`RetryPolicy::Backoff`]: server `Retry-After` when present, else
//!   exponential backoff with jitter, capped
//!
//! Attempts are counted from zero: attempt 0 is the first retry.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::cache::TileLoadError;
use crate::config::FetchPolicy;
use crate::provider::HttpError;

/// Errors that know whether another attempt could succeed.
pub trait Retryable {
    fn is_retryable(&self) -> bool;

    /// Server-requested delay before the next attempt.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl Retryable for HttpError {
    fn is_retryable(&self) -> bool {
        HttpError::is_retryable(self)
    }

    fn retry_after(&self) -> Option<Duration> {
        HttpError::retry_after(self)
    }
}

impl Retryable for TileLoadError {
    fn is_retryable(&self) -> bool {
        TileLoadError::is_retryable(self)
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            TileLoadError::Http(e) => e.retry_after(),
            TileLoadError::Decode { .. } => None,
        }
    }
}

/// How a request handles transient failures.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum RetryPolicy {
    /// No retries - fail immediately on error.
    #[default]
    None,

    /// Delay grows linearly: `unit × (attempt + 1)`.
    Linear { max_retries: u32, unit: Duration },

    /// Exponential backoff with up to one `base_delay` of jitter.
    Backoff {
        max_retries: u32,
        base_delay: Duration,
        max_delay: Duration,
        /// Lower bound applied to a server `Retry-After`
        min_retry_after: Duration,
    },
}

impl RetryPolicy {
    /// Retries inside one cached tile request.
    pub fn for_requests(policy: &FetchPolicy) -> Self {
        Self::backoff(policy, policy.request_retries)
    }

    /// Retries of a failed tile within one fetch pass.
    pub fn for_passes(policy: &FetchPolicy) -> Self {
        Self::backoff(policy, policy.retries_per_pass)
    }

    /// Retries of the WMTS capabilities document.
    pub fn for_capabilities(policy: &FetchPolicy) -> Self {
        Self::Linear {
            max_retries: policy.capabilities_retries,
            unit: policy.capabilities_retry_delay,
        }
    }

    fn backoff(policy: &FetchPolicy, max_retries: u32) -> Self {
        Self::Backoff {
            max_retries,
            base_delay: policy.base_delay,
            max_delay: policy.max_delay,
            min_retry_after: policy.min_retry_after,
        }
    }

    pub fn max_retries(&self) -> u32 {
        match self {
            Self::None => 0,
            Self::Linear { max_retries, .. } | Self::Backoff { max_retries, .. } => *max_retries,
        }
    }

    /// Delay before retry `attempt`, or `None` once retries are exhausted.
    pub fn delay_for_attempt(&self, attempt: u32, retry_after: Option<Duration>) -> Option<Duration> {
        self.delay_with_jitter(attempt, retry_after, rand::random::<f64>())
    }

    /// [`delay_for_attempt`](Self::delay_for_attempt) with an explicit
    /// jitter sample in `[0, 1)`.
    pub fn delay_with_jitter(&self, attempt: u32, retry_after: Option<Duration>, jitter: f64) -> Option<Duration> {
        if attempt >= self.max_retries() {
            return None;
        }
        match self {
            Self::None => None,
            Self::Linear { unit, .. } => Some(*unit * (attempt + 1)),
            Self::Backoff {
                base_delay,
                max_delay,
                min_retry_after,
                ..
            } => {
                if let Some(ra) = retry_after.filter(|ra| !ra.is_zero()) {
                    return Some(ra.max(*min_retry_after).min(*max_delay));
                }
                let base = base_delay.as_millis() as f64;
                let ms = (base * 2f64.powi(attempt as i32) + jitter.clamp(0.0, 1.0) * base).round();
                Some(Duration::from_millis(ms as u64).min(*max_delay))
            }
        }
    }
}

/// Runs `op` until it succeeds, fails with a non-retryable error, or the
/// policy runs out of retries. `op` receives the attempt number.
pub async fn with_retry<T, E, F, Fut>(policy: &RetryPolicy, what: &str, mut op: F) -> Result<T, E>
where
    E: Retryable + std::fmt::Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() => {
                let Some(delay) = policy.delay_for_attempt(attempt, e.retry_after()) else {
                    return Err(e);
                };
                debug!(what, attempt, delay_ms = delay.as_millis() as u64, error = %e, "Retrying");
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicU32, Ordering};

    fn backoff() -> RetryPolicy {
        RetryPolicy::for_passes(&FetchPolicy {
            retries_per_pass: 4,
            ..FetchPolicy::default()
        })
    }

    #[test]
    fn test_retry_policy_none() {
        let policy = RetryPolicy::None;
        assert_eq!(policy.max_retries(), 0);
        assert_eq!(policy.delay_for_attempt(0, None), None);
    }

    #[test]
    fn test_linear_capabilities_delays() {
        let policy = RetryPolicy::for_capabilities(&FetchPolicy::default());
        assert_eq!(policy.delay_for_attempt(0, None), Some(Duration::from_secs(1)));
        assert_eq!(policy.delay_for_attempt(1, None), Some(Duration::from_secs(2)));
        assert_eq!(policy.delay_for_attempt(2, None), None);
    }

    #[test]
    fn test_backoff_exponential_with_jitter() {
        let policy = backoff();
        assert_eq!(policy.delay_with_jitter(0, None, 0.0), Some(Duration::from_millis(350)));
        assert_eq!(policy.delay_with_jitter(1, None, 0.0), Some(Duration::from_millis(700)));
        assert_eq!(policy.delay_with_jitter(1, None, 0.5), Some(Duration::from_millis(875)));
        assert_eq!(policy.delay_with_jitter(3, None, 0.0), Some(Duration::from_millis(2800)));
        assert_eq!(policy.delay_with_jitter(4, None, 0.0), None);
    }

    #[test]
    fn test_backoff_respects_max_delay() {
        let policy = RetryPolicy::Backoff {
            max_retries: 10,
            base_delay: Duration::from_millis(350),
            max_delay: Duration::from_millis(5000),
            min_retry_after: Duration::from_millis(50),
        };
        assert_eq!(policy.delay_with_jitter(6, None, 0.9), Some(Duration::from_millis(5000)));
    }

    #[test]
    fn test_retry_after_is_clamped() {
        let policy = backoff();
        let at = |ra| policy.delay_with_jitter(0, Some(ra), 0.7);
        assert_eq!(at(Duration::from_millis(10)), Some(Duration::from_millis(50)));
        assert_eq!(at(Duration::from_secs(2)), Some(Duration::from_secs(2)));
        assert_eq!(at(Duration::from_secs(60)), Some(Duration::from_millis(5000)));
        assert_eq!(at(Duration::MAX), Some(Duration::from_millis(5000)));
        // A zero Retry-After falls back to backoff.
        assert_eq!(at(Duration::ZERO), Some(Duration::from_millis(595)));
    }

    #[tokio::test]
    async fn test_with_retry_stops_on_success() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::for_requests(&FetchPolicy::default().without_delays());
        let result: Result<u32, HttpError> = with_retry(&policy, "tile", |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    Err(HttpError::Network {
                        url: "u".into(),
                        message: "reset".into(),
                    })
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retry_gives_up_on_client_error() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::for_requests(&FetchPolicy::default().without_delays());
        let result: Result<(), HttpError> = with_retry(&policy, "tile", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(HttpError::Status {
                    status: 404,
                    url: "u".into(),
                    retry_after: None,
                })
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
