//! Backoff and retry for tracker calls.
//!
//! A failed call is repeated only when repeating it cannot duplicate work:
//! reads and updates ([`Idempotency::Idempotent`]) are retried on any
//! transient failure, creations ([`Idempotency::NonIdempotent`]) only when
//! the request provably never reached the tracker (refused connection, 429).
//! A 5xx or a timeout after a POST leaves the write in an unknown state, so
//! it is reported instead of sent again.

use crate::core::{config, metrics};
use std::future::Future;
use std::time::Duration;

/// Upper bound for a server-provided `Retry-After` hint.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(300);

/// Whether repeating a call that may already have been applied is harmless.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Idempotency {
    /// GET, search, PATCH with a fixed body
    Idempotent,
    /// POST that creates a project, issue, link, comment or checklist item
    NonIdempotent,
}

/// Classification of a failed attempt.
pub trait Retryable {
    /// Temporary failure; the same request may succeed later.
    fn is_transient(&self) -> bool;

    /// The tracker certainly did not apply the request.
    fn was_not_applied(&self) -> bool;

    /// Server hint for the next attempt.
    fn retry_after(&self) -> Option<Duration> {
        None
    }

    fn should_retry(&self, idempotency: Idempotency) -> bool {
        match idempotency {
            Idempotency::Idempotent => self.is_transient(),
            Idempotency::NonIdempotent => self.was_not_applied(),
        }
    }
}

/// How often and how patiently to repeat a call.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Repetitions after the first attempt
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(config::retry::MAX_RETRIES, config::retry::initial_delay())
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay: base_delay.max(config::retry::max_delay()),
            jitter: true,
        }
    }

    /// One attempt, never waits.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: false,
        }
    }

    #[must_use]
    pub fn max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    #[must_use]
    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Wait before retry number `retry` (0-based): the base delay doubled per
    /// retry, capped, then spread over its upper half when jitter is on.
    pub fn backoff(&self, retry: u32) -> Duration {
        let doubled = self.base_delay.saturating_mul(2u32.saturating_pow(retry));
        let capped = doubled.min(self.max_delay);
        if !self.jitter {
            return capped;
        }
        let half = capped / 2;
        half + half.mul_f64(rand::random::<f64>())
    }

    fn wait_after<E: Retryable>(&self, error: &E, retry: u32) -> Duration {
        error
            .retry_after()
            .map_or_else(|| self.backoff(retry), |hint| hint.min(MAX_RETRY_AFTER))
    }
}

/// Runs `attempt` until it succeeds, fails for good, or `policy` runs out.
///
/// Returns the outcome of the last attempt.
pub async fn retry<F, Fut, T, E>(
    policy: &RetryPolicy,
    operation: &str,
    idempotency: Idempotency,
    mut attempt: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + std::fmt::Display,
{
    let mut retries = 0;
    loop {
        match attempt().await {
            Err(e) if retries < policy.max_retries && e.should_retry(idempotency) => {
                let wait = policy.wait_after(&e, retries);
                retries += 1;
                metrics::TRACKER_RETRIES_TOTAL.with_label_values(&[operation]).inc();
                log::warn!(
                    "{} failed, retry {}/{} in {:?}: {}",
                    operation,
                    retries,
                    policy.max_retries,
                    wait,
                    e
                );
                tokio::time::sleep(wait).await;
            }
            outcome => return outcome,
        }
    }
}
