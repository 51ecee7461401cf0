use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

/// Spaces out outgoing requests to one remote service.
///
/// Every caller waits until at least `interval` has passed since the slot
/// handed to the previous caller. Slots are reserved under the lock and the
/// wait happens outside it, so concurrent callers queue up in order.
#[derive(Clone)]
pub struct RateLimiter {
    /// Earliest instant the next request may start
    next_slot: Arc<Mutex<Option<Instant>>>,
    interval: Duration,
}

impl RateLimiter {
    /// Creates a limiter with the given spacing between requests.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use opscore::core::rate_limiter::RateLimiter;
    /// use std::time::Duration;
    ///
    /// let limiter = RateLimiter::new(Duration::from_millis(50));
    /// ```
    pub fn new(interval: Duration) -> Self {
        Self {
            next_slot: Arc::new(Mutex::new(None)),
            interval,
        }
    }

    /// A limiter that never waits.
    pub fn unlimited() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Waits for the next free slot.
    pub async fn acquire(&self) {
        if self.interval.is_zero() {
            return;
        }

        let slot = {
            let mut next_slot = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = match *next_slot {
                Some(at) if at > now => at,
                _ => now,
            };
            *next_slot = Some(slot + self.interval);
            slot
        };

        tokio::time::sleep_until(slot).await;
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(crate::core::config::network::min_request_interval())
    }
}
