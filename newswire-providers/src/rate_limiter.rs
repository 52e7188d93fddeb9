//! Per-provider request spacing
//!
//! Enforces a minimum delay between outbound calls to one provider so
//! bursts from concurrent aggregation rounds don't trip server-side limits.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Minimum-interval limiter.
///
/// Each caller reserves the next free slot while holding the lock and then
/// sleeps outside it, so concurrent callers always get distinct slots.
#[derive(Debug)]
pub struct RateLimiter {
    /// Earliest instant the next request may start
    next_available: Mutex<Option<Instant>>,
    min_interval: Duration,
    name: String,
    total_requests: AtomicU64,
    waited_requests: AtomicU64,
}

impl RateLimiter {
    pub fn new(min_interval: Duration, name: &str) -> Self {
        Self {
            next_available: Mutex::new(None),
            min_interval,
            name: name.to_string(),
            total_requests: AtomicU64::new(0),
            waited_requests: AtomicU64::new(0),
        }
    }

    /// Wait until this caller's reserved slot arrives
    pub async fn acquire(&self) {
        let request_num = self.total_requests.fetch_add(1, Ordering::Relaxed) + 1;

        let slot = {
            let mut next_available = self.next_available.lock().await;
            let now = Instant::now();
            let slot = match *next_available {
                Some(next) if next > now => next,
                _ => now,
            };
            *next_available = Some(slot + self.min_interval);
            slot
        };

        let wait = slot.saturating_duration_since(Instant::now());
        if !wait.is_zero() {
            self.waited_requests.fetch_add(1, Ordering::Relaxed);
            debug!(
                "[RATE_LIMITER:{}] #{} waiting {:?}",
                self.name, request_num, wait
            );
            tokio::time::sleep_until(slot).await;
        }
    }

    /// Whether a request could start right now without waiting
    pub async fn can_acquire_immediately(&self) -> bool {
        let next_available = *self.next_available.lock().await;
        next_available.map_or(true, |next| Instant::now() >= next)
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub fn stats(&self) -> RateLimiterStats {
        RateLimiterStats {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            waited_requests: self.waited_requests.load(Ordering::Relaxed),
            min_interval_ms: self.min_interval.as_millis() as u64,
            name: self.name.clone(),
        }
    }
}

/// Usage counters for a limiter
#[derive(Debug, Clone)]
pub struct RateLimiterStats {
    pub total_requests: u64,
    pub waited_requests: u64,
    pub min_interval_ms: u64,
    pub name: String,
}
