//! Quote Provider Client rate-limit gate (C5): a process-global, single-slot
//! FIFO gate serializing calls to at most one every `min_delay`.
//!
//! Grounded on the teacher's `RateLimit` descriptor (`requests_per_minute`,
//! `max_concurrency`, `min_delay`) returned from `MarketDataProvider::rate_limit`
//! in `openfigi`/`us_treasury_calc`/`boerse_frankfurt`; this gate is the
//! executable counterpart, generalized to the 8-second single-slot budget
//! this system's free-tier provider requires.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// One call every 8 seconds fits the documented free-tier budget of 8
/// calls/minute with margin (spec §4.5).
pub const QUOTE_PROVIDER_MIN_DELAY: Duration = Duration::from_secs(8);

/// A FIFO-queued gate: concurrent callers block on `acquire()` and are
/// released in arrival order, one per `min_delay` tick.
pub struct RateLimitGate {
    min_delay: Duration,
    next_slot: Mutex<Instant>,
}

impl RateLimitGate {
    pub fn new(min_delay: Duration) -> Self {
        Self {
            min_delay,
            next_slot: Mutex::new(Instant::now()),
        }
    }

    /// Blocks until the next slot is free, then reserves the following one.
    /// `tokio::sync::Mutex` wakes waiters in arrival order, giving the gate
    /// its FIFO queueing guarantee.
    pub async fn acquire(&self) {
        let mut next_slot = self.next_slot.lock().await;
        let now = Instant::now();
        if *next_slot > now {
            tokio::time::sleep(*next_slot - now).await;
        }
        *next_slot = Instant::now() + self.min_delay;
    }
}

impl Default for RateLimitGate {
    fn default() -> Self {
        Self::new(QUOTE_PROVIDER_MIN_DELAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration as StdDuration;

    #[tokio::test(start_paused = true)]
    async fn second_caller_waits_the_full_min_delay() {
        let gate = Arc::new(RateLimitGate::new(StdDuration::from_millis(100)));
        let start = Instant::now();
        gate.acquire().await;
        gate.acquire().await;
        assert!(start.elapsed() >= StdDuration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn five_concurrent_callers_serialize_to_five_slots() {
        let gate = Arc::new(RateLimitGate::new(StdDuration::from_millis(50)));
        let start = Instant::now();
        let mut handles = Vec::new();
        for _ in 0..5 {
            let gate = gate.clone();
            handles.push(tokio::spawn(async move {
                gate.acquire().await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert!(start.elapsed() >= StdDuration::from_millis(200));
    }
}
