//! Politeness delay for unproxied requests.
//!
//! Each origin host gets a step counter that cycles 1, 2, .., `max_steps`, 1, ..
//! and the delay for a request is `step * counter`. Callers do not simply sleep
//! for that delay: they reserve a release instant `max(now, previous release) +
//! delay`, so concurrent fetchers aimed at the same host are queued one behind
//! the other and the aggregate rate to that host stays governed. Hosts never
//! share a schedule.

use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug)]
struct OriginPace {
    counter: u32,
    next_release: Option<Instant>,
}

#[derive(Debug)]
pub struct Pacer {
    step: Duration,
    max_steps: u32,
    origins: Mutex<HashMap<String, OriginPace>>,
}

impl Pacer {
    pub fn new(step: Duration, max_steps: u32) -> Self {
        Self {
            step,
            max_steps: max_steps.max(1),
            origins: Mutex::new(HashMap::new()),
        }
    }

    /// Reserve the next release slot for `host` without waiting for it.
    pub async fn reserve(&self, host: &str) -> Instant {
        let mut origins = self.origins.lock().await;
        let pace = origins.entry(host.to_string()).or_insert(OriginPace {
            counter: 1,
            next_release: None,
        });

        let delay = self.step * pace.counter;
        pace.counter = if pace.counter < self.max_steps {
            pace.counter + 1
        } else {
            1
        };

        let now = Instant::now();
        let base = pace.next_release.map_or(now, |r| r.max(now));
        let release = base + delay;
        pace.next_release = Some(release);
        release
    }

    /// Wait for this caller's turn at `host`. Returns how long it waited.
    pub async fn pace(&self, host: &str) -> Duration {
        let release = self.reserve(host).await;
        let waited = release.saturating_duration_since(Instant::now());
        if !waited.is_zero() {
            tracing::info!(host, delay_ms = waited.as_millis() as u64, "pausing before unproxied request");
        }
        tokio::time::sleep_until(release).await;
        waited
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_delay_cycles_one_to_four() {
        let pacer = Pacer::new(Duration::from_secs(1), 4);
        let mut waits = Vec::new();
        for _ in 0..6 {
            waits.push(pacer.pace("www.example.com").await.as_secs());
        }
        assert_eq!(waits, vec![1, 2, 3, 4, 1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_reservations_queue_behind_each_other() {
        let pacer = Pacer::new(Duration::from_secs(1), 4);
        let start = Instant::now();
        let a = pacer.reserve("h").await;
        let b = pacer.reserve("h").await;
        let c = pacer.reserve("h").await;
        assert_eq!(a - start, Duration::from_secs(1));
        assert_eq!(b - start, Duration::from_secs(3));
        assert_eq!(c - start, Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hosts_are_independent() {
        let pacer = Pacer::new(Duration::from_secs(1), 4);
        let start = Instant::now();
        pacer.reserve("a").await;
        pacer.reserve("a").await;
        let other = pacer.reserve("b").await;
        assert_eq!(other - start, Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_step_never_waits() {
        let pacer = Pacer::new(Duration::ZERO, 4);
        for _ in 0..5 {
            assert!(pacer.pace("h").await.is_zero());
        }
    }
}
