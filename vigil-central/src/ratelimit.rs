//! Per-machine request quota over a fixed time window.
//!
//! Counters are keyed by pcId. The window is fixed: the first request after
//! a window elapses resets the counter, there is no sliding average.
//! Rejected calls are not queued; agents drop and retry on their next
//! natural interval.

use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Limited { retry_after_secs: u64 },
}

#[derive(Debug)]
struct WindowCounter {
    window_start: Instant,
    count: u32,
}

#[derive(Debug)]
pub struct RateLimiter {
    quota: u32,
    window: Duration,
    counters: HashMap<String, WindowCounter>,
}

impl RateLimiter {
    pub fn new(quota: u32, window: Duration) -> Self {
        Self {
            quota,
            window,
            counters: HashMap::new(),
        }
    }

    pub fn allow(&mut self, pc_id: &str) -> RateDecision {
        self.allow_at(pc_id, Instant::now())
    }

    fn allow_at(&mut self, pc_id: &str, now: Instant) -> RateDecision {
        let counter = self
            .counters
            .entry(pc_id.to_string())
            .or_insert(WindowCounter { window_start: now, count: 0 });

        if now.duration_since(counter.window_start) >= self.window {
            counter.window_start = now;
            counter.count = 0;
        }

        if counter.count >= self.quota {
            let elapsed = now.duration_since(counter.window_start);
            let retry_after_secs = self.window.saturating_sub(elapsed).as_secs().max(1);
            return RateDecision::Limited { retry_after_secs };
        }

        counter.count += 1;
        RateDecision::Allowed {
            remaining: self.quota - counter.count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_exhausts_then_recovers() {
        let mut limiter = RateLimiter::new(3, Duration::from_secs(60));
        let start = Instant::now();

        for _ in 0..3 {
            assert!(matches!(
                limiter.allow_at("pc", start),
                RateDecision::Allowed { .. }
            ));
        }
        assert!(matches!(
            limiter.allow_at("pc", start),
            RateDecision::Limited { .. }
        ));

        // next window
        let later = start + Duration::from_secs(61);
        assert!(matches!(
            limiter.allow_at("pc", later),
            RateDecision::Allowed { remaining: 2 }
        ));
    }

    #[test]
    fn counters_are_per_pc() {
        let mut limiter = RateLimiter::new(1, Duration::from_secs(60));
        let now = Instant::now();
        assert!(matches!(
            limiter.allow_at("a", now),
            RateDecision::Allowed { .. }
        ));
        assert!(matches!(
            limiter.allow_at("a", now),
            RateDecision::Limited { .. }
        ));
        assert!(matches!(
            limiter.allow_at("b", now),
            RateDecision::Allowed { .. }
        ));
    }

    #[test]
    fn retry_hint_never_zero() {
        let mut limiter = RateLimiter::new(0, Duration::from_secs(5));
        let now = Instant::now();
        match limiter.allow_at("pc", now) {
            RateDecision::Limited { retry_after_secs } => assert!(retry_after_secs >= 1),
            other => panic!("expected limit, got {other:?}"),
        }
    }
}
