//! A small token-bucket rate limiter, standing in for the
//! `VLOG_RATE_LIMIT_INIT`/`vlog_should_drop` pattern the original controller
//! sprinkles ahead of every noisy log site. The workspace doesn't already
//! depend on a rate-limiting crate, so this is hand-rolled rather than
//! reached for one purely to cover a handful of call sites.

use std::time::{Duration, Instant};

/// Allows up to `burst` calls immediately, then refills at `burst` tokens
/// per `window`.
pub(crate) struct RateLimiter {
    burst: u32,
    window: Duration,
    tokens: f64,
    last_refill: Option<Instant>,
}

impl RateLimiter {
    pub(crate) fn new(burst: u32, window_secs: u32) -> Self {
        Self {
            burst,
            window: Duration::from_secs(window_secs.max(1) as u64),
            tokens: burst as f64,
            last_refill: None,
        }
    }

    /// Returns `true` if the caller may proceed (and consumes a token).
    pub(crate) fn allow(&mut self) -> bool {
        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        if let Some(last) = self.last_refill {
            let elapsed = now.duration_since(last).as_secs_f64();
            let rate = self.burst as f64 / self.window.as_secs_f64();
            self.tokens = (self.tokens + elapsed * rate).min(self.burst as f64);
        }
        self.last_refill = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_then_drop() {
        let mut rl = RateLimiter::new(2, 300);
        assert!(rl.allow());
        assert!(rl.allow());
        assert!(!rl.allow());
    }
}
