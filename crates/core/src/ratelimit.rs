//! Process-wide fixed-window rate limiting.
//!
//! One counter and one window start behind a mutex. The window resets once a
//! full period has elapsed since it opened. Rejection is immediate; callers
//! never wait here.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::Error;
use crate::clock::{Clock, SystemClock, to_time_delta};

#[derive(Debug)]
struct Window {
    started: DateTime<Utc>,
    count: u32,
}

/// Requests-per-window limiter shared by every request in the process.
#[derive(Debug)]
pub struct RateLimiter {
    name: &'static str,
    max_requests: u32,
    period: Duration,
    window: Mutex<Window>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Limiter allowing `max_requests` per minute. Zero disables it.
    pub fn per_minute(name: &'static str, max_requests: u32) -> Self {
        Self::with_clock(name, max_requests, Duration::from_secs(60), Arc::new(SystemClock))
    }

    pub fn with_clock(name: &'static str, max_requests: u32, period: Duration, clock: Arc<dyn Clock>) -> Self {
        let started = clock.now();
        tracing::info!(limiter = name, max_requests, period_secs = period.as_secs(), "rate limiter initialized");
        Self { name, max_requests, period, window: Mutex::new(Window { started, count: 0 }), clock }
    }

    pub fn is_enabled(&self) -> bool {
        self.max_requests > 0
    }

    /// Take one slot from the current window.
    ///
    /// # Errors
    ///
    /// Returns `Error::RateLimited` when the window is already full.
    pub fn try_acquire(&self) -> Result<(), Error> {
        if !self.is_enabled() {
            return Ok(());
        }

        let now = self.clock.now();
        let mut window = self.window.lock();
        if now - window.started >= to_time_delta(self.period) {
            window.started = now;
            window.count = 0;
        }

        if window.count >= self.max_requests {
            tracing::warn!(limiter = self.name, max_requests = self.max_requests, "rate limit exceeded");
            return Err(Error::RateLimited(format!(
                "{}: max {} requests per {}s",
                self.name,
                self.max_requests,
                self.period.as_secs()
            )));
        }

        window.count += 1;
        Ok(())
    }

    /// Slots left in the current window (`u32::MAX` when disabled).
    pub fn remaining(&self) -> u32 {
        if !self.is_enabled() {
            return u32::MAX;
        }
        let now = self.clock.now();
        let window = self.window.lock();
        if now - window.started >= to_time_delta(self.period) {
            self.max_requests
        } else {
            self.max_requests.saturating_sub(window.count)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn limiter(max: u32) -> (RateLimiter, ManualClock) {
        let clock = ManualClock::default();
        let limiter = RateLimiter::with_clock("test", max, Duration::from_secs(60), Arc::new(clock.clone()));
        (limiter, clock)
    }

    #[test]
    fn test_rejects_when_window_full() {
        let (limiter, _clock) = limiter(2);
        assert!(limiter.try_acquire().is_ok());
        assert!(limiter.try_acquire().is_ok());
        assert!(matches!(limiter.try_acquire(), Err(Error::RateLimited(_))));
        assert_eq!(limiter.remaining(), 0);
    }

    #[test]
    fn test_window_resets_after_period() {
        let (limiter, clock) = limiter(1);
        assert!(limiter.try_acquire().is_ok());
        assert!(limiter.try_acquire().is_err());

        clock.advance(Duration::from_secs(59));
        assert!(limiter.try_acquire().is_err());

        clock.advance(Duration::from_secs(1));
        assert_eq!(limiter.remaining(), 1);
        assert!(limiter.try_acquire().is_ok());
    }

    #[test]
    fn test_zero_disables() {
        let (limiter, _clock) = limiter(0);
        assert!(!limiter.is_enabled());
        for _ in 0..1000 {
            assert!(limiter.try_acquire().is_ok());
        }
    }
}
