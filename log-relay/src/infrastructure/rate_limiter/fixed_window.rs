use crate::application::ports::{AdmissionLimiter, RateLimitConfig, RateLimitExceeded};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

/// One origin's window: requests counted since the window opened
#[derive(Debug, Clone, Copy)]
struct RateWindow {
    count: u32,
    reset_at_ms: i64,
}

impl RateWindow {
    fn open(now_ms: i64, window_ms: i64) -> Self {
        RateWindow {
            count: 1,
            reset_at_ms: now_ms + window_ms,
        }
    }

    fn is_expired(&self, now_ms: i64) -> bool {
        now_ms >= self.reset_at_ms
    }
}

/// Fixed-window request counter per origin
///
/// O(1) memory per origin. A window opens on an origin's first request and
/// resets on the first request at or after its reset time. Expired windows
/// are swept lazily, at most once per window length.
pub struct FixedWindowRateLimiter {
    config: RateLimitConfig,
    windows: Arc<DashMap<String, RateWindow>>,
    last_purge_ms: AtomicI64,
}

impl FixedWindowRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        FixedWindowRateLimiter {
            config,
            windows: Arc::new(DashMap::new()),
            last_purge_ms: AtomicI64::new(i64::MIN),
        }
    }

    fn window_ms(&self) -> i64 {
        i64::try_from(self.config.window_ms).unwrap_or(i64::MAX)
    }

    /// Drop windows that have already expired. Must not run while a map
    /// guard is held.
    fn purge_expired(&self, now_ms: i64) {
        let last = self.last_purge_ms.load(Ordering::Relaxed);
        if now_ms.saturating_sub(last) < self.window_ms() {
            return;
        }
        if self
            .last_purge_ms
            .compare_exchange(last, now_ms, Ordering::AcqRel, Ordering::Relaxed)
            .is_err()
        {
            return;
        }

        let before = self.windows.len();
        self.windows.retain(|_, window| !window.is_expired(now_ms));
        let purged = before.saturating_sub(self.windows.len());
        if purged > 0 {
            tracing::debug!(purged, "Purged expired rate windows");
        }
    }

    /// Requests counted for `origin` in its current window
    pub fn current_count(&self, origin: &str) -> u32 {
        self.windows.get(origin).map_or(0, |w| w.count)
    }
}

impl Default for FixedWindowRateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

impl AdmissionLimiter for FixedWindowRateLimiter {
    fn admit(&self, origin: &str, now_ms: i64) -> Result<(), RateLimitExceeded> {
        self.purge_expired(now_ms);

        let window_ms = self.window_ms();
        let window = match self.windows.entry(origin.to_string()) {
            Entry::Vacant(vacant) => {
                vacant.insert(RateWindow::open(now_ms, window_ms));
                return Ok(());
            }
            Entry::Occupied(mut occupied) => {
                let window = occupied.get_mut();
                if window.is_expired(now_ms) {
                    *window = RateWindow::open(now_ms, window_ms);
                    return Ok(());
                }
                window.count = window.count.saturating_add(1);
                *window
            }
        };

        if window.count <= self.config.max_requests {
            return Ok(());
        }

        let remaining_ms = (window.reset_at_ms - now_ms).max(0) as u64;
        Err(RateLimitExceeded {
            retry_after_seconds: remaining_ms.div_ceil(1000),
        })
    }

    fn tracked_origins(&self) -> usize {
        self.windows.len()
    }

    fn config(&self) -> &RateLimitConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    const WINDOW_MS: i64 = 900_000;
    const T0: i64 = 1_700_000_000_000;

    fn limiter() -> FixedWindowRateLimiter {
        FixedWindowRateLimiter::new(RateLimitConfig {
            window_ms: WINDOW_MS as u64,
            max_requests: 100,
        })
    }

    #[test]
    fn test_first_request_always_allowed() {
        let limiter = limiter();
        assert_ok!(limiter.admit("1.2.3.4", T0));
        assert_eq!(limiter.current_count("1.2.3.4"), 1);
    }

    #[test]
    fn test_request_over_limit_rejected_with_retry_hint() {
        let limiter = limiter();
        for _ in 0..100 {
            assert_ok!(limiter.admit("1.2.3.4", T0));
        }

        let err = assert_err!(limiter.admit("1.2.3.4", T0));
        assert_eq!(err.retry_after_seconds, 900);

        // retry hint shrinks with the remaining window, rounding up
        let err = assert_err!(limiter.admit("1.2.3.4", T0 + 1_500));
        assert_eq!(err.retry_after_seconds, 899);
    }

    #[test]
    fn test_window_rolls_over_at_reset_instant() {
        let limiter = limiter();
        for _ in 0..100 {
            limiter.admit("1.2.3.4", T0).unwrap();
        }
        assert_err!(limiter.admit("1.2.3.4", T0 + WINDOW_MS - 1));

        assert_ok!(limiter.admit("1.2.3.4", T0 + WINDOW_MS));
        assert_eq!(limiter.current_count("1.2.3.4"), 1);
    }

    #[test]
    fn test_origins_are_isolated() {
        let limiter = limiter();
        for _ in 0..101 {
            let _ = limiter.admit("1.2.3.4", T0);
        }
        assert_err!(limiter.admit("1.2.3.4", T0));
        assert_ok!(limiter.admit("5.6.7.8", T0));
    }

    #[test]
    fn test_expired_windows_are_purged() {
        let limiter = limiter();
        limiter.admit("a", T0).unwrap();
        limiter.admit("b", T0).unwrap();
        assert_eq!(limiter.tracked_origins(), 2);

        limiter.admit("c", T0 + WINDOW_MS + 1).unwrap();
        assert_eq!(limiter.tracked_origins(), 1);
        assert_eq!(limiter.current_count("a"), 0);
    }
}
