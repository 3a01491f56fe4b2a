use crate::domain::{Clock, Timestamp};
use chrono::{Duration, Utc};
use parking_lot::RwLock;
use std::sync::Arc;

/// Clock that only moves when told to
///
/// Clones share the same underlying time, so a test can keep one handle
/// and advance the clock seen by the component under test.
#[derive(Debug, Clone)]
pub struct ManualClock {
    inner: Arc<RwLock<Timestamp>>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        ManualClock {
            inner: Arc::new(RwLock::new(start)),
        }
    }

    pub fn advance(&self, duration: Duration) {
        *self.inner.write() += duration;
    }

    pub fn advance_millis(&self, millis: i64) {
        self.advance(Duration::milliseconds(millis));
    }

    pub fn set(&self, time: Timestamp) {
        *self.inner.write() = time;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.inner.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_fixed_time_does_not_advance() {
        let clock = ManualClock::default();
        let t1 = clock.now();
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert_eq!(clock.now(), t1);
    }

    #[test]
    fn test_advance_and_set() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let clock = ManualClock::new(start);

        clock.advance_millis(1500);
        assert_eq!(clock.now_millis(), start.timestamp_millis() + 1500);

        clock.set(start);
        assert_eq!(clock.now(), start);
    }

    #[test]
    fn test_clone_shares_state() {
        let clock = ManualClock::default();
        let other = clock.clone();
        let before = other.now();

        clock.advance(Duration::seconds(10));
        assert_eq!(other.now() - before, Duration::seconds(10));
    }
}
