use crate::domain::value_objects::Timestamp;

/// Basic clock trait - provides current time
///
/// The admission limiter and every outbound event timestamp read time
/// through this trait, so tests can substitute a manually advanced clock.
pub trait Clock: Send + Sync {
    /// Get current time from this clock's perspective
    fn now(&self) -> Timestamp;

    /// Get current time as milliseconds since Unix epoch
    fn now_millis(&self) -> i64 {
        self.now().timestamp_millis()
    }
}
