use thiserror::Error;

/// Fixed-window admission settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Window length in milliseconds
    pub window_ms: u64,
    /// Requests allowed per origin per window
    pub max_requests: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        RateLimitConfig {
            window_ms: 900_000,
            max_requests: 100,
        }
    }
}

/// Rejection issued once an origin exceeds its window budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Too many requests, retry after {retry_after_seconds}s")]
pub struct RateLimitExceeded {
    pub retry_after_seconds: u64,
}

/// Per-origin request throttle guarding connection establishment and
/// subscription requests
pub trait AdmissionLimiter: Send + Sync {
    /// Count one request from `origin` at `now_ms` (Unix millis)
    fn admit(&self, origin: &str, now_ms: i64) -> Result<(), RateLimitExceeded>;

    /// Number of origins currently holding a window
    fn tracked_origins(&self) -> usize;

    fn config(&self) -> &RateLimitConfig;
}
