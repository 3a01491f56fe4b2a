mod log_fetcher;
mod rate_limiter;

pub use log_fetcher::{FetchError, FetchResult, LogFetcher, LogSource};
pub use rate_limiter::{AdmissionLimiter, RateLimitConfig, RateLimitExceeded};
