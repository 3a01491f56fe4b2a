pub mod clock;
pub mod config;
pub mod fetch;
pub mod rate_limiter;

pub use clock::{ManualClock, SystemClock};
pub use config::{
    ConfigError, PollingConfig, RateLimitSection, RelayConfig, RemoteConfig, ServerConfig,
};
pub use fetch::{HttpLogSource, MalformedShape, RetryPolicy, RetryingFetcher, parse_remote_log};
pub use rate_limiter::FixedWindowRateLimiter;
