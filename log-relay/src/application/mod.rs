pub mod engine;
pub mod ports;
pub mod use_cases;

pub use engine::{
    EngineSnapshot, PollerSnapshot, PollingSettings, RelayEngine, RelayError, RelayHandle,
    TickVerdict,
};
pub use ports::{
    AdmissionLimiter, FetchError, FetchResult, LogFetcher, LogSource, RateLimitConfig,
    RateLimitExceeded,
};
pub use use_cases::{
    SubscribeError, SubscribeOutcome, SubscribeRequest, SubscribeStage, SubscribeUseCase,
};
