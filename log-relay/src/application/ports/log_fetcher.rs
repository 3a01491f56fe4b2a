use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{RemoteLog, SubscriptionKey};

/// Classified failure of a remote retrieval
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Remote answered with a non-2xx status
    #[error("Remote returned HTTP {status}")]
    Status { status: u16 },
    #[error("Remote request timed out")]
    Timeout,
    #[error("Connection to remote failed: {0}")]
    Connection(String),
    #[error("Remote fetch failed: {0}")]
    Unknown(String),
}

impl FetchError {
    /// Short machine-readable label, used in logs and client error details
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Status { .. } => "http_status",
            FetchError::Timeout => "timeout",
            FetchError::Connection(_) => "connection",
            FetchError::Unknown(_) => "unknown",
        }
    }
}

/// Uniform result of one fetch: the full validated log, or the last error
pub type FetchResult = Result<RemoteLog, FetchError>;

/// A single remote retrieval attempt (no retries)
#[async_trait]
pub trait LogSource: Send + Sync {
    async fn fetch_once(&self, key: &SubscriptionKey) -> FetchResult;
}

/// What the orchestrator calls once per tick. Implementations own their
/// retry policy; a returned error means the retry budget is exhausted.
#[async_trait]
pub trait LogFetcher: Send + Sync {
    async fn fetch(&self, key: &SubscriptionKey) -> FetchResult;
}
