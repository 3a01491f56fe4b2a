use serde_json::json;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::application::engine::{RelayError, RelayHandle};
use crate::application::ports::{AdmissionLimiter, RateLimitExceeded};
use crate::domain::{
    Clock, ConnectionEvent, ConnectionId, InputValidator, SubscriptionKey, Timestamp,
    ValidationError,
};

/// A raw subscribe request as received from a client
#[derive(Debug, Clone, Default)]
pub struct SubscribeRequest {
    /// Validated exactly as sent; never rewritten
    pub key: String,
    /// Free-form fields sent alongside the key
    pub fields: BTreeMap<String, String>,
}

impl SubscribeRequest {
    pub fn new(key: impl Into<String>) -> Self {
        SubscribeRequest {
            key: key.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }
}

/// The admission stages, in the order they run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeStage {
    Sanitize,
    Validate,
    RateLimit,
    Subscribe,
}

impl SubscribeStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscribeStage::Sanitize => "sanitize",
            SubscribeStage::Validate => "validate",
            SubscribeStage::RateLimit => "rate_limit",
            SubscribeStage::Subscribe => "subscribe",
        }
    }
}

impl fmt::Display for SubscribeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct SubscribeOutcome {
    pub key: SubscriptionKey,
    /// Subscribers of `key` after this request
    pub subscribers: usize,
    /// The request's free-form fields after sanitizing
    pub fields: BTreeMap<String, String>,
}

/// First rejection raised by the pipeline. Sanitizing only narrows the
/// free-form fields, so it never rejects.
#[derive(Debug, Error)]
pub enum SubscribeError {
    #[error("Invalid subscription key: {0}")]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    RateLimited(#[from] RateLimitExceeded),
    #[error("Subscription failed: {0}")]
    Relay(#[from] RelayError),
}

impl SubscribeError {
    pub fn stage(&self) -> SubscribeStage {
        match self {
            SubscribeError::Validation(_) => SubscribeStage::Validate,
            SubscribeError::RateLimited(_) => SubscribeStage::RateLimit,
            SubscribeError::Relay(_) => SubscribeStage::Subscribe,
        }
    }

    /// The `error` event reported back to the requesting client
    pub fn to_event(&self, now: Timestamp) -> ConnectionEvent {
        let stage = self.stage().as_str();
        match self {
            SubscribeError::Validation(e) => ConnectionEvent::error(
                "Invalid subscription key",
                Some(json!({ "stage": stage, "reason": e.to_string() })),
                now,
            ),
            SubscribeError::RateLimited(e) => ConnectionEvent::error(
                "Too many requests",
                Some(json!({
                    "stage": stage,
                    "retryAfterSeconds": e.retry_after_seconds,
                })),
                now,
            ),
            SubscribeError::Relay(e) => ConnectionEvent::error(
                "Subscription failed",
                Some(json!({ "stage": stage, "reason": e.to_string() })),
                now,
            ),
        }
    }
}

/// Runs a subscribe request through Sanitize, Validate, RateLimit and
/// Subscribe. Rejections before the last stage mutate nothing except the
/// origin's request counter.
///
/// Sanitize applies to the free-form fields only. The key is validated as
/// received, so `" abc"` or `"<abc>"` is rejected rather than rewritten.
pub struct SubscribeUseCase<C, R>
where
    C: Clock + ?Sized,
    R: AdmissionLimiter + ?Sized,
{
    clock: Arc<C>,
    rate_limiter: Arc<R>,
    relay: RelayHandle,
}

impl<C, R> SubscribeUseCase<C, R>
where
    C: Clock + ?Sized,
    R: AdmissionLimiter + ?Sized,
{
    pub fn new(clock: Arc<C>, rate_limiter: Arc<R>, relay: RelayHandle) -> Self {
        Self {
            clock,
            rate_limiter,
            relay,
        }
    }

    pub async fn execute(
        &self,
        connection_id: ConnectionId,
        origin: &str,
        request: SubscribeRequest,
    ) -> Result<SubscribeOutcome, SubscribeError> {
        let fields: BTreeMap<String, String> = request
            .fields
            .iter()
            .map(|(name, value)| (name.clone(), InputValidator::sanitize(value)))
            .collect();

        let key = SubscriptionKey::new(request.key).inspect_err(|e| {
            tracing::debug!(connection_id = %connection_id, error = %e, "Subscribe rejected");
        })?;

        self.rate_limiter
            .admit(origin, self.clock.now_millis())
            .inspect_err(|e| {
                tracing::warn!(
                    connection_id = %connection_id,
                    origin = %origin,
                    retry_after = e.retry_after_seconds,
                    "Subscribe rate limited"
                );
            })?;

        let subscribers = self.relay.subscribe(connection_id, key.clone()).await?;
        if !fields.is_empty() {
            tracing::debug!(connection_id = %connection_id, key = %key, fields = ?fields, "Subscribe fields");
        }
        Ok(SubscribeOutcome {
            key,
            subscribers,
            fields,
        })
    }
}
