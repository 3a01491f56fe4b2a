use serde::Serialize;
use serde_json::Value;

use crate::domain::value_objects::{ConnectionId, SubscriptionKey, Timestamp};

/// Client-relevant slice of the relay configuration, sent in the handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    pub polling_interval_ms: u64,
    pub failure_threshold: u32,
    pub max_batch: usize,
}

/// Everything the relay ever pushes to one connection
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    Connected {
        id: ConnectionId,
        timestamp: Timestamp,
        config: ClientConfig,
    },
    Subscribed {
        key: SubscriptionKey,
        timestamp: Timestamp,
        interval_ms: u64,
    },
    Unsubscribed {
        key: SubscriptionKey,
        timestamp: Timestamp,
    },
    /// One relayed, deduplicated remote entry
    Message(Value),
    Error {
        message: String,
        details: Option<Value>,
        timestamp: Timestamp,
    },
    Pong {
        timestamp: Timestamp,
    },
}

impl ConnectionEvent {
    pub fn error(message: impl Into<String>, details: Option<Value>, timestamp: Timestamp) -> Self {
        ConnectionEvent::Error {
            message: message.into(),
            details,
            timestamp,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ConnectionEvent::Error { .. })
    }
}
