use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::application::{EngineSnapshot, PollerSnapshot};
use crate::domain::Timestamp;

/// GET /health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: Timestamp,
}

/// GET /status
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub connections: usize,
    /// Subscriber count per key
    pub subscriptions: BTreeMap<String, usize>,
    pub pollers: Vec<PollerStatusDto>,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollerStatusDto {
    pub key: String,
    pub cursor: usize,
    pub failures: u32,
    pub active: bool,
    pub last_poll: Option<Timestamp>,
}

impl From<&PollerSnapshot> for PollerStatusDto {
    fn from(poller: &PollerSnapshot) -> Self {
        PollerStatusDto {
            key: poller.key.to_string(),
            cursor: poller.cursor,
            failures: poller.consecutive_failures,
            active: poller.active,
            last_poll: poller.last_poll,
        }
    }
}

impl StatusResponse {
    pub fn from_snapshot(snapshot: &EngineSnapshot, timestamp: Timestamp) -> Self {
        StatusResponse {
            connections: snapshot.connections,
            subscriptions: snapshot
                .subscriptions
                .iter()
                .map(|(key, count)| (key.to_string(), *count))
                .collect(),
            pollers: snapshot.pollers.iter().map(PollerStatusDto::from).collect(),
            timestamp,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        ErrorResponse {
            error: error.into(),
        }
    }
}
