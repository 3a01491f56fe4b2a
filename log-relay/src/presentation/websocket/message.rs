use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::{ClientConfig, ConnectionEvent, ConnectionId, SubscriptionKey, Timestamp};

/// Incoming client frame: `{ "event": ..., "data": ... }`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Begin or replace this connection's subscription
    Subscribe(SubscribePayload),
    /// Drop the current subscription, keeping the connection open
    Unsubscribe,
    Ping,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SubscribePayload {
    pub key: String,
    /// Any other fields sent alongside the key
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Outgoing server frame, same envelope as [`ClientMessage`]
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum ServerMessage {
    Connected {
        id: ConnectionId,
        timestamp: Timestamp,
        config: ClientConfig,
    },
    Subscribed {
        key: SubscriptionKey,
        timestamp: Timestamp,
        /// Polling interval in milliseconds
        interval: u64,
    },
    Unsubscribed {
        key: SubscriptionKey,
        timestamp: Timestamp,
    },
    Message(Value),
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<Value>,
        timestamp: Timestamp,
    },
    Pong {
        timestamp: Timestamp,
    },
}

impl From<ConnectionEvent> for ServerMessage {
    fn from(event: ConnectionEvent) -> Self {
        match event {
            ConnectionEvent::Connected {
                id,
                timestamp,
                config,
            } => ServerMessage::Connected {
                id,
                timestamp,
                config,
            },
            ConnectionEvent::Subscribed {
                key,
                timestamp,
                interval_ms,
            } => ServerMessage::Subscribed {
                key,
                timestamp,
                interval: interval_ms,
            },
            ConnectionEvent::Unsubscribed { key, timestamp } => {
                ServerMessage::Unsubscribed { key, timestamp }
            }
            ConnectionEvent::Message(payload) => ServerMessage::Message(payload),
            ConnectionEvent::Error {
                message,
                details,
                timestamp,
            } => ServerMessage::Error {
                message,
                details,
                timestamp,
            },
            ConnectionEvent::Pong { timestamp } => ServerMessage::Pong { timestamp },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    #[test]
    fn test_parse_client_messages() {
        let subscribe: ClientMessage =
            serde_json::from_str(r#"{"event":"subscribe","data":{"key":"abc"}}"#).unwrap();
        assert_eq!(
            subscribe,
            ClientMessage::Subscribe(SubscribePayload {
                key: "abc".to_string(),
                extra: Map::new(),
            })
        );

        let tagged: ClientMessage = serde_json::from_str(
            r#"{"event":"subscribe","data":{"key":"abc","note":" <hi> ","n":1}}"#,
        )
        .unwrap();
        match tagged {
            ClientMessage::Subscribe(payload) => {
                assert_eq!(payload.key, "abc");
                assert_eq!(payload.extra["note"], " <hi> ");
                assert_eq!(payload.extra["n"], 1);
            }
            other => panic!("expected subscribe, got {:?}", other),
        }

        let ping: ClientMessage = serde_json::from_str(r#"{"event":"ping"}"#).unwrap();
        assert_eq!(ping, ClientMessage::Ping);

        let unsubscribe: ClientMessage =
            serde_json::from_str(r#"{"event":"unsubscribe"}"#).unwrap();
        assert_eq!(unsubscribe, ClientMessage::Unsubscribe);
    }

    #[test]
    fn test_reject_unknown_or_incomplete_frames() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"event":"launch"}"#).is_err());
        assert!(serde_json::from_str::<ClientMessage>(r#"{"event":"subscribe"}"#).is_err());
        assert!(serde_json::from_str::<ClientMessage>("not json").is_err());
    }

    #[test]
    fn test_server_message_envelope() {
        let timestamp = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let subscribed = ServerMessage::from(ConnectionEvent::Subscribed {
            key: SubscriptionKey::new("abc").unwrap(),
            timestamp,
            interval_ms: 5000,
        });

        assert_eq!(
            serde_json::to_value(&subscribed).unwrap(),
            json!({
                "event": "subscribed",
                "data": {
                    "key": "abc",
                    "timestamp": "2024-01-01T00:00:00Z",
                    "interval": 5000
                }
            })
        );
    }

    #[test]
    fn test_message_payload_is_passed_through() {
        let message = ServerMessage::from(ConnectionEvent::Message(json!({"id": 7, "text": "hi"})));
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({ "event": "message", "data": { "id": 7, "text": "hi" } })
        );
    }

    #[test]
    fn test_error_omits_missing_details() {
        let timestamp = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let error = ServerMessage::from(ConnectionEvent::error("Invalid request", None, timestamp));
        let value = serde_json::to_value(&error).unwrap();

        assert_eq!(value["event"], "error");
        assert_eq!(value["data"]["message"], "Invalid request");
        assert!(value["data"].get("details").is_none());
    }
}
