use crate::domain::value_objects::{ConnectionId, SubscriptionKey, Timestamp};

/// One live client connection and its (at most one) subscription
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnectionId,
    /// Rate-limiting identity, typically the peer IP
    pub origin: String,
    pub key: Option<SubscriptionKey>,
    pub created_at: Timestamp,
    pub last_activity: Timestamp,
}

impl Connection {
    pub fn new(id: ConnectionId, origin: impl Into<String>, now: Timestamp) -> Self {
        Connection {
            id,
            origin: origin.into(),
            key: None,
            created_at: now,
            last_activity: now,
        }
    }

    pub fn touch(&mut self, now: Timestamp) {
        if now > self.last_activity {
            self.last_activity = now;
        }
    }

    pub fn is_subscribed_to(&self, key: &SubscriptionKey) -> bool {
        self.key.as_ref() == Some(key)
    }
}
