use std::collections::{HashMap, HashSet};
use tokio::sync::mpsc;

use crate::domain::{Connection, ConnectionEvent, ConnectionId, SubscriptionKey, Timestamp};

/// A key's subscriber count right after a registry change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCount {
    pub key: SubscriptionKey,
    pub count: usize,
}

/// Result of associating a connection with a key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionChange {
    /// The key the connection left, if it switched keys
    pub previous: Option<KeyCount>,
    /// Subscriber count of the requested key after the change
    pub count: usize,
    /// The connection already held this exact key
    pub unchanged: bool,
}

struct ConnectionEntry {
    connection: Connection,
    outbound: mpsc::UnboundedSender<ConnectionEvent>,
}

/// Live connections and their key associations.
///
/// Sole writer of subscriptions; holds no polling logic. Owned by the
/// engine's control task, so it needs no interior locking.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, ConnectionEntry>,
    subscribers: HashMap<SubscriptionKey, HashSet<ConnectionId>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new connection (no key yet). Returns false if the id is taken.
    pub fn connect(
        &mut self,
        connection: Connection,
        outbound: mpsc::UnboundedSender<ConnectionEvent>,
    ) -> bool {
        if self.connections.contains_key(&connection.id) {
            return false;
        }
        self.connections.insert(
            connection.id,
            ConnectionEntry {
                connection,
                outbound,
            },
        );
        true
    }

    /// Remove a connection, dropping its subscription if it held one.
    /// Unknown ids are a no-op.
    pub fn disconnect(&mut self, id: ConnectionId) -> Option<KeyCount> {
        let entry = self.connections.remove(&id)?;
        let key = entry.connection.key?;
        Some(self.detach(id, key))
    }

    /// Associate `id` with `key`, implicitly leaving any previous key.
    /// Returns `None` for an unknown connection.
    pub fn subscribe(&mut self, id: ConnectionId, key: SubscriptionKey) -> Option<SubscriptionChange> {
        let entry = self.connections.get_mut(&id)?;

        if entry.connection.is_subscribed_to(&key) {
            return Some(SubscriptionChange {
                previous: None,
                count: self.subscriber_count(&key),
                unchanged: true,
            });
        }

        let previous = entry.connection.key.replace(key.clone());
        let previous = previous.map(|old| self.detach(id, old));

        let subscribers = self.subscribers.entry(key).or_default();
        subscribers.insert(id);

        Some(SubscriptionChange {
            previous,
            count: subscribers.len(),
            unchanged: false,
        })
    }

    /// Drop the connection's subscription, keeping the connection.
    pub fn unsubscribe(&mut self, id: ConnectionId) -> Option<KeyCount> {
        let key = self.connections.get_mut(&id)?.connection.key.take()?;
        Some(self.detach(id, key))
    }

    fn detach(&mut self, id: ConnectionId, key: SubscriptionKey) -> KeyCount {
        let count = match self.subscribers.get_mut(&key) {
            Some(set) => {
                set.remove(&id);
                let remaining = set.len();
                if remaining == 0 {
                    self.subscribers.remove(&key);
                }
                remaining
            }
            None => 0,
        };
        KeyCount { key, count }
    }

    pub fn subscriber_count(&self, key: &SubscriptionKey) -> usize {
        self.subscribers.get(key).map_or(0, HashSet::len)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    pub fn key_of(&self, id: ConnectionId) -> Option<&SubscriptionKey> {
        self.connections.get(&id)?.connection.key.as_ref()
    }

    pub fn touch(&mut self, id: ConnectionId, now: Timestamp) {
        if let Some(entry) = self.connections.get_mut(&id) {
            entry.connection.touch(now);
        }
    }

    /// Per-key subscriber counts, sorted by key
    pub fn subscription_counts(&self) -> Vec<(SubscriptionKey, usize)> {
        let mut counts: Vec<_> = self
            .subscribers
            .iter()
            .map(|(key, set)| (key.clone(), set.len()))
            .collect();
        counts.sort_by(|a, b| a.0.cmp(&b.0));
        counts
    }

    /// Push an event to one connection. A closed channel means the socket
    /// is already going away; its disconnect will follow.
    pub fn send(&self, id: ConnectionId, event: ConnectionEvent) -> bool {
        match self.connections.get(&id) {
            Some(entry) => entry.outbound.send(event).is_ok(),
            None => false,
        }
    }

    /// Push a clone of `event` to every connection subscribed to `key`
    pub fn broadcast(&self, key: &SubscriptionKey, event: &ConnectionEvent) -> usize {
        self.subscriber_ids(key)
            .filter(|id| self.send(*id, event.clone()))
            .count()
    }

    /// Push each event, in order, to every connection subscribed to `key`
    pub fn broadcast_all(&self, key: &SubscriptionKey, events: &[ConnectionEvent]) {
        for id in self.subscriber_ids(key) {
            for event in events {
                if !self.send(id, event.clone()) {
                    break;
                }
            }
        }
    }

    fn subscriber_ids<'a>(
        &'a self,
        key: &SubscriptionKey,
    ) -> impl Iterator<Item = ConnectionId> + 'a {
        self.subscribers
            .get(key)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn key(s: &str) -> SubscriptionKey {
        SubscriptionKey::new(s).unwrap()
    }

    fn connect(
        registry: &mut ConnectionRegistry,
    ) -> (ConnectionId, mpsc::UnboundedReceiver<ConnectionEvent>) {
        let id = ConnectionId::new();
        let (tx, rx) = mpsc::unbounded_channel();
        assert!(registry.connect(Connection::new(id, "127.0.0.1", Utc::now()), tx));
        (id, rx)
    }

    #[test]
    fn test_subscribe_reports_count_per_key() {
        let mut registry = ConnectionRegistry::new();
        let (a, _rx_a) = connect(&mut registry);
        let (b, _rx_b) = connect(&mut registry);

        assert_eq!(registry.subscribe(a, key("abc")).unwrap().count, 1);
        assert_eq!(registry.subscribe(b, key("abc")).unwrap().count, 2);
        assert_eq!(registry.subscriber_count(&key("abc")), 2);
    }

    #[test]
    fn test_switching_keys_reports_old_key_count() {
        let mut registry = ConnectionRegistry::new();
        let (a, _rx) = connect(&mut registry);

        registry.subscribe(a, key("first")).unwrap();
        let change = registry.subscribe(a, key("second")).unwrap();

        assert_eq!(
            change.previous,
            Some(KeyCount {
                key: key("first"),
                count: 0
            })
        );
        assert_eq!(change.count, 1);
        assert_eq!(registry.subscriber_count(&key("first")), 0);
        assert_eq!(registry.key_of(a), Some(&key("second")));
    }

    #[test]
    fn test_resubscribing_same_key_is_unchanged() {
        let mut registry = ConnectionRegistry::new();
        let (a, _rx) = connect(&mut registry);

        registry.subscribe(a, key("abc")).unwrap();
        let change = registry.subscribe(a, key("abc")).unwrap();

        assert!(change.unchanged);
        assert_eq!(change.count, 1);
        assert!(change.previous.is_none());
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let mut registry = ConnectionRegistry::new();
        let (a, _rx) = connect(&mut registry);
        registry.subscribe(a, key("abc")).unwrap();

        assert_eq!(
            registry.disconnect(a),
            Some(KeyCount {
                key: key("abc"),
                count: 0
            })
        );
        assert_eq!(registry.disconnect(a), None);
        assert_eq!(registry.connection_count(), 0);
        assert!(registry.subscription_counts().is_empty());
    }

    #[test]
    fn test_unknown_connection_cannot_subscribe() {
        let mut registry = ConnectionRegistry::new();
        assert!(registry.subscribe(ConnectionId::new(), key("abc")).is_none());
        assert_eq!(registry.subscriber_count(&key("abc")), 0);
    }

    #[test]
    fn test_broadcast_reaches_only_subscribers_of_key() {
        let mut registry = ConnectionRegistry::new();
        let (a, mut rx_a) = connect(&mut registry);
        let (b, mut rx_b) = connect(&mut registry);
        registry.subscribe(a, key("abc")).unwrap();
        registry.subscribe(b, key("other")).unwrap();

        let event = ConnectionEvent::Message(serde_json::json!({"id": 1}));
        assert_eq!(registry.broadcast(&key("abc"), &event), 1);

        assert_eq!(rx_a.try_recv().unwrap(), event);
        assert!(rx_b.try_recv().is_err());
    }
}
