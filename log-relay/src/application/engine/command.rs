use tokio::sync::{mpsc, oneshot};

use crate::application::ports::FetchResult;
use crate::domain::{ConnectionEvent, ConnectionId, SubscriptionKey, Timestamp};

/// Commands processed, one at a time, by the engine's control task
#[derive(Debug)]
pub enum RelayCommand {
    /// Register a connection and send its handshake
    Connect {
        id: ConnectionId,
        origin: String,
        outbound: mpsc::UnboundedSender<ConnectionEvent>,
        response: oneshot::Sender<bool>,
    },

    /// Associate a connection with a key (already validated and admitted)
    Subscribe {
        id: ConnectionId,
        key: SubscriptionKey,
        response: oneshot::Sender<Option<usize>>,
    },

    /// Drop a connection's subscription, keeping the connection
    Unsubscribe {
        id: ConnectionId,
        response: oneshot::Sender<Option<SubscriptionKey>>,
    },

    /// Forget a connection; unknown ids are a no-op
    Disconnect {
        id: ConnectionId,
        response: oneshot::Sender<()>,
    },

    /// Record client activity
    Touch { id: ConnectionId },

    /// A poll task's fetch resolved; the verdict tells it whether to go on
    TickCompleted {
        key: SubscriptionKey,
        generation: u64,
        result: FetchResult,
        verdict: oneshot::Sender<TickVerdict>,
    },

    /// Read-only view for the status endpoint and tests
    Snapshot {
        response: oneshot::Sender<EngineSnapshot>,
    },

    /// Cancel every poller and stop the control task
    Shutdown,
}

/// Answer to a poll task after its tick was applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickVerdict {
    Continue,
    Stop,
}

/// Point-in-time view of one poller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerSnapshot {
    pub key: SubscriptionKey,
    pub generation: u64,
    pub cursor: usize,
    pub consecutive_failures: u32,
    pub active: bool,
    pub last_poll: Option<Timestamp>,
    pub task_finished: bool,
}

/// Point-in-time view of the whole engine
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineSnapshot {
    pub connections: usize,
    pub subscriptions: Vec<(SubscriptionKey, usize)>,
    pub pollers: Vec<PollerSnapshot>,
}

impl EngineSnapshot {
    pub fn poller(&self, key: &SubscriptionKey) -> Option<&PollerSnapshot> {
        self.pollers.iter().find(|p| &p.key == key)
    }

    pub fn subscriber_count(&self, key: &SubscriptionKey) -> usize {
        self.subscriptions
            .iter()
            .find(|(k, _)| k == key)
            .map_or(0, |(_, count)| *count)
    }

    pub fn total_subscribers(&self) -> usize {
        self.subscriptions.iter().map(|(_, count)| count).sum()
    }
}
