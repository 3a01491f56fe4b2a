use tokio::sync::{mpsc, oneshot};

use crate::domain::{ConnectionEvent, ConnectionId, SubscriptionKey};

use super::RelayError;
use super::command::{EngineSnapshot, RelayCommand};

/// Cloneable front door to the engine's control task
#[derive(Clone, Debug)]
pub struct RelayHandle {
    sender: mpsc::Sender<RelayCommand>,
}

impl RelayHandle {
    pub(super) fn new(sender: mpsc::Sender<RelayCommand>) -> Self {
        RelayHandle { sender }
    }

    async fn send(&self, cmd: RelayCommand) -> Result<(), RelayError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| RelayError::EngineUnavailable)
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> RelayCommand,
    ) -> Result<T, RelayError> {
        let (tx, rx) = oneshot::channel();
        self.send(build(tx)).await?;
        rx.await.map_err(|_| RelayError::EngineUnavailable)
    }

    /// Register a connection; its events (handshake first) go to `outbound`
    pub async fn connect(
        &self,
        id: ConnectionId,
        origin: impl Into<String>,
        outbound: mpsc::UnboundedSender<ConnectionEvent>,
    ) -> Result<(), RelayError> {
        let origin = origin.into();
        let accepted = self
            .request(|response| RelayCommand::Connect {
                id,
                origin,
                outbound,
                response,
            })
            .await?;

        if accepted {
            Ok(())
        } else {
            Err(RelayError::DuplicateConnection(id))
        }
    }

    /// Subscribe a connection to `key`; returns the key's subscriber count
    pub async fn subscribe(&self, id: ConnectionId, key: SubscriptionKey) -> Result<usize, RelayError> {
        self.request(|response| RelayCommand::Subscribe { id, key, response })
            .await?
            .ok_or(RelayError::UnknownConnection(id))
    }

    /// Returns the key that was dropped, if any
    pub async fn unsubscribe(&self, id: ConnectionId) -> Result<Option<SubscriptionKey>, RelayError> {
        self.request(|response| RelayCommand::Unsubscribe { id, response })
            .await
    }

    pub async fn disconnect(&self, id: ConnectionId) -> Result<(), RelayError> {
        self.request(|response| RelayCommand::Disconnect { id, response })
            .await
    }

    pub async fn touch(&self, id: ConnectionId) -> Result<(), RelayError> {
        self.send(RelayCommand::Touch { id }).await
    }

    pub async fn snapshot(&self) -> Result<EngineSnapshot, RelayError> {
        self.request(|response| RelayCommand::Snapshot { response })
            .await
    }

    pub async fn shutdown(&self) {
        let _ = self.send(RelayCommand::Shutdown).await;
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}
