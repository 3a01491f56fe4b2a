//! The relay's single control-flow context.
//!
//! Connection events and poll-tick results are all serialized through one
//! command channel. The registry and orchestrator are owned by that task and
//! never shared, so subscriber counts and pollers cannot drift apart.

mod command;
mod handle;
mod orchestrator;
mod registry;

pub use command::{EngineSnapshot, PollerSnapshot, RelayCommand, TickVerdict};
pub use handle::RelayHandle;
pub use orchestrator::{PollingOrchestrator, PollingSettings};
pub use registry::{ConnectionRegistry, KeyCount, SubscriptionChange};

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::application::ports::LogFetcher;
use crate::domain::{Clock, Connection, ConnectionEvent, ConnectionId, SubscriptionKey};

/// Capacity of the engine's command queue
const COMMAND_BUFFER_SIZE: usize = 1024;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Relay engine is not running")]
    EngineUnavailable,
    #[error("Unknown connection: {0}")]
    UnknownConnection(ConnectionId),
    #[error("Connection already registered: {0}")]
    DuplicateConnection(ConnectionId),
}

/// Owns the Connection Registry and the Polling Orchestrator
pub struct RelayEngine {
    registry: ConnectionRegistry,
    orchestrator: PollingOrchestrator,
    clock: Arc<dyn Clock>,
    receiver: mpsc::Receiver<RelayCommand>,
}

impl RelayEngine {
    /// Spawn the control task and return its handle
    pub fn spawn(
        fetcher: Arc<dyn LogFetcher>,
        clock: Arc<dyn Clock>,
        settings: PollingSettings,
    ) -> (RelayHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(COMMAND_BUFFER_SIZE);
        let engine = RelayEngine {
            registry: ConnectionRegistry::new(),
            orchestrator: PollingOrchestrator::new(fetcher, settings, sender.downgrade()),
            clock,
            receiver,
        };

        let task = tokio::spawn(engine.run());
        (RelayHandle::new(sender), task)
    }

    /// Main event loop - processes commands sequentially
    async fn run(mut self) {
        tracing::info!("Relay engine started");

        while let Some(cmd) = self.receiver.recv().await {
            if !self.process_command(cmd) {
                break;
            }
        }

        self.orchestrator.stop_all();
        tracing::info!("Relay engine stopped");
    }

    /// Process a single command, returns false if should shutdown
    fn process_command(&mut self, cmd: RelayCommand) -> bool {
        match cmd {
            RelayCommand::Connect {
                id,
                origin,
                outbound,
                response,
            } => {
                let _ = response.send(self.handle_connect(id, origin, outbound));
            }

            RelayCommand::Subscribe { id, key, response } => {
                let _ = response.send(self.handle_subscribe(id, key));
            }

            RelayCommand::Unsubscribe { id, response } => {
                let _ = response.send(self.handle_unsubscribe(id));
            }

            RelayCommand::Disconnect { id, response } => {
                self.handle_disconnect(id);
                let _ = response.send(());
            }

            RelayCommand::Touch { id } => {
                self.registry.touch(id, self.clock.now());
            }

            RelayCommand::TickCompleted {
                key,
                generation,
                result,
                verdict,
            } => {
                let outcome = self.orchestrator.complete_tick(
                    &key,
                    generation,
                    result,
                    &self.registry,
                    self.clock.now(),
                );
                let _ = verdict.send(outcome);
            }

            RelayCommand::Snapshot { response } => {
                let _ = response.send(EngineSnapshot {
                    connections: self.registry.connection_count(),
                    subscriptions: self.registry.subscription_counts(),
                    pollers: self.orchestrator.snapshot(),
                });
            }

            RelayCommand::Shutdown => return false,
        }
        true
    }

    fn handle_connect(
        &mut self,
        id: ConnectionId,
        origin: String,
        outbound: mpsc::UnboundedSender<ConnectionEvent>,
    ) -> bool {
        let now = self.clock.now();
        let handshake = ConnectionEvent::Connected {
            id,
            timestamp: now,
            config: self.orchestrator.settings().client_config(),
        };

        if !self
            .registry
            .connect(Connection::new(id, origin.clone(), now), outbound)
        {
            tracing::warn!(connection_id = %id, "Duplicate connection id rejected");
            return false;
        }

        self.registry.send(id, handshake);
        tracing::info!(connection_id = %id, origin = %origin, "Client connected");
        true
    }

    fn handle_subscribe(&mut self, id: ConnectionId, key: SubscriptionKey) -> Option<usize> {
        let Some(change) = self.registry.subscribe(id, key.clone()) else {
            tracing::warn!(connection_id = %id, key = %key, "Subscribe from unknown connection");
            return None;
        };

        if let Some(previous) = &change.previous {
            self.release_if_unused(&previous.key, previous.count);
        }

        // Ack before the first tick can deliver anything
        let now = self.clock.now();
        self.registry.send(
            id,
            ConnectionEvent::Subscribed {
                key: key.clone(),
                timestamp: now,
                interval_ms: self.orchestrator.settings().interval.as_millis() as u64,
            },
        );

        // First subscriber, or a new subscription to an error-stopped key
        if !self.orchestrator.is_polling(&key) {
            self.orchestrator.start(&key);
        }

        tracing::info!(
            connection_id = %id,
            key = %key,
            subscribers = change.count,
            "Client subscribed"
        );
        Some(change.count)
    }

    fn handle_unsubscribe(&mut self, id: ConnectionId) -> Option<SubscriptionKey> {
        let released = self.registry.unsubscribe(id)?;
        self.registry.send(
            id,
            ConnectionEvent::Unsubscribed {
                key: released.key.clone(),
                timestamp: self.clock.now(),
            },
        );
        self.release_if_unused(&released.key, released.count);

        tracing::info!(connection_id = %id, key = %released.key, "Client unsubscribed");
        Some(released.key)
    }

    fn handle_disconnect(&mut self, id: ConnectionId) {
        if !self.registry.contains(id) {
            tracing::debug!(connection_id = %id, "Disconnect for unknown connection ignored");
            return;
        }

        if let Some(released) = self.registry.disconnect(id) {
            self.release_if_unused(&released.key, released.count);
        }
        tracing::info!(connection_id = %id, "Client disconnected");
    }

    fn release_if_unused(&mut self, key: &SubscriptionKey, count: usize) {
        if count == 0 {
            self.orchestrator.stop(key);
        }
    }
}
