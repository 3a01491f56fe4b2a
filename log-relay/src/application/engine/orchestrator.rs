use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::application::ports::{FetchResult, LogFetcher};
use crate::domain::{
    ClientConfig, ConnectionEvent, CursorAdvance, PollerState, SubscriptionKey, Timestamp,
};

use super::command::{PollerSnapshot, RelayCommand, TickVerdict};
use super::registry::ConnectionRegistry;

/// Scheduling knobs for every poller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingSettings {
    /// Delay between recurring ticks
    pub interval: Duration,
    /// Consecutive failed ticks before a poller stops
    pub failure_threshold: u32,
    /// Most entries relayed per tick; the rest wait for later ticks
    pub max_batch: usize,
}

impl Default for PollingSettings {
    fn default() -> Self {
        PollingSettings {
            interval: Duration::from_millis(5000),
            failure_threshold: 5,
            max_batch: 100,
        }
    }
}

impl PollingSettings {
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            polling_interval_ms: self.interval.as_millis() as u64,
            failure_threshold: self.failure_threshold,
            max_batch: self.max_batch,
        }
    }
}

/// A running (or error-stopped) poller: its state plus the task driving it
struct Poller {
    state: PollerState,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl Poller {
    fn halt(&self) {
        self.cancel.cancel();
    }
}

/// Owns the per-key polling state machine.
///
/// ABSENT -> ACTIVE when a key gains its first subscriber, ACTIVE ->
/// STOPPED_ON_ERROR when the failure threshold is hit, and back to ABSENT
/// (state and cursor discarded) when the last subscriber leaves. Only the
/// engine's control task calls into it, so cursors have a single writer.
pub struct PollingOrchestrator {
    fetcher: Arc<dyn LogFetcher>,
    settings: PollingSettings,
    pollers: HashMap<SubscriptionKey, Poller>,
    next_generation: u64,
    commands: mpsc::WeakSender<RelayCommand>,
}

impl PollingOrchestrator {
    pub fn new(
        fetcher: Arc<dyn LogFetcher>,
        settings: PollingSettings,
        commands: mpsc::WeakSender<RelayCommand>,
    ) -> Self {
        PollingOrchestrator {
            fetcher,
            settings,
            pollers: HashMap::new(),
            next_generation: 1,
            commands,
        }
    }

    pub fn settings(&self) -> &PollingSettings {
        &self.settings
    }

    pub fn is_polling(&self, key: &SubscriptionKey) -> bool {
        self.pollers
            .get(key)
            .is_some_and(|poller| poller.state.is_active())
    }

    /// Create a fresh poller for `key` (cursor 0, no failures), replacing
    /// any stopped one. The first tick runs immediately on the new task.
    pub fn start(&mut self, key: &SubscriptionKey) {
        if let Some(old) = self.pollers.remove(key) {
            old.halt();
        }

        let generation = self.next_generation;
        self.next_generation += 1;

        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_poller(
            key.clone(),
            generation,
            Arc::clone(&self.fetcher),
            self.settings.interval,
            cancel.clone(),
            self.commands.clone(),
        ));

        tracing::info!(key = %key, generation, "Poller started");
        self.pollers.insert(
            key.clone(),
            Poller {
                state: PollerState::new(key.clone(), generation),
                cancel,
                task,
            },
        );
    }

    /// Tear down `key`'s poller and discard its cursor
    pub fn stop(&mut self, key: &SubscriptionKey) {
        if let Some(poller) = self.pollers.remove(key) {
            poller.halt();
            tracing::info!(
                key = %key,
                generation = poller.state.generation,
                cursor = poller.state.cursor(),
                "Poller stopped, no subscribers left"
            );
        }
    }

    pub fn stop_all(&mut self) {
        for (_, poller) in self.pollers.drain() {
            poller.halt();
        }
    }

    /// Apply one resolved fetch: dedup, deliver, and account for failures
    pub fn complete_tick(
        &mut self,
        key: &SubscriptionKey,
        generation: u64,
        result: FetchResult,
        registry: &ConnectionRegistry,
        now: Timestamp,
    ) -> TickVerdict {
        let Some(poller) = self.pollers.get_mut(key) else {
            tracing::debug!(key = %key, generation, "Discarding tick for torn-down poller");
            return TickVerdict::Stop;
        };
        if poller.state.generation != generation
            || poller.cancel.is_cancelled()
            || !poller.state.is_active()
        {
            tracing::debug!(key = %key, generation, "Discarding stale tick");
            return TickVerdict::Stop;
        }

        match result {
            Ok(log) => {
                poller.state.record_success(now);
                match poller.state.advance(&log.entries, self.settings.max_batch) {
                    CursorAdvance::Fresh { entries, withheld } => {
                        if !entries.is_empty() {
                            let events: Vec<_> = entries
                                .iter()
                                .map(|entry| ConnectionEvent::Message(entry.payload().clone()))
                                .collect();
                            registry.broadcast_all(key, &events);
                            tracing::debug!(
                                key = %key,
                                delivered = events.len(),
                                cursor = poller.state.cursor(),
                                "Relayed new entries"
                            );
                        }
                        if withheld > 0 {
                            tracing::debug!(key = %key, withheld, "Batch cap reached");
                        }
                    }
                    CursorAdvance::Shrunk { remote_len, cursor } => {
                        tracing::warn!(
                            key = %key,
                            remote_len,
                            cursor,
                            "Remote log shorter than delivered position, skipping tick"
                        );
                    }
                }
                TickVerdict::Continue
            }
            Err(error) => {
                let threshold = self.settings.failure_threshold;
                if poller.state.record_failure(threshold) {
                    poller.halt();
                    let failures = poller.state.consecutive_failures();
                    tracing::error!(
                        key = %key,
                        failures,
                        error = %error,
                        "Polling stopped after consecutive failures"
                    );
                    let event = ConnectionEvent::error(
                        format!("Polling stopped after {} consecutive failures", failures),
                        Some(json!({
                            "key": key,
                            "failures": failures,
                            "reason": error.kind(),
                            "lastError": error.to_string(),
                        })),
                        now,
                    );
                    registry.broadcast(key, &event);
                    TickVerdict::Stop
                } else {
                    tracing::warn!(
                        key = %key,
                        failures = poller.state.consecutive_failures(),
                        error = %error,
                        "Poll tick failed"
                    );
                    TickVerdict::Continue
                }
            }
        }
    }

    pub fn snapshot(&self) -> Vec<PollerSnapshot> {
        let mut pollers: Vec<_> = self
            .pollers
            .values()
            .map(|poller| PollerSnapshot {
                key: poller.state.key.clone(),
                generation: poller.state.generation,
                cursor: poller.state.cursor(),
                consecutive_failures: poller.state.consecutive_failures(),
                active: poller.state.is_active(),
                last_poll: poller.state.last_poll(),
                task_finished: poller.task.is_finished(),
            })
            .collect();
        pollers.sort_by(|a, b| a.key.cmp(&b.key));
        pollers
    }
}

impl Drop for PollingOrchestrator {
    fn drop(&mut self) {
        self.stop_all();
    }
}

/// Drive one key: an immediate tick, then one per interval.
///
/// Each tick's fetch (retries included) and the control task's verdict are
/// awaited before the next tick may start; overrun ticks are skipped.
async fn run_poller(
    key: SubscriptionKey,
    generation: u64,
    fetcher: Arc<dyn LogFetcher>,
    interval: Duration,
    cancel: CancellationToken,
    commands: mpsc::WeakSender<RelayCommand>,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = fetcher.fetch(&key) => result,
        };

        let Some(sender) = commands.upgrade() else {
            break;
        };
        let (verdict_tx, verdict_rx) = oneshot::channel();
        let sent = sender
            .send(RelayCommand::TickCompleted {
                key: key.clone(),
                generation,
                result,
                verdict: verdict_tx,
            })
            .await;
        drop(sender);
        if sent.is_err() {
            break;
        }

        match verdict_rx.await {
            Ok(TickVerdict::Continue) => {}
            Ok(TickVerdict::Stop) | Err(_) => break,
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
    }

    tracing::debug!(key = %key, generation, "Poll task exited");
}
