use crate::domain::services::{CursorAdvance, LogCursor};
use crate::domain::value_objects::{SubscriptionKey, Timestamp};

use super::RemoteLogEntry;

/// Scheduling status of a key that has at least one subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerStatus {
    /// Recurring ticks are scheduled
    Active,
    /// Consecutive failures hit the threshold; idle until re-subscribed
    StoppedOnError,
}

/// Per-key polling state. Exists exactly while the key has subscribers;
/// dropping it discards the cursor.
#[derive(Debug, Clone)]
pub struct PollerState {
    pub key: SubscriptionKey,
    /// Distinguishes this instance from earlier pollers of the same key
    pub generation: u64,
    cursor: LogCursor,
    consecutive_failures: u32,
    last_poll: Option<Timestamp>,
    status: PollerStatus,
}

impl PollerState {
    pub fn new(key: SubscriptionKey, generation: u64) -> Self {
        PollerState {
            key,
            generation,
            cursor: LogCursor::new(),
            consecutive_failures: 0,
            last_poll: None,
            status: PollerStatus::Active,
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor.position()
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn last_poll(&self) -> Option<Timestamp> {
        self.last_poll
    }

    pub fn status(&self) -> PollerStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status == PollerStatus::Active
    }

    pub fn record_success(&mut self, now: Timestamp) {
        self.consecutive_failures = 0;
        self.last_poll = Some(now);
    }

    /// Count a failed tick. Returns true when this failure reaches
    /// `threshold` and the poller transitions to `StoppedOnError`.
    pub fn record_failure(&mut self, threshold: u32) -> bool {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        if self.is_active() && self.consecutive_failures >= threshold {
            self.status = PollerStatus::StoppedOnError;
            return true;
        }
        false
    }

    /// Deduplicate one fetched log against this key's cursor
    pub fn advance<'a>(
        &mut self,
        raw: &'a [RemoteLogEntry],
        max_batch: usize,
    ) -> CursorAdvance<'a, RemoteLogEntry> {
        self.cursor.advance(raw, max_batch)
    }
}
