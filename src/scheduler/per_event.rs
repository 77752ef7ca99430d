//! Per-event scheduler: every tracked event owns an independent timer.
//!
//! A timer fires immediately on `start` and then every `interval`. The
//! task map is a `DashMap`, and `start` goes through its entry API so
//! create-if-absent is atomic per id: concurrent starts for one event
//! produce exactly one timer.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::EventScheduler;
use crate::engine::{poll_guarded, EventPoller};
use crate::types::{EventId, SchedulingMode};

/// Handle to one event's timer.
struct TrackedTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct PerEventScheduler {
    tasks: DashMap<EventId, TrackedTask>,
    poller: Arc<dyn EventPoller>,
    interval: Duration,
}

impl PerEventScheduler {
    pub fn new(poller: Arc<dyn EventPoller>, interval: Duration) -> Self {
        Self {
            tasks: DashMap::new(),
            poller,
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Spawn the recurring poll loop for one event.
    ///
    /// Cancellation is only observed between polls, so a poll that has
    /// already started runs to completion.
    fn spawn_timer(&self, event_id: EventId) -> TrackedTask {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let poller = Arc::clone(&self.poller);
        let period = self.interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                poll_guarded(Arc::clone(&poller), event_id.clone()).await;
            }

            debug!(event_id = %event_id, "Per-event timer cancelled");
        });

        TrackedTask { cancel, handle }
    }
}

#[async_trait]
impl EventScheduler for PerEventScheduler {
    fn start(&self, event_id: EventId) {
        match self.tasks.entry(event_id) {
            Entry::Occupied(existing) => {
                debug!(event_id = %existing.key(), "Already tracking, start ignored");
            }
            Entry::Vacant(slot) => {
                info!(
                    event_id = %slot.key(),
                    interval_secs = self.interval.as_secs(),
                    "Starting per-event tracking"
                );
                // Shard lock is held until insert, so a racing stop for
                // this id waits for the handle to be registered.
                let task = self.spawn_timer(slot.key().clone());
                slot.insert(task);
            }
        }
    }

    fn stop(&self, event_id: &EventId) {
        match self.tasks.remove(event_id) {
            Some((_, task)) => {
                task.cancel.cancel();
                info!(event_id = %event_id, "Stopped per-event tracking");
            }
            None => debug!(event_id = %event_id, "Stop ignored, event not tracked"),
        }
    }

    fn is_tracking(&self, event_id: &EventId) -> bool {
        self.tasks.contains_key(event_id)
    }

    fn tracked(&self) -> Vec<EventId> {
        self.tasks.iter().map(|entry| entry.key().clone()).collect()
    }

    fn mode(&self) -> SchedulingMode {
        SchedulingMode::PerEvent
    }

    async fn shutdown(&self) {
        let ids = self.tracked();
        let mut handles = Vec::with_capacity(ids.len());
        for event_id in ids {
            if let Some((_, task)) = self.tasks.remove(&event_id) {
                task.cancel.cancel();
                handles.push((event_id, task.handle));
            }
        }

        for (event_id, handle) in handles {
            if let Err(e) = handle.await {
                error!(event_id = %event_id, error = %e, "Per-event timer task failed");
            }
        }
        info!("Per-event timers stopped");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
