//! Batch scheduler: one shared fixed-rate timer polls every live event.
//!
//! Each tick snapshots the registry and spawns one poll per member, so a
//! slow or failing event never holds up the others in the same tick.
//! Ticks run in their own tasks and the timer does not wait for a tick to
//! finish before firing the next one; under load an event may be polled
//! more often than strictly periodic, never less.

use async_trait::async_trait;
use dashmap::DashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use super::EventScheduler;
use crate::engine::{poll_guarded, EventPoller};
use crate::types::{EventId, SchedulingMode};

pub struct BatchScheduler {
    /// Live event registry. Mutated by `start`/`stop`, read by ticks.
    live_events: DashSet<EventId>,
    poller: Arc<dyn EventPoller>,
    interval: Duration,
    shutdown: CancellationToken,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl BatchScheduler {
    pub fn new(poller: Arc<dyn EventPoller>, interval: Duration) -> Self {
        Self {
            live_events: DashSet::new(),
            poller,
            interval,
            shutdown: CancellationToken::new(),
            timer: Mutex::new(None),
        }
    }

    /// Start the shared timer. Calling it again while running is a no-op.
    ///
    /// The timer only holds a weak reference, so it ends on `shutdown` or
    /// when the scheduler is dropped, whichever comes first.
    pub fn spawn(self: &Arc<Self>) {
        let mut timer = self.timer.lock().unwrap_or_else(PoisonError::into_inner);
        if timer.is_some() {
            return;
        }

        let weak = Arc::downgrade(self);
        let cancelled = self.shutdown.clone();
        let period = self.interval;
        *timer = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut ticks = JoinSet::new();

            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let Some(owner) = weak.upgrade() else {
                    debug!("Batch scheduler dropped, timer exiting");
                    break;
                };

                while ticks.try_join_next().is_some() {}
                ticks.spawn(async move {
                    owner.tick().await;
                });
            }

            // Let ticks already under way finish.
            while ticks.join_next().await.is_some() {}
            info!("Batch timer stopped");
        }));
    }

    /// Run one tick: poll every currently tracked event once.
    ///
    /// Resolves when all polls started by this tick have finished and
    /// returns how many were started.
    pub async fn tick(&self) -> usize {
        let snapshot: Vec<EventId> = self.live_events.iter().map(|id| id.key().clone()).collect();
        if snapshot.is_empty() {
            trace!("Batch tick with no live events");
            return 0;
        }

        let mut polls = JoinSet::new();
        for event_id in snapshot {
            polls.spawn(poll_guarded(Arc::clone(&self.poller), event_id));
        }

        let started = polls.len();
        while let Some(joined) = polls.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Batch poll task failed");
            }
        }

        debug!(polled = started, "Batch tick complete");
        started
    }
}

#[async_trait]
impl EventScheduler for BatchScheduler {
    fn start(&self, event_id: EventId) {
        if self.live_events.insert(event_id.clone()) {
            info!(event_id = %event_id, "Added event to batch polling");
        } else {
            debug!(event_id = %event_id, "Event already in batch polling");
        }
    }

    fn stop(&self, event_id: &EventId) {
        if self.live_events.remove(event_id).is_some() {
            info!(event_id = %event_id, "Removed event from batch polling");
        } else {
            debug!(event_id = %event_id, "Stop ignored, event not tracked");
        }
    }

    fn is_tracking(&self, event_id: &EventId) -> bool {
        self.live_events.contains(event_id)
    }

    fn tracked(&self) -> Vec<EventId> {
        self.live_events.iter().map(|id| id.key().clone()).collect()
    }

    fn mode(&self) -> SchedulingMode {
        SchedulingMode::Batch
    }

    async fn shutdown(&self) {
        self.shutdown.cancel();
        let dropped = self.live_events.len();
        self.live_events.clear();
        debug!(dropped, "Batch registry cleared");

        let timer = self.timer.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = timer {
            if let Err(e) = handle.await {
                error!(error = %e, "Batch timer task failed");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
