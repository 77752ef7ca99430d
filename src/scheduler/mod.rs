//! Event scheduling.
//!
//! Defines the `EventScheduler` trait and its two strategies:
//! - `batch::BatchScheduler`: one shared fixed-rate tick over all events
//! - `per_event::PerEventScheduler`: one cancellable timer per event
//!
//! The strategy is picked once at startup by [`build`]; everything after
//! that holds an `Arc<dyn EventScheduler>`.

pub mod batch;
pub mod per_event;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::config::SchedulingConfig;
use crate::engine::EventPoller;
use crate::types::{EventId, SchedulingMode};

pub use batch::BatchScheduler;
pub use per_event::PerEventScheduler;

/// Starts and stops periodic polling of events.
///
/// `start` and `stop` are idempotent, non-blocking, and safe to call
/// concurrently for the same or different ids.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventScheduler: Send + Sync {
    /// Begin polling `event_id`. Exactly one cadence per id results no
    /// matter how often or how concurrently this is called.
    fn start(&self, event_id: EventId);

    /// Stop polling `event_id`. No-op if it is not tracked. An in-flight
    /// poll is allowed to finish.
    fn stop(&self, event_id: &EventId);

    fn is_tracking(&self, event_id: &EventId) -> bool;

    /// Currently tracked ids, in no particular order.
    fn tracked(&self) -> Vec<EventId>;

    fn mode(&self) -> SchedulingMode;

    /// Cancel every future firing, forget every tracked id, and wait for
    /// in-flight polls.
    async fn shutdown(&self);
}

/// Build the scheduler for the configured mode.
///
/// Must be called from within a tokio runtime: the batch strategy starts
/// its shared timer here.
pub fn build(cfg: &SchedulingConfig, poller: Arc<dyn EventPoller>) -> Arc<dyn EventScheduler> {
    match cfg.mode {
        SchedulingMode::Batch => {
            info!(interval_ms = cfg.batch_interval_ms, "Using batch scheduler");
            let scheduler = Arc::new(BatchScheduler::new(poller, cfg.batch_interval()));
            scheduler.spawn();
            scheduler as Arc<dyn EventScheduler>
        }
        SchedulingMode::PerEvent => {
            info!(interval_secs = cfg.per_event_interval_secs, "Using per-event scheduler");
            Arc::new(PerEventScheduler::new(poller, cfg.per_event_interval()))
        }
    }
}

// ---------------------------------------------------------------------------
// Test support
// ---------------------------------------------------------------------------
