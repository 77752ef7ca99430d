//! Polling pipeline: fetch one event's score and hand it to the publisher.
//!
//! Every failure is logged and contained here. A poll that fails simply
//! contributes nothing downstream; the next tick is the retry.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::{EventPoller, PollContext, PollOutcome};
use crate::publish::ScorePublisher;
use crate::source::ScoreFetcher;

/// Composes a [`ScoreFetcher`] and a [`ScorePublisher`] into a single
/// "poll one event" operation.
pub struct PollingPipeline {
    fetcher: Arc<dyn ScoreFetcher>,
    publisher: Arc<dyn ScorePublisher>,
}

impl PollingPipeline {
    pub fn new(fetcher: Arc<dyn ScoreFetcher>, publisher: Arc<dyn ScorePublisher>) -> Self {
        Self { fetcher, publisher }
    }

    /// Poll a single event once.
    ///
    /// Publishing is fire-and-forget: the outcome reports whether a
    /// snapshot was handed off, not whether the bus accepted it.
    pub async fn poll_one(&self, ctx: &PollContext) -> PollOutcome {
        debug!(event_id = %ctx.event_id(), "Starting poll");

        match self.fetcher.fetch(ctx).await {
            Ok(Some(snapshot)) => {
                let score = snapshot.current_score().to_string();
                self.publisher.publish(snapshot);
                info!(event_id = %ctx.event_id(), score = %score, "Polled and published score");
                PollOutcome::Published
            }
            Ok(None) => {
                warn!(event_id = %ctx.event_id(), "Received empty score response");
                PollOutcome::Empty
            }
            Err(e) => {
                error!(event_id = %ctx.event_id(), error = %e, "Error polling score");
                PollOutcome::Failed
            }
        }
    }
}

#[async_trait]
impl EventPoller for PollingPipeline {
    async fn poll_event(&self, ctx: PollContext) -> PollOutcome {
        self.poll_one(&ctx).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
