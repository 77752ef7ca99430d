//! Per-poll correlation context.
//!
//! A [`PollContext`] is created for exactly one poll of one event and
//! travels with it as a value. Its span is attached to the poll future,
//! so every log line emitted while the poll runs carries the event id and
//! poll id, and nothing outlives the poll on a reused worker thread.

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, info_span, Instrument, Span};
use uuid::Uuid;

use super::{EventPoller, PollOutcome};
use crate::types::EventId;

/// Correlation data for a single poll invocation.
#[derive(Debug, Clone)]
pub struct PollContext {
    event_id: EventId,
    poll_id: Uuid,
}

impl PollContext {
    pub fn new(event_id: EventId) -> Self {
        Self {
            event_id,
            poll_id: Uuid::new_v4(),
        }
    }

    pub fn event_id(&self) -> &EventId {
        &self.event_id
    }

    pub fn poll_id(&self) -> Uuid {
        self.poll_id
    }

    /// The span scoping this poll's log output.
    pub fn span(&self) -> Span {
        info_span!("poll", event_id = %self.event_id, poll_id = %self.poll_id)
    }
}

/// Run one poll for `event_id` with its context established and every
/// failure contained.
///
/// Errors are already swallowed by the pipeline; this additionally
/// catches panics so a recurring timer never dies with its poll. Returns
/// `None` when the poll panicked.
pub async fn poll_guarded(poller: Arc<dyn EventPoller>, event_id: EventId) -> Option<PollOutcome> {
    let ctx = PollContext::new(event_id);
    let span = ctx.span();

    async move {
        match AssertUnwindSafe(poller.poll_event(ctx)).catch_unwind().await {
            Ok(outcome) => Some(outcome),
            Err(payload) => {
                error!(panic = %panic_message(payload.as_ref()), "Poll panicked; timer continues");
                None
            }
        }
    }
    .instrument(span)
    .await
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
