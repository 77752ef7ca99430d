//! Core engine: the poll → publish path driven by the schedulers.

pub mod context;
pub mod pipeline;

use async_trait::async_trait;

pub use context::{poll_guarded, PollContext};
pub use pipeline::PollingPipeline;

/// What a single poll contributed downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// A snapshot was handed to the publisher.
    Published,
    /// The source had no update for this event.
    Empty,
    /// Fetch failed; nothing was published.
    Failed,
}

/// The unit of work a scheduler invokes on every fire.
///
/// Implementations must contain their own failures; the returned outcome
/// is informational and schedulers never act on it.
#[async_trait]
pub trait EventPoller: Send + Sync {
    async fn poll_event(&self, ctx: PollContext) -> PollOutcome;
}
