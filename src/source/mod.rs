//! Score sources.
//!
//! Defines the `ScoreFetcher` trait and the HTTP implementation used to
//! look up an event's current score.

pub mod http;

use async_trait::async_trait;

use crate::engine::PollContext;
use crate::types::{FetchError, ScoreSnapshot};

pub use http::HttpScoreFetcher;

/// Abstraction over external score lookups.
///
/// `Ok(None)` means the source had nothing for this event on this poll;
/// that is "no update", not a failure.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ScoreFetcher: Send + Sync {
    /// Retrieve the current score for `ctx.event_id()`.
    async fn fetch(&self, ctx: &PollContext) -> Result<Option<ScoreSnapshot>, FetchError>;
}
