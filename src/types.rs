//! Shared types for the SCOREWATCH tracker.
//!
//! These types form the data model used across all modules.
//! The scheduler, pipeline, fetcher, and publisher depend on them
//! without depending on each other.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Event identity
// ---------------------------------------------------------------------------

/// Opaque, non-empty identifier of a tracked event (e.g. a match).
///
/// Blank ids are rejected by [`EventId::parse`] at the control surface;
/// everything past that boundary can assume the id is usable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    /// Validate and wrap a raw identifier.
    pub fn parse(raw: impl Into<String>) -> Result<Self, TrackerError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(TrackerError::InvalidEventId(raw));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for EventId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Requested tracking state for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    Live,
    NotLive,
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventStatus::Live => write!(f, "LIVE"),
            EventStatus::NotLive => write!(f, "NOT_LIVE"),
        }
    }
}

// ---------------------------------------------------------------------------
// Scheduling mode
// ---------------------------------------------------------------------------

/// Which scheduling strategy drives the polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SchedulingMode {
    /// One shared timer polls every tracked event on each tick.
    Batch,
    /// Each tracked event owns its own cancellable timer.
    #[default]
    PerEvent,
}

impl fmt::Display for SchedulingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulingMode::Batch => write!(f, "batch"),
            SchedulingMode::PerEvent => write!(f, "per_event"),
        }
    }
}

/// Parses the `SCOREWATCH_MODE` override. Accepts the legacy
/// `global`/`dynamic` names as well.
impl std::str::FromStr for SchedulingMode {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "batch" | "global" => Ok(SchedulingMode::Batch),
            "per_event" | "per-event" | "dynamic" => Ok(SchedulingMode::PerEvent),
            _ => Err(TrackerError::Config(format!("Unknown scheduling mode: {s}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Score snapshot
// ---------------------------------------------------------------------------

/// Score data retrieved for one event at one point in time.
///
/// Built by the fetcher and moved into the publisher; never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreSnapshot {
    event_id: EventId,
    current_score: String,
    fetched_at: DateTime<Utc>,
}

impl ScoreSnapshot {
    pub fn new(event_id: EventId, current_score: impl Into<String>) -> Self {
        Self {
            event_id,
            current_score: current_score.into(),
            fetched_at: Utc::now(),
        }
    }

    pub fn event_id(&self) -> &EventId {
        &self.event_id
    }

    /// Opaque score representation, e.g. `"2:1"`.
    pub fn current_score(&self) -> &str {
        &self.current_score
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    /// The record value published downstream.
    pub fn to_payload(&self) -> ScorePayload {
        ScorePayload {
            event_id: self.event_id.as_str().to_string(),
            current_score: self.current_score.clone(),
        }
    }
}

impl fmt::Display for ScoreSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} => {}", self.event_id, self.current_score)
    }
}

/// Wire form of a score: a flat `{eventId, currentScore}` object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScorePayload {
    pub event_id: String,
    pub current_score: String,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Failure to obtain a score from the external source.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Score source request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Score source returned HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Malformed score response: {0}")]
    Malformed(String),
}

/// Failure to hand a record to the downstream bus.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Failed to encode score update: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Bus transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Bus rejected record ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Bus unavailable: {0}")]
    Unavailable(String),
}

/// Domain-specific error types for configuration and input validation.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("Invalid event id: {0:?}")]
    InvalidEventId(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
