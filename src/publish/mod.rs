//! Score publishing.
//!
//! Defines the `ScorePublisher` trait and `ScoreUpdatePublisher`, which
//! hands snapshots to a `MessageBus` without making the caller wait:
//! - `bus::InMemoryBus`: in-process partitioned log (default, tests)
//! - `rest_proxy::RestProxyBus`: Kafka REST Proxy over HTTP

pub mod bus;
pub mod rest_proxy;

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, Instrument};

use crate::types::ScoreSnapshot;

pub use bus::{BusRecord, Delivery, InMemoryBus, MessageBus};
pub use rest_proxy::RestProxyBus;

/// Abstraction over score publication.
///
/// `publish` returns immediately; delivery success or failure is only
/// ever observed in the logs.
#[cfg_attr(test, mockall::automock)]
pub trait ScorePublisher: Send + Sync {
    fn publish(&self, snapshot: ScoreSnapshot);
}

/// Publishes score snapshots to one topic, keyed by event id.
pub struct ScoreUpdatePublisher {
    bus: Arc<dyn MessageBus>,
    topic: String,
}

impl ScoreUpdatePublisher {
    pub fn new(bus: Arc<dyn MessageBus>, topic: impl Into<String>) -> Self {
        Self {
            bus,
            topic: topic.into(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl ScorePublisher for ScoreUpdatePublisher {
    /// Must be called from within a tokio runtime.
    fn publish(&self, snapshot: ScoreSnapshot) {
        let event_id = snapshot.event_id().clone();
        let fetched_at = snapshot.fetched_at();
        let record = match BusRecord::score_update(&self.topic, &snapshot) {
            Ok(record) => record,
            Err(e) => {
                error!(event_id = %event_id, error = %e, "Failed to encode score update");
                return;
            }
        };

        let bus = Arc::clone(&self.bus);
        tokio::spawn(
            async move {
                match bus.send(record).await {
                    Ok(delivery) => debug!(
                        event_id = %event_id,
                        bus = bus.name(),
                        topic = %delivery.topic,
                        partition = ?delivery.partition,
                        offset = ?delivery.offset,
                        fetched_at = %fetched_at,
                        lag_ms = (Utc::now() - fetched_at).num_milliseconds(),
                        "Message persisted by broker"
                    ),
                    Err(e) => error!(
                        event_id = %event_id,
                        bus = bus.name(),
                        error = %e,
                        "Failed to publish score update"
                    ),
                }
            }
            .in_current_span(),
        );
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
