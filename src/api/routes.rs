//! Control surface route handlers.
//!
//! All endpoints return JSON. The scheduler is shared as `Arc<dyn EventScheduler>`.

use axum::{
    extract::{rejection::JsonRejection, Request, State},
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::scheduler::EventScheduler;
use crate::types::{EventId, EventStatus, SchedulingMode};

pub type AppState = Arc<dyn EventScheduler>;

/// Header carrying the caller's correlation id.
pub const CORRELATION_HEADER: &str = "x-correlation-id";

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Body of `POST /events/status`. Fields are optional so that missing
/// values are reported as a validation failure, not a parse failure.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventStatusUpdate {
    #[serde(default)]
    pub event_id: Option<String>,
    #[serde(default)]
    pub status: Option<EventStatus>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventResponse {
    pub event_id: Option<String>,
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl EventResponse {
    pub fn success(event_id: &EventId, status: EventStatus, message: &str) -> Self {
        Self {
            event_id: Some(event_id.to_string()),
            status: status.to_string(),
            message: message.to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn error(event_id: Option<String>, message: &str) -> Self {
        Self {
            event_id,
            status: "ERROR".to_string(),
            message: message.to_string(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedEventsResponse {
    pub mode: SchedulingMode,
    pub count: usize,
    pub events: Vec<String>,
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// POST /events/status
pub async fn update_status(
    State(scheduler): State<AppState>,
    payload: Result<Json<EventStatusUpdate>, JsonRejection>,
) -> (StatusCode, Json<EventResponse>) {
    let update = match payload {
        Ok(Json(update)) => update,
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "Rejected malformed status update");
            return (
                StatusCode::BAD_REQUEST,
                Json(EventResponse::error(None, "Malformed request body")),
            );
        }
    };

    let event_id = update.event_id.as_deref().map(EventId::parse);
    let (event_id, status) = match (event_id, update.status) {
        (Some(Ok(event_id)), Some(status)) => (event_id, status),
        _ => {
            warn!(update = ?update, "Received invalid status update");
            return (
                StatusCode::BAD_REQUEST,
                Json(EventResponse::error(update.event_id, "Invalid eventId or status")),
            );
        }
    };

    info!(event_id = %event_id, status = %status, "Received status update");

    let message = match status {
        EventStatus::Live => {
            scheduler.start(event_id.clone());
            "Tracking started successfully"
        }
        EventStatus::NotLive => {
            scheduler.stop(&event_id);
            "Tracking stopped successfully"
        }
    };

    (StatusCode::OK, Json(EventResponse::success(&event_id, status, message)))
}

/// GET /events
pub async fn list_events(State(scheduler): State<AppState>) -> Json<TrackedEventsResponse> {
    let mut events: Vec<String> = scheduler.tracked().into_iter().map(|id| id.to_string()).collect();
    events.sort();
    Json(TrackedEventsResponse {
        mode: scheduler.mode(),
        count: events.len(),
        events,
    })
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

// ---------------------------------------------------------------------------
// Middleware
// ---------------------------------------------------------------------------

/// Scope each request to a `request{correlation_id}` span and echo the id.
///
/// The id comes from `X-Correlation-ID` when present, otherwise a fresh
/// UUID is generated.
pub async fn correlation_id(request: Request, next: Next) -> Response {
    let correlation_id = request
        .headers()
        .get(CORRELATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let span = info_span!(
        "request",
        correlation_id = %correlation_id,
        method = %request.method(),
        path = %request.uri().path(),
    );

    let mut response = next.run(request).instrument(span).await;
    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        response.headers_mut().insert(CORRELATION_HEADER, value);
    }
    response
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
