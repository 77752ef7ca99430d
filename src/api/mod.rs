//! Control surface: Axum web server toggling event tracking.
//!
//! `POST /events/status` turns `{eventId, status}` into scheduler
//! start/stop calls. The same server hosts the mock score source so a
//! default setup can poll itself.

pub mod mock_score;
pub mod routes;

use anyhow::{Context, Result};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::future::Future;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use routes::AppState;

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/events/status", post(routes::update_status))
        .route("/events", get(routes::list_events))
        .route("/health", get(routes::health))
        .route("/mock-api/score/:event_id", get(mock_score::get_mock_score))
        .layer(middleware::from_fn(routes::correlation_id))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve `router` on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, router: Router, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr().context("Listener has no local address")?;
    info!(addr = %addr, "Control surface listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .context("Control surface server error")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
