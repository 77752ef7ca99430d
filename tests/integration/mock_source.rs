//! Mock score source for integration testing.
//!
//! Serves `GET /score/{eventId}` from an in-memory table on a random
//! local port. Scores, failures and empty responses are fully
//! controllable from test code, and every request is counted.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

#[derive(Default)]
struct SourceState {
    scores: HashMap<String, String>,
    failing: HashSet<String>,
    hits: HashMap<String, usize>,
}

/// A scripted score source. Unknown ids get an empty 200 response.
#[derive(Clone, Default)]
pub struct MockScoreSource {
    state: Arc<Mutex<SourceState>>,
}

impl MockScoreSource {
    /// Start serving on `127.0.0.1:0` and return the source with its
    /// base URL, ready to have event ids appended.
    pub async fn start() -> (Self, String) {
        let source = Self::default();
        let app = Router::new()
            .route("/score/:event_id", get(score))
            .with_state(source.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (source, format!("http://{addr}/score/"))
    }

    pub fn set_score(&self, event_id: &str, score: &str) {
        let mut state = self.state.lock().unwrap();
        state.failing.remove(event_id);
        state.scores.insert(event_id.to_string(), score.to_string());
    }

    /// Answer every request for `event_id` with a 500.
    pub fn fail(&self, event_id: &str) {
        self.state.lock().unwrap().failing.insert(event_id.to_string());
    }

    /// Requests received for `event_id` so far.
    pub fn hits(&self, event_id: &str) -> usize {
        self.state.lock().unwrap().hits.get(event_id).copied().unwrap_or(0)
    }
}

async fn score(State(source): State<MockScoreSource>, Path(event_id): Path<String>) -> Response {
    let mut state = source.state.lock().unwrap();
    *state.hits.entry(event_id.clone()).or_insert(0) += 1;

    if state.failing.contains(&event_id) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "source exploded").into_response();
    }
    match state.scores.get(&event_id) {
        Some(score) => Json(json!({ "eventId": event_id, "currentScore": score })).into_response(),
        None => StatusCode::OK.into_response(),
    }
}
