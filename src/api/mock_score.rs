//! Mock score source for local runs.
//!
//! Serves `GET /mock-api/score/{eventId}` with a random `h:a` score
//! (each side 0..=3), in the same shape the real source uses.

use axum::{extract::Path, Json};
use rand::Rng;
use tracing::debug;

use crate::types::ScorePayload;

const MAX_GOALS: u8 = 3;

fn random_score() -> String {
    let mut rng = rand::rng();
    let home = rng.random_range(0..=MAX_GOALS);
    let away = rng.random_range(0..=MAX_GOALS);
    format!("{home}:{away}")
}

/// GET /mock-api/score/{eventId}
pub async fn get_mock_score(Path(event_id): Path<String>) -> Json<ScorePayload> {
    let current_score = random_score();
    debug!(event_id = %event_id, score = %current_score, "Generated mock score");
    Json(ScorePayload {
        event_id,
        current_score,
    })
}
