//! HTTP score source.
//!
//! Looks up `GET {base_url}{event_id}` and expects a flat
//! `{"eventId": "...", "currentScore": "h:a"}` object. An empty body,
//! `null`, `{}` or `204 No Content` all mean "no update this poll".
//!
//! Timeouts belong to the transport: the `reqwest::Client` is built with
//! the configured timeout and the scheduler adds none of its own.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::ScoreFetcher;
use crate::engine::PollContext;
use crate::types::{EventId, FetchError, ScoreSnapshot};

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScoreResponse {
    #[serde(default)]
    event_id: Option<String>,
    #[serde(default)]
    current_score: Option<String>,
}

// ---------------------------------------------------------------------------
// Fetcher
// ---------------------------------------------------------------------------

pub struct HttpScoreFetcher {
    http: Client,
    base_url: String,
}

impl HttpScoreFetcher {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent("SCOREWATCH/0.1.0")
            .build()
            .context("Failed to build score source HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    /// Full lookup URL; the id is percent-encoded as one path segment.
    fn score_url(&self, event_id: &EventId) -> String {
        format!("{}{}", self.base_url, urlencoding::encode(event_id.as_str()))
    }
}

/// Interpret a successful response body.
fn parse_score_body(requested: &EventId, body: &[u8]) -> Result<Option<ScoreSnapshot>, FetchError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| FetchError::Malformed(format!("invalid JSON: {e}")))?;

    match &value {
        serde_json::Value::Null => return Ok(None),
        serde_json::Value::Object(map) if map.is_empty() => return Ok(None),
        serde_json::Value::Object(_) => {}
        other => {
            return Err(FetchError::Malformed(format!("expected an object, got {other}")));
        }
    }

    let parsed: ScoreResponse = serde_json::from_value(value)
        .map_err(|e| FetchError::Malformed(format!("unexpected field types: {e}")))?;

    if let Some(returned) = parsed.event_id.as_deref() {
        if returned != requested.as_str() {
            return Err(FetchError::Malformed(format!(
                "asked for {requested}, source answered for {returned}"
            )));
        }
    }

    let score = parsed
        .current_score
        .ok_or_else(|| FetchError::Malformed("missing currentScore".into()))?;

    Ok(Some(ScoreSnapshot::new(requested.clone(), score)))
}

#[async_trait]
impl ScoreFetcher for HttpScoreFetcher {
    async fn fetch(&self, ctx: &PollContext) -> Result<Option<ScoreSnapshot>, FetchError> {
        let url = self.score_url(ctx.event_id());
        debug!(url = %url, "Fetching score");

        let resp = self.http.get(&url).send().await?;
        let status = resp.status();

        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url,
            });
        }
        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        let body = resp.bytes().await?;
        parse_score_body(ctx.event_id(), &body)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
