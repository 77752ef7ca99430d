//! Kafka REST Proxy bus.
//!
//! Produces records with the v2 JSON embedded format:
//! `POST {base}/topics/{topic}` with `{"records":[{"key":..,"value":..}]}`.
//! Keyed records keep Kafka's per-key partition ordering.
//!
//! Auth: optional `Authorization: Bearer {token}`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::bus::{BusRecord, Delivery, MessageBus};
use crate::types::PublishError;

const KAFKA_JSON_V2: &str = "application/vnd.kafka.json.v2+json";
const KAFKA_V2: &str = "application/vnd.kafka.v2+json";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ProduceResponse {
    #[serde(default)]
    offsets: Vec<ProduceOffset>,
}

#[derive(Debug, Deserialize)]
struct ProduceOffset {
    #[serde(default)]
    partition: Option<u32>,
    #[serde(default)]
    offset: Option<u64>,
    #[serde(default)]
    error_code: Option<i64>,
    #[serde(default)]
    error: Option<String>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct RestProxyBus {
    http: Client,
    base_url: String,
    token: Option<SecretString>,
}

impl RestProxyBus {
    pub fn new(base_url: impl Into<String>, token: Option<SecretString>) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent("SCOREWATCH/0.1.0")
            .build()
            .context("Failed to build REST proxy HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    fn topic_url(&self, topic: &str) -> String {
        format!("{}/topics/{}", self.base_url, urlencoding::encode(topic))
    }
}

#[async_trait]
impl MessageBus for RestProxyBus {
    async fn send(&self, record: BusRecord) -> Result<Delivery, PublishError> {
        let url = self.topic_url(&record.topic);
        let body = serde_json::json!({
            "records": [{ "key": record.key, "value": record.value }]
        });

        let mut req = self
            .http
            .post(&url)
            .header(CONTENT_TYPE, KAFKA_JSON_V2)
            .header(ACCEPT, KAFKA_V2)
            .json(&body);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token.expose_secret());
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(PublishError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let produced: ProduceResponse = resp.json().await?;
        let first = produced.offsets.into_iter().next();

        if let Some(ProduceOffset { error_code, error, .. }) = &first {
            if error_code.is_some() || error.is_some() {
                return Err(PublishError::Rejected {
                    status: status.as_u16(),
                    message: error
                        .clone()
                        .unwrap_or_else(|| format!("error_code {}", error_code.unwrap_or_default())),
                });
            }
        }

        debug!(topic = %record.topic, key = %record.key, "REST proxy accepted record");
        Ok(Delivery {
            topic: record.topic,
            partition: first.as_ref().and_then(|o| o.partition),
            offset: first.as_ref().and_then(|o| o.offset),
        })
    }

    fn name(&self) -> &str {
        "rest_proxy"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
