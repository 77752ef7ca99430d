//! Component wiring.
//!
//! Turns an `AppConfig` into the running object graph:
//! fetcher → pipeline → scheduler, with the publisher writing to the
//! configured bus. Both the binary and the integration tests build the
//! application through here.

use anyhow::{Context, Result};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::api;
use crate::config::{AppConfig, BusKind};
use crate::engine::{EventPoller, PollingPipeline};
use crate::publish::{InMemoryBus, MessageBus, RestProxyBus, ScoreUpdatePublisher};
use crate::scheduler::{self, EventScheduler};
use crate::source::HttpScoreFetcher;

/// The assembled tracker.
pub struct App {
    pub scheduler: Arc<dyn EventScheduler>,
    pub bus: Arc<dyn MessageBus>,
}

impl App {
    /// Build every component from configuration, including the bus.
    ///
    /// Must be called from within a tokio runtime.
    pub fn build(cfg: &AppConfig) -> Result<Self> {
        let bus = build_bus(cfg)?;
        Self::with_bus(cfg, bus)
    }

    /// Build with an externally supplied bus.
    pub fn with_bus(cfg: &AppConfig, bus: Arc<dyn MessageBus>) -> Result<Self> {
        let fetcher = HttpScoreFetcher::new(
            cfg.score_source.base_url.clone(),
            Duration::from_secs(cfg.score_source.timeout_secs),
        )?;
        info!(base_url = %cfg.score_source.base_url, "Score source configured");

        let publisher = ScoreUpdatePublisher::new(Arc::clone(&bus), cfg.publisher.topic.clone());
        info!(topic = %publisher.topic(), bus = bus.name(), "Score publisher configured");

        let pipeline: Arc<dyn EventPoller> =
            Arc::new(PollingPipeline::new(Arc::new(fetcher), Arc::new(publisher)));
        let scheduler = scheduler::build(&cfg.scheduling, pipeline);

        Ok(Self { scheduler, bus })
    }

    /// The control surface router over this app's scheduler.
    pub fn router(&self) -> Router {
        api::build_router(Arc::clone(&self.scheduler))
    }
}

fn build_bus(cfg: &AppConfig) -> Result<Arc<dyn MessageBus>> {
    match cfg.publisher.bus {
        BusKind::Memory => Ok(Arc::new(InMemoryBus::default())),
        BusKind::RestProxy => {
            let url = cfg
                .publisher
                .rest_proxy_url
                .clone()
                .context("publisher.rest_proxy_url is not set")?;
            Ok(Arc::new(RestProxyBus::new(url, cfg.publisher.auth_token())?))
        }
    }
}
