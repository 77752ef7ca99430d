//! Full tracking flows over real HTTP, with an in-memory bus.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::timeout;
use tower::ServiceExt;

use scorewatch::app::App;
use scorewatch::config::AppConfig;
use scorewatch::publish::{BusRecord, InMemoryBus};
use scorewatch::types::{EventId, SchedulingMode};

use crate::mock_source::MockScoreSource;

const TOPIC: &str = "live-score-updates";

fn config(mode: SchedulingMode, base_url: &str) -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.scheduling.mode = mode;
    cfg.scheduling.batch_interval_ms = 50;
    cfg.scheduling.per_event_interval_secs = 1;
    cfg.score_source.base_url = base_url.to_string();
    cfg.score_source.timeout_secs = 2;
    cfg
}

fn build(cfg: &AppConfig) -> (App, Arc<InMemoryBus>) {
    let bus = Arc::new(InMemoryBus::default());
    let app = App::with_bus(cfg, bus.clone()).unwrap();
    (app, bus)
}

async fn set_status(app: &App, event_id: &str, status: &str) -> StatusCode {
    let body = format!(r#"{{"eventId":"{event_id}","status":"{status}"}}"#);
    let resp = app
        .router()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/events/status")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    resp.status()
}

/// Wait for the next record carrying `key`, skipping others.
async fn next_for(feed: &mut broadcast::Receiver<BusRecord>, key: &str) -> BusRecord {
    timeout(Duration::from_secs(5), async {
        loop {
            let record = feed.recv().await.unwrap();
            if record.key == key {
                return record;
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("no record for {key} within 5s"))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_batch_mode_publishes_every_live_event() {
    let (source, base_url) = MockScoreSource::start().await;
    source.set_score("match-1", "1:0");
    source.set_score("match-2", "2:2");

    let (app, bus) = build(&config(SchedulingMode::Batch, &base_url));
    let mut feed = bus.subscribe();

    assert_eq!(set_status(&app, "match-1", "LIVE").await, StatusCode::OK);
    assert_eq!(set_status(&app, "match-2", "LIVE").await, StatusCode::OK);

    let first = next_for(&mut feed, "match-1").await;
    assert_eq!(first.topic, TOPIC);
    assert_eq!(first.value["eventId"], "match-1");
    assert_eq!(first.value["currentScore"], "1:0");

    let second = next_for(&mut feed, "match-2").await;
    assert_eq!(second.value["currentScore"], "2:2");

    app.scheduler.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_per_event_mode_polls_immediately_and_follows_score() {
    let (source, base_url) = MockScoreSource::start().await;
    source.set_score("final", "0:0");

    let (app, bus) = build(&config(SchedulingMode::PerEvent, &base_url));
    let mut feed = bus.subscribe();

    set_status(&app, "final", "LIVE").await;
    let record = next_for(&mut feed, "final").await;
    assert_eq!(record.value["currentScore"], "0:0");

    source.set_score("final", "1:0");
    let record = next_for(&mut feed, "final").await;
    assert_eq!(record.value["currentScore"], "1:0");

    let published = bus.records_for_key(TOPIC, "final");
    let scores: Vec<_> = published.iter().map(|r| r.value["currentScore"].clone()).collect();
    assert_eq!(scores, vec!["0:0", "1:0"]);

    app.scheduler.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_not_live_halts_publication() {
    let (source, base_url) = MockScoreSource::start().await;
    source.set_score("match-1", "3:1");
    source.set_score("match-2", "0:1");

    let (app, bus) = build(&config(SchedulingMode::Batch, &base_url));
    let mut feed = bus.subscribe();

    set_status(&app, "match-1", "LIVE").await;
    set_status(&app, "match-2", "LIVE").await;
    next_for(&mut feed, "match-1").await;

    assert_eq!(set_status(&app, "match-1", "NOT_LIVE").await, StatusCode::OK);
    assert!(!app.scheduler.is_tracking(&EventId::parse("match-1").unwrap()));

    // Let any in-flight poll land, then expect silence for match-1.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let hits_after_stop = source.hits("match-1");
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(source.hits("match-1"), hits_after_stop);

    // match-2 keeps going.
    let before = source.hits("match-2");
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(source.hits("match-2") > before);

    app.scheduler.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failing_event_does_not_affect_others() {
    let (source, base_url) = MockScoreSource::start().await;
    source.fail("broken");
    source.set_score("healthy", "2:1");

    let (app, bus) = build(&config(SchedulingMode::Batch, &base_url));
    let mut feed = bus.subscribe();

    set_status(&app, "broken", "LIVE").await;
    set_status(&app, "healthy", "LIVE").await;

    next_for(&mut feed, "healthy").await;
    next_for(&mut feed, "healthy").await;

    assert!(source.hits("broken") >= 1);
    assert!(bus.records_for_key(TOPIC, "broken").is_empty());
    assert!(app.scheduler.is_tracking(&EventId::parse("broken").unwrap()));

    // Recovery is picked up by the next tick.
    source.set_score("broken", "0:0");
    let record = next_for(&mut feed, "broken").await;
    assert_eq!(record.value["currentScore"], "0:0");

    app.scheduler.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_empty_response_publishes_nothing() {
    let (source, base_url) = MockScoreSource::start().await;

    let (app, bus) = build(&config(SchedulingMode::Batch, &base_url));
    set_status(&app, "pending", "LIVE").await;

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(source.hits("pending") >= 2);
    assert!(bus.records(TOPIC).is_empty());

    app.scheduler.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_bus_outage_does_not_stop_polling() {
    let (source, base_url) = MockScoreSource::start().await;
    source.set_score("match-1", "1:1");

    let (app, bus) = build(&config(SchedulingMode::Batch, &base_url));
    bus.fail_with(Some("broker down"));
    let mut feed = bus.subscribe();

    set_status(&app, "match-1", "LIVE").await;
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(source.hits("match-1") >= 2);
    assert!(bus.records(TOPIC).is_empty());

    bus.fail_with(None);
    let record = next_for(&mut feed, "match-1").await;
    assert_eq!(record.value["currentScore"], "1:1");

    app.scheduler.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_served_control_surface_over_tcp() {
    let (source, base_url) = MockScoreSource::start().await;
    source.set_score("match-9", "4:2");

    let (app, bus) = build(&config(SchedulingMode::PerEvent, &base_url));
    let mut feed = bus.subscribe();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(scorewatch::api::serve(listener, app.router(), async move {
        let _ = stop_rx.await;
    }));

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("http://{addr}/events/status"))
        .header("X-Correlation-ID", "itest-1")
        .json(&serde_json::json!({ "eventId": "match-9", "status": "LIVE" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    assert_eq!(resp.headers()["x-correlation-id"], "itest-1");

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Tracking started successfully");

    let record = next_for(&mut feed, "match-9").await;
    assert_eq!(record.value["currentScore"], "4:2");

    let listed: serde_json::Value = client
        .get(format!("http://{addr}/events"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed["mode"], "per_event");
    assert_eq!(listed["events"], serde_json::json!(["match-9"]));

    let resp = client
        .post(format!("http://{addr}/events/status"))
        .json(&serde_json::json!({ "eventId": "", "status": "LIVE" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);

    stop_tx.send(()).unwrap();
    server.await.unwrap().unwrap();
    app.scheduler.shutdown().await;
    assert!(app.scheduler.tracked().is_empty());
}
