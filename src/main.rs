//! SCOREWATCH: live event score tracker
//!
//! Entry point. Loads configuration, initialises structured logging,
//! wires the fetcher, publisher and scheduler, and serves the control
//! surface until Ctrl+C.

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{error, info};

use scorewatch::api;
use scorewatch::app::App;
use scorewatch::config;

const BANNER: &str = r#"
 ___  ___ ___  ___ _____      ___ _____ ___ _  _
/ __|/ __/ _ \| _ \ __\ \    / /_\_   _/ __| || |
\__ \ (_| (_) |   / _| \ \/\/ / _ \| || (__| __ |
|___/\___\___/|_|_\___| \_/\_/_/ \_\_| \___|_||_|

  Live event score tracker
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cfg = config::AppConfig::load_default()?;

    init_logging();

    println!("{BANNER}");
    info!(
        mode = %cfg.scheduling.mode,
        batch_interval_ms = cfg.scheduling.batch_interval_ms,
        per_event_interval_secs = cfg.scheduling.per_event_interval_secs,
        topic = %cfg.publisher.topic,
        "SCOREWATCH starting up"
    );

    // -- Initialise components -------------------------------------------

    let app = App::build(&cfg)?;

    let addr = format!("{}:{}", cfg.server.bind, cfg.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!("Serving. Press Ctrl+C to stop.");

    // -- Serve until Ctrl+C ----------------------------------------------

    let served = api::serve(listener, app.router(), shutdown_signal()).await;
    if let Err(e) = &served {
        error!(error = %e, "Control surface stopped with an error");
    }

    let still_tracked = app.scheduler.tracked().len();
    app.scheduler.shutdown().await;
    info!(still_tracked, "SCOREWATCH shut down cleanly.");

    served
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received."),
        Err(e) => error!(error = %e, "Failed to listen for Ctrl+C"),
    }
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("scorewatch=info,tower_http=info"));

    let json_logging = std::env::var("SCOREWATCH_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
