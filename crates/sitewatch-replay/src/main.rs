//! Safety monitoring replay binary.

use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sitewatch_replay::{ReplayConfig, ReplayDriver};

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    if let Err(e) = init_tracing() {
        eprintln!("Failed to initialize tracing: {:#}", e);
        std::process::exit(1);
    }

    info!("Starting sitewatch-replay");

    if let Err(e) = run().await {
        error!("Replay failed: {:#}", e);
        std::process::exit(1);
    }

    info!("Replay shutdown complete");
}

async fn run() -> anyhow::Result<()> {
    let config = ReplayConfig::from_env();
    info!("Replay config: {:?}", config);

    if let Some(addr) = config.metrics_addr {
        sitewatch_replay::metrics::init_prometheus(addr)
            .context("failed to start metrics exporter")?;
        info!(%addr, "Prometheus metrics listener started");
    }

    let engine_config = config
        .load_engine_config()
        .context("failed to load engine config")?;
    let driver = ReplayDriver::new(config, engine_config).context("failed to open sequence")?;

    let report = driver.run().await.context("replay aborted")?;
    info!(
        session_id = %report.session_id,
        duration_secs = report.duration_secs(),
        total_alerts = report.total_alerts,
        abnormal_events = report.total_abnormal_events,
        "Session complete"
    );
    Ok(())
}

/// Colored output for dev, JSON for production.
fn init_tracing() -> anyhow::Result<()> {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("sitewatch_engine=info".parse()?)
        .add_directive("sitewatch_replay=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
    Ok(())
}
