// Map Engagement Analytics - Demo Service
//
// Runs one analytics engine against Postgres (or the in-memory store) and
// Redis (or no sink), drives it with simulated map visits, and serves the
// engagement report and Prometheus metrics over HTTP.

use anyhow::Result;
use clap::Parser;
use std::{sync::Arc, time::Duration};
use tokio::time::sleep;
use tracing::{error, info, warn};

use map_engagement_analytics::{
    config::Config,
    database::{EventStore, MemoryEventStore, PostgresEventStore},
    engine::{AnalyticsEngine, EngineDeps},
    generators::VisitGenerator,
    http::{router, AppState},
    metrics::AppMetrics,
    models::PageContext,
    sink::{AnalyticsSink, NoopSink, RedisSink},
    workers::{InteractionSimulatorWorker, ReportRefreshWorker},
    SystemClock,
};

/// Share of simulated interactions that are deliberately malformed
const SIMULATED_MALFORMED_RATE: f64 = 0.02;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "map_engagement_analytics=info,sqlx=warn".into()),
        )
        .init();

    let config = Config::parse();
    let engine_config = config.engine_config();
    info!("Starting map engagement analytics");
    info!("Configuration:");
    info!("  - Flush interval: {:?}", engine_config.flush_interval);
    info!("  - Retained events: {}", engine_config.max_retained_events);
    info!("  - Report window: {} days", engine_config.default_window_days);
    info!("  - Simulated visits/sec: {}", config.simulated_visits_per_second);

    let store: Arc<dyn EventStore> = match &config.database_url {
        Some(url) => {
            let store = PostgresEventStore::new(url, config.db_pool_size).await?;
            store.setup_schema().await?;
            info!("  - Store: postgres");
            Arc::new(store)
        }
        None => {
            info!("  - Store: in-memory");
            Arc::new(MemoryEventStore::new(engine_config.max_retained_events))
        }
    };

    let sink: Arc<dyn AnalyticsSink> = match &config.redis_url {
        Some(url) => {
            let prefix = config.redis_key_prefix.clone();
            match RedisSink::new(url, prefix, config.sink_recent_events).await {
                Ok(sink) => Arc::new(sink),
                Err(e) => {
                    warn!("Redis sink unavailable, continuing without it: {:#}", e);
                    Arc::new(NoopSink)
                }
            }
        }
        None => Arc::new(NoopSink),
    };

    let deps = EngineDeps {
        store,
        sink,
        clock: Arc::new(SystemClock),
        metrics: Arc::new(AppMetrics::new()?),
    };
    let page = PageContext::new(format!("map-engagement-analytics/{}", env!("CARGO_PKG_VERSION")));
    let engine = Arc::new(AnalyticsEngine::start(engine_config, page, deps));

    if config.simulated_visits_per_second > 0 {
        tokio::spawn(start_simulator(engine.clone(), config.simulated_visits_per_second));
    }
    tokio::spawn(start_report_refresh(engine.clone(), config.report_refresh_secs));

    let app = router(AppState { engine: engine.clone() });
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;

    info!("===========================================");
    info!("Map Engagement Analytics Ready");
    info!("===========================================");
    info!("Report endpoint: http://{}/report", config.bind_address);
    info!("Popular endpoint: http://{}/popular", config.bind_address);
    info!("Metrics endpoint: http://{}/metrics", config.bind_address);
    info!("Health endpoint: http://{}/health", config.bind_address);
    info!("===========================================");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    engine.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown requested");
}

async fn start_simulator(engine: Arc<AnalyticsEngine>, visits_per_second: u32) {
    let generator = Arc::new(VisitGenerator::new(SIMULATED_MALFORMED_RATE));
    let worker = InteractionSimulatorWorker::new(engine, generator);

    loop {
        worker.run_batch(visits_per_second);
        sleep(Duration::from_secs(1)).await;
    }
}

async fn start_report_refresh(engine: Arc<AnalyticsEngine>, refresh_secs: u64) {
    let worker = ReportRefreshWorker::new(engine);

    loop {
        sleep(Duration::from_secs(refresh_secs.max(1))).await;
        worker.refresh(None).await;
    }
}
