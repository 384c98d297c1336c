use anyhow::Result;
use std::time::Duration;
use tracing::info;

use audit_export_api::{app, config::Config, jobs, middleware};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = Config::load()?;

    middleware::logging::init_logging(&config.logging);
    middleware::init_metrics()?;

    info!("Starting audit export service v{}", env!("CARGO_PKG_VERSION"));

    let db_config = persistence::db::DatabaseConfig {
        url: config.database.url.clone(),
        max_connections: config.database.max_connections,
        min_connections: config.database.min_connections,
        connect_timeout_secs: config.database.connect_timeout_secs,
        idle_timeout_secs: config.database.idle_timeout_secs,
    };
    let pool = persistence::db::create_pool(&db_config).await?;

    info!("Running database migrations...");
    persistence::db::run_migrations(&pool).await?;
    info!("Migrations completed");

    let addr = config.socket_addr()?;
    let state = app::AppState::new(config, pool.clone())?;

    // Background jobs: the schedule engine tick, artifact expiry cleanup and
    // pool gauges
    let mut scheduler = jobs::JobScheduler::new();
    scheduler.register(jobs::ScheduleTickJob::new(
        state.engine.clone(),
        state.config.export.tick_interval_secs,
    ));
    scheduler.register(jobs::ArtifactCleanupJob::new(
        state.jobs.clone(),
        state.artifacts.clone(),
        state.config.export.cleanup_batch_size,
    ));
    scheduler.register(jobs::PoolMetricsJob::new(pool));
    scheduler.start();

    let router = app::create_app(state);

    info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.shutdown();
    scheduler.wait_for_shutdown(Duration::from_secs(10)).await;

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
