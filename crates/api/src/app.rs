use axum::{middleware, routing::get, Router};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use domain::services::artifact_store::ArtifactStore;
use domain::services::storage::{ExportJobStore, ExportScheduleStore};
use persistence::repositories::{
    AuditEventRepository, ExportJobRepository, ExportScheduleRepository,
};

use crate::config::Config;
use crate::middleware::{metrics_handler, metrics_middleware, trace_id};
use crate::routes::{export_jobs, export_schedules, health};
use crate::services::{build_notifier, ExportJobRunner, FsArtifactStore, ScheduleEngine};

/// Shared application state: configuration, the database pool, the
/// storage/collaborator handles, and the runner and engine built on them.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub jobs: Arc<dyn ExportJobStore>,
    pub schedules: Arc<dyn ExportScheduleStore>,
    pub artifacts: Arc<dyn ArtifactStore>,
    pub runner: Arc<ExportJobRunner>,
    pub engine: Arc<ScheduleEngine>,
}

impl AppState {
    /// Wire the production implementations together.
    pub fn new(config: Config, pool: PgPool) -> anyhow::Result<Self> {
        let config = Arc::new(config);

        let jobs: Arc<dyn ExportJobStore> = Arc::new(ExportJobRepository::new(pool.clone()));
        let schedules: Arc<dyn ExportScheduleStore> =
            Arc::new(ExportScheduleRepository::new(pool.clone()));
        let artifacts: Arc<dyn ArtifactStore> =
            Arc::new(FsArtifactStore::new(&config.export.artifacts_dir)?);
        let event_log = Arc::new(AuditEventRepository::new(pool.clone()));
        let notifier = build_notifier(&config.notifications);

        let runner = Arc::new(ExportJobRunner::new(
            jobs.clone(),
            schedules.clone(),
            event_log,
            artifacts.clone(),
            notifier,
            config.export.worker_concurrency,
            config.export.event_batch_size,
        ));
        let engine = Arc::new(ScheduleEngine::new(
            schedules.clone(),
            jobs.clone(),
            runner.clone(),
        ));

        Ok(Self {
            pool,
            config,
            jobs,
            schedules,
            artifacts,
            runner,
            engine,
        })
    }
}

/// Build the HTTP router.
pub fn create_app(state: AppState) -> Router {
    // CORS: open in development, restricted when origins are configured
    let cors = if state.config.security.cors_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        use tower_http::cors::AllowOrigin;
        let origins: Vec<_> = state
            .config
            .security
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/ready", get(health::ready))
        .route("/api/health/live", get(health::live))
        .route("/metrics", get(metrics_handler));

    let request_timeout = Duration::from_secs(state.config.server.request_timeout_secs);

    Router::new()
        .merge(public_routes)
        .nest(
            "/api/v1/organizations/:org_id/export-jobs",
            export_jobs::router(),
        )
        .nest(
            "/api/v1/organizations/:org_id/export-schedules",
            export_schedules::router(),
        )
        // Global middleware (order matters: bottom layers run first)
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors)
        .with_state(state)
}
