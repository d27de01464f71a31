//! `api` crate — HTTP REST + WebSocket layer.
//!
//! Thin request/response mapping only; validation lives in `engine`,
//! persistence in `db`. Exposes:
//!   POST   /api/v1/pipelines
//!   GET    /api/v1/pipelines
//!   POST   /api/v1/pipelines/validate
//!   GET    /api/v1/pipelines/{id}
//!   PUT    /api/v1/pipelines/{id}
//!   DELETE /api/v1/pipelines/{id}
//!   POST   /api/v1/pipelines/{id}/run
//!   POST   /api/v1/pipelines/{id}/stop
//!   GET    /api/v1/pipelines/{id}/executions
//!   GET    /api/v1/executions/{id}
//!   GET    /api/v1/dashboard
//!   POST   /api/v1/analyze-url
//!   GET    /ws/pipelines/{id}

pub mod error;
pub mod handlers;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use db::DbPool;
use dom::DocumentFetcher;
use engine::Coordinator;
use notify::ChannelRegistry;

pub use error::{ApiError, ApiResult};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub coordinator: Arc<Coordinator>,
    pub notifier: Arc<ChannelRegistry>,
    pub fetcher: Arc<dyn DocumentFetcher>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/v1/pipelines",
            get(handlers::pipelines::list).post(handlers::pipelines::create),
        )
        .route("/api/v1/pipelines/validate", post(handlers::pipelines::validate))
        .route(
            "/api/v1/pipelines/:id",
            get(handlers::pipelines::get_one)
                .put(handlers::pipelines::update)
                .delete(handlers::pipelines::delete),
        )
        .route("/api/v1/pipelines/:id/run", post(handlers::executions::run))
        .route("/api/v1/pipelines/:id/stop", post(handlers::executions::stop))
        .route(
            "/api/v1/pipelines/:id/executions",
            get(handlers::executions::list_for_pipeline),
        )
        .route("/api/v1/executions/:id", get(handlers::executions::get_one))
        .route("/api/v1/dashboard", get(handlers::executions::dashboard))
        .route("/api/v1/analyze-url", post(handlers::analyze::analyze))
        .route("/ws/pipelines/:id", get(handlers::ws::subscribe))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until the process is shut down.
pub async fn serve(bind: &str, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("API server listening on {bind}");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
