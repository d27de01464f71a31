//! Run/stop and execution-history handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};
use uuid::Uuid;

use db::models::{DashboardCounts, ExecutionRow};
use db::repository::{executions as exec_repo, pipelines as pipeline_repo};

use crate::error::ApiResult;
use crate::AppState;

pub async fn run(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let execution_id = state.coordinator.start(id).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "success": true,
            "execution_id": execution_id,
            "message": "Pipeline started"
        })),
    ))
}

pub async fn stop(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> ApiResult<Json<Value>> {
    state.coordinator.stop(id).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Pipeline stopped"
    })))
}

pub async fn list_for_pipeline(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<ExecutionRow>>> {
    // 404 for an unknown pipeline rather than an empty history.
    pipeline_repo::get_pipeline(&state.pool, id).await?;
    let executions = exec_repo::list_executions(&state.pool, id).await?;
    Ok(Json(executions))
}

pub async fn get_one(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> ApiResult<Json<ExecutionRow>> {
    let execution = exec_repo::get_execution(&state.pool, id).await?;
    Ok(Json(execution))
}

pub async fn dashboard(State(state): State<AppState>) -> ApiResult<Json<DashboardCounts>> {
    let counts = exec_repo::overview(&state.pool).await?;
    Ok(Json(counts))
}
