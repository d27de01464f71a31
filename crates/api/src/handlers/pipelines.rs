//! Pipeline CRUD + validate handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};
use uuid::Uuid;

use db::models::PipelineRow;
use db::repository::pipelines as pipeline_repo;
use engine::{validate_pipeline, Block, VALID_MESSAGE};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Create/update/validate payload: the definition as the builder sends it.
#[derive(serde::Deserialize)]
pub struct PipelineDto {
    pub name: String,
    pub start_urls: Vec<String>,
    pub blocks: Vec<Block>,
    #[serde(default)]
    pub settings: Option<serde_json::Map<String, Value>>,
}

impl PipelineDto {
    fn validate(&self) -> ApiResult<()> {
        validate_pipeline(&self.name, &self.start_urls, &self.blocks)
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        Ok(())
    }

    /// JSON column values, exactly as received (blocks round-trip any extra
    /// fields through the storage boundary untouched).
    fn columns(&self) -> ApiResult<(Value, Value, Option<Value>)> {
        let start_urls = serde_json::to_value(&self.start_urls)
            .map_err(|e| ApiError::Internal(e.to_string()))?;
        let blocks = serde_json::to_value(&self.blocks)
            .map_err(|e| ApiError::Internal(e.to_string()))?;
        let settings = self
            .settings
            .as_ref()
            .map(|s| Value::Object(s.clone()));
        Ok((start_urls, blocks, settings))
    }
}

pub async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<PipelineRow>>> {
    let pipelines = pipeline_repo::list_pipelines(&state.pool).await?;
    Ok(Json(pipelines))
}

pub async fn get_one(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> ApiResult<Json<PipelineRow>> {
    let pipeline = pipeline_repo::get_pipeline(&state.pool, id).await?;
    Ok(Json(pipeline))
}

pub async fn create(
    State(state): State<AppState>,
    Json(payload): Json<PipelineDto>,
) -> ApiResult<(StatusCode, Json<PipelineRow>)> {
    payload.validate()?;
    let (start_urls, blocks, settings) = payload.columns()?;

    let pipeline =
        pipeline_repo::create_pipeline(&state.pool, &payload.name, start_urls, blocks, settings)
            .await?;
    Ok((StatusCode::CREATED, Json(pipeline)))
}

pub async fn update(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<PipelineDto>,
) -> ApiResult<Json<PipelineRow>> {
    payload.validate()?;
    let (start_urls, blocks, settings) = payload.columns()?;

    let pipeline = pipeline_repo::update_pipeline(
        &state.pool,
        id,
        &payload.name,
        start_urls,
        blocks,
        settings,
    )
    .await?;
    Ok(Json(pipeline))
}

pub async fn delete(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> ApiResult<Json<Value>> {
    // A running pipeline is stopped before its definition goes away.
    if state.coordinator.is_running(id) {
        let _ = state.coordinator.stop(id).await;
    }

    pipeline_repo::delete_pipeline(&state.pool, id).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Pipeline deleted successfully"
    })))
}

/// Validate a definition without persisting anything.
pub async fn validate(Json(payload): Json<PipelineDto>) -> ApiResult<Json<Value>> {
    payload.validate()?;
    Ok(Json(json!({ "valid": true, "message": VALID_MESSAGE })))
}
