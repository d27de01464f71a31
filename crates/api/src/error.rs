//! Unified error-to-response mapping for the API layer.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use engine::EngineError;

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Internal(msg) => {
                tracing::error!("internal error: {msg}");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_string())
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<db::DbError> for ApiError {
    fn from(e: db::DbError) -> Self {
        match e {
            db::DbError::NotFound => ApiError::NotFound("not found".to_string()),
            db::DbError::Conflict(msg) => ApiError::Conflict(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::Validation(v) => ApiError::BadRequest(v.to_string()),
            EngineError::PipelineNotFound(_) => ApiError::NotFound(e.to_string()),
            EngineError::AlreadyRunning(_) => {
                ApiError::BadRequest("Pipeline is already running".to_string())
            }
            EngineError::NotRunning(_) => {
                ApiError::BadRequest("Pipeline is not running".to_string())
            }
            EngineError::MalformedDefinition(_) => ApiError::BadRequest(e.to_string()),
            EngineError::Database(db_err) => db_err.into(),
        }
    }
}
