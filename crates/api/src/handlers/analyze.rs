//! URL analysis — fetch a page and report workable selectors.

use axum::extract::State;
use axum::Json;

use dom::PageAnalysis;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(serde::Deserialize)]
pub struct AnalyzeUrlDto {
    pub url: String,
}

pub async fn analyze(
    State(state): State<AppState>,
    Json(payload): Json<AnalyzeUrlDto>,
) -> ApiResult<Json<PageAnalysis>> {
    let page = state
        .fetcher
        .fetch(&payload.url)
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    Ok(Json(dom::analyze_page(&page)))
}
