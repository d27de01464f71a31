//! Pipeline CRUD operations.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::from_sqlx;
use crate::models::{PipelineRow, PipelineStatus};
use crate::DbError;

const RETURNING: &str =
    "id, name, start_urls, blocks, settings, status, created_at, updated_at";

/// Insert a new pipeline definition.
///
/// `start_urls`, `blocks` and `settings` must be the JSON shapes produced by
/// serialising the validated domain types from the `engine` crate. A
/// duplicate name surfaces as [`DbError::Conflict`].
pub async fn create_pipeline(
    pool: &PgPool,
    name: &str,
    start_urls: serde_json::Value,
    blocks: serde_json::Value,
    settings: Option<serde_json::Value>,
) -> Result<PipelineRow, DbError> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    let row = sqlx::query_as::<_, PipelineRow>(&format!(
        r#"
        INSERT INTO pipelines (id, name, start_urls, blocks, settings, status, created_at)
        VALUES ($1, $2, $3, $4, $5, 'idle', $6)
        RETURNING {RETURNING}
        "#
    ))
    .bind(id)
    .bind(name)
    .bind(start_urls)
    .bind(blocks)
    .bind(settings)
    .bind(now)
    .fetch_one(pool)
    .await
    .map_err(from_sqlx)?;

    Ok(row)
}

/// Fetch a single pipeline by its primary key.
pub async fn get_pipeline(pool: &PgPool, id: Uuid) -> Result<PipelineRow, DbError> {
    let row = sqlx::query_as::<_, PipelineRow>(&format!(
        r#"SELECT {RETURNING} FROM pipelines WHERE id = $1"#
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Return all pipelines ordered by creation time (newest first).
pub async fn list_pipelines(pool: &PgPool) -> Result<Vec<PipelineRow>, DbError> {
    let rows = sqlx::query_as::<_, PipelineRow>(&format!(
        r#"SELECT {RETURNING} FROM pipelines ORDER BY created_at DESC"#
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Replace a pipeline's definition fields and stamp `updated_at`.
pub async fn update_pipeline(
    pool: &PgPool,
    id: Uuid,
    name: &str,
    start_urls: serde_json::Value,
    blocks: serde_json::Value,
    settings: Option<serde_json::Value>,
) -> Result<PipelineRow, DbError> {
    let row = sqlx::query_as::<_, PipelineRow>(&format!(
        r#"
        UPDATE pipelines
        SET name = $1, start_urls = $2, blocks = $3, settings = $4, updated_at = $5
        WHERE id = $6
        RETURNING {RETURNING}
        "#
    ))
    .bind(name)
    .bind(start_urls)
    .bind(blocks)
    .bind(settings)
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(from_sqlx)?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Update only the lifecycle status field.
pub async fn update_status(
    pool: &PgPool,
    id: Uuid,
    status: PipelineStatus,
) -> Result<(), DbError> {
    sqlx::query("UPDATE pipelines SET status = $1 WHERE id = $2")
        .bind(status.to_string())
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Permanently delete a pipeline by its primary key.
///
/// Returns `DbError::NotFound` if no row was deleted. Execution history goes
/// with it (FK cascade).
pub async fn delete_pipeline(pool: &PgPool, id: Uuid) -> Result<(), DbError> {
    let result = sqlx::query("DELETE FROM pipelines WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}
