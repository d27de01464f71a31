//! Execution-record repository functions.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{DashboardCounts, ExecutionRow, ExecutionStatus};
use crate::DbError;

const RETURNING: &str =
    "id, pipeline_id, status, started_at, finished_at, items_scraped, error_message, stats";

/// Create a new execution record in `running` status.
pub async fn create_execution(
    pool: &PgPool,
    pipeline_id: Uuid,
) -> Result<ExecutionRow, DbError> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    let row = sqlx::query_as::<_, ExecutionRow>(&format!(
        r#"
        INSERT INTO pipeline_executions (id, pipeline_id, status, started_at, items_scraped)
        VALUES ($1, $2, 'running', $3, 0)
        RETURNING {RETURNING}
        "#
    ))
    .bind(id)
    .bind(pipeline_id)
    .bind(now)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Finalize an execution: terminal status, finish time, item count and the
/// captured error (when there is one).
pub async fn finish_execution(
    pool: &PgPool,
    execution_id: Uuid,
    status: ExecutionStatus,
    items_scraped: i32,
    error_message: Option<String>,
) -> Result<(), DbError> {
    sqlx::query(
        r#"
        UPDATE pipeline_executions
        SET status = $1, finished_at = $2, items_scraped = $3, error_message = $4
        WHERE id = $5
        "#,
    )
    .bind(status.to_string())
    .bind(Utc::now())
    .bind(items_scraped)
    .bind(error_message)
    .bind(execution_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Mark an execution `stopped` without touching its counters.
pub async fn mark_stopped(pool: &PgPool, execution_id: Uuid) -> Result<(), DbError> {
    sqlx::query(
        r#"
        UPDATE pipeline_executions
        SET status = 'stopped', finished_at = $1
        WHERE id = $2
        "#,
    )
    .bind(Utc::now())
    .bind(execution_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// The most recent execution still in `running` status for a pipeline.
pub async fn latest_running(
    pool: &PgPool,
    pipeline_id: Uuid,
) -> Result<Option<ExecutionRow>, DbError> {
    let row = sqlx::query_as::<_, ExecutionRow>(&format!(
        r#"
        SELECT {RETURNING} FROM pipeline_executions
        WHERE pipeline_id = $1 AND status = 'running'
        ORDER BY started_at DESC
        LIMIT 1
        "#
    ))
    .bind(pipeline_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Full execution history for a pipeline, newest first.
pub async fn list_executions(
    pool: &PgPool,
    pipeline_id: Uuid,
) -> Result<Vec<ExecutionRow>, DbError> {
    let rows = sqlx::query_as::<_, ExecutionRow>(&format!(
        r#"
        SELECT {RETURNING} FROM pipeline_executions
        WHERE pipeline_id = $1
        ORDER BY started_at DESC
        "#
    ))
    .bind(pipeline_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Fetch a single execution by its primary key.
pub async fn get_execution(pool: &PgPool, id: Uuid) -> Result<ExecutionRow, DbError> {
    let row = sqlx::query_as::<_, ExecutionRow>(&format!(
        r#"SELECT {RETURNING} FROM pipeline_executions WHERE id = $1"#
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Aggregate counts for the dashboard.
pub async fn overview(pool: &PgPool) -> Result<DashboardCounts, DbError> {
    let counts = sqlx::query_as::<_, DashboardCounts>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM pipelines)                                   AS pipelines,
            (SELECT COUNT(*) FROM pipeline_executions)                         AS executions,
            (SELECT COALESCE(SUM(items_scraped), 0) FROM pipeline_executions)  AS items_scraped
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok(counts)
}
