//! Pipeline Repository
//!
//! Handles all database operations related to pipeline runs.

use keel_core::domain::pipeline::{PipelineRecord, PipelineStatus};
use sqlx::PgPool;
use uuid::Uuid;

/// Create a new pending pipeline run
pub async fn create(
    pool: &PgPool,
    project_id: Uuid,
    branch: &str,
    commit_hash: &str,
) -> Result<PipelineRecord, sqlx::Error> {
    let now = chrono::Utc::now();

    let pipeline = PipelineRecord {
        id: Uuid::new_v4(),
        project_id,
        branch: branch.to_string(),
        commit_hash: commit_hash.to_string(),
        status: PipelineStatus::Pending,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO pipelines (id, project_id, branch, commit_hash, status, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(pipeline.id)
    .bind(project_id)
    .bind(branch)
    .bind(commit_hash)
    .bind(status_to_string(pipeline.status))
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(pipeline)
}

/// Find a pipeline run by ID
pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<PipelineRecord>, sqlx::Error> {
    let row = sqlx::query_as::<_, PipelineRow>(
        r#"
        SELECT id, project_id, branch, commit_hash, status, created_at, updated_at
        FROM pipelines
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| r.into()))
}

/// Most recent successful run of a project
pub async fn find_last_successful(
    pool: &PgPool,
    project_id: Uuid,
) -> Result<Option<PipelineRecord>, sqlx::Error> {
    let row = sqlx::query_as::<_, PipelineRow>(
        r#"
        SELECT id, project_id, branch, commit_hash, status, created_at, updated_at
        FROM pipelines
        WHERE project_id = $1 AND status = $2
        ORDER BY created_at DESC
        LIMIT 1
        "#,
    )
    .bind(project_id)
    .bind(status_to_string(PipelineStatus::Success))
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| r.into()))
}

/// Update the status of a pipeline run
pub async fn update_status(
    pool: &PgPool,
    id: Uuid,
    status: PipelineStatus,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE pipelines
        SET status = $1, updated_at = $2
        WHERE id = $3
        "#,
    )
    .bind(status_to_string(status))
    .bind(chrono::Utc::now())
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

// =============================================================================
// Helper Functions
// =============================================================================

fn status_to_string(status: PipelineStatus) -> &'static str {
    match status {
        PipelineStatus::Pending => "pending",
        PipelineStatus::Running => "running",
        PipelineStatus::Success => "success",
        PipelineStatus::Failed => "failed",
        PipelineStatus::Cancelled => "cancelled",
    }
}

fn string_to_status(s: &str) -> PipelineStatus {
    match s {
        "pending" => PipelineStatus::Pending,
        "running" => PipelineStatus::Running,
        "success" => PipelineStatus::Success,
        "failed" => PipelineStatus::Failed,
        "cancelled" => PipelineStatus::Cancelled,
        _ => PipelineStatus::Pending,
    }
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct PipelineRow {
    id: Uuid,
    project_id: Uuid,
    branch: String,
    commit_hash: String,
    status: String,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<PipelineRow> for PipelineRecord {
    fn from(row: PipelineRow) -> Self {
        PipelineRecord {
            id: row.id,
            project_id: row.project_id,
            branch: row.branch,
            commit_hash: row.commit_hash,
            status: string_to_status(&row.status),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
