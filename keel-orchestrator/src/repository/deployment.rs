//! Deployment Repository
//!
//! Handles all database operations related to deployments.

use keel_core::domain::deployment::{DeploymentRecord, DeploymentStatus};
use sqlx::PgPool;
use uuid::Uuid;

/// Reserve a pending deployment for a pipeline run
pub async fn create(pool: &PgPool, pipeline_id: Uuid) -> Result<Uuid, sqlx::Error> {
    let id = Uuid::new_v4();
    let now = chrono::Utc::now();

    sqlx::query(
        r#"
        INSERT INTO deployments (id, pipeline_id, status, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(id)
    .bind(pipeline_id)
    .bind(status_to_string(DeploymentStatus::Pending))
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(id)
}

/// Find a deployment by ID
pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<DeploymentRecord>, sqlx::Error> {
    let row = sqlx::query_as::<_, DeploymentRow>(
        r#"
        SELECT id, pipeline_id, status, created_at, updated_at
        FROM deployments
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| r.into()))
}

/// Find the deployment of a pipeline run
pub async fn find_by_pipeline(
    pool: &PgPool,
    pipeline_id: Uuid,
) -> Result<Option<DeploymentRecord>, sqlx::Error> {
    let row = sqlx::query_as::<_, DeploymentRow>(
        r#"
        SELECT id, pipeline_id, status, created_at, updated_at
        FROM deployments
        WHERE pipeline_id = $1
        ORDER BY created_at DESC
        LIMIT 1
        "#,
    )
    .bind(pipeline_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| r.into()))
}

/// Update deployment status
pub async fn update_status(
    pool: &PgPool,
    id: Uuid,
    status: DeploymentStatus,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE deployments
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

fn status_to_string(status: DeploymentStatus) -> &'static str {
    match status {
        DeploymentStatus::Pending => "pending",
        DeploymentStatus::Deploying => "deploying",
        DeploymentStatus::Success => "success",
        DeploymentStatus::Failed => "failed",
        DeploymentStatus::RolledBack => "rolled_back",
    }
}

fn string_to_status(s: &str) -> DeploymentStatus {
    match s {
        "pending" => DeploymentStatus::Pending,
        "deploying" => DeploymentStatus::Deploying,
        "success" => DeploymentStatus::Success,
        "failed" => DeploymentStatus::Failed,
        "rolled_back" => DeploymentStatus::RolledBack,
        _ => DeploymentStatus::Pending,
    }
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct DeploymentRow {
    id: Uuid,
    pipeline_id: Uuid,
    status: String,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<DeploymentRow> for DeploymentRecord {
    fn from(row: DeploymentRow) -> Self {
        DeploymentRecord {
            id: row.id,
            pipeline_id: row.pipeline_id,
            status: string_to_status(&row.status),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
