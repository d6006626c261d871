//! Log Repository
//!
//! Handles all database operations related to job and deployment logs.

use keel_core::domain::log::{DeploymentLog, LogLine};
use sqlx::PgPool;
use uuid::Uuid;

/// Append a batch of lines to a job's log
///
/// The batch is inserted in one statement; each line gets the next `seq`
/// of the job, in batch order.
pub async fn append_job_lines(
    pool: &PgPool,
    job_id: Uuid,
    lines: Vec<String>,
) -> Result<(), sqlx::Error> {
    if lines.is_empty() {
        return Ok(());
    }

    sqlx::query(
        r#"
        INSERT INTO job_logs (job_id, seq, content, created_at)
        SELECT $1,
               COALESCE((SELECT MAX(seq) FROM job_logs WHERE job_id = $1), 0) + batch.ord,
               batch.content,
               $3
        FROM UNNEST($2::TEXT[]) WITH ORDINALITY AS batch(content, ord)
        "#,
    )
    .bind(job_id)
    .bind(&lines)
    .bind(chrono::Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

/// Get all log lines of a job in emission order
pub async fn find_by_job(pool: &PgPool, job_id: Uuid) -> Result<Vec<LogLine>, sqlx::Error> {
    let rows = sqlx::query_as::<_, LogLineRow>(
        r#"
        SELECT job_id, seq, content, created_at
        FROM job_logs
        WHERE job_id = $1
        ORDER BY seq ASC
        "#,
    )
    .bind(job_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| r.into()).collect())
}

/// Append a block of output to a deployment's log
pub async fn append_deployment_entry(
    pool: &PgPool,
    deployment_id: Uuid,
    content: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO deployment_logs (deployment_id, content, created_at)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(deployment_id)
    .bind(content)
    .bind(chrono::Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

/// Get all log entries of a deployment in insertion order
pub async fn find_by_deployment(
    pool: &PgPool,
    deployment_id: Uuid,
) -> Result<Vec<DeploymentLog>, sqlx::Error> {
    let rows = sqlx::query_as::<_, DeploymentLogRow>(
        r#"
        SELECT deployment_id, content, created_at
        FROM deployment_logs
        WHERE deployment_id = $1
        ORDER BY id ASC
        "#,
    )
    .bind(deployment_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| r.into()).collect())
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct LogLineRow {
    job_id: Uuid,
    seq: i64,
    content: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<LogLineRow> for LogLine {
    fn from(row: LogLineRow) -> Self {
        LogLine {
            job_id: row.job_id,
            seq: row.seq,
            content: row.content,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct DeploymentLogRow {
    deployment_id: Uuid,
    content: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<DeploymentLogRow> for DeploymentLog {
    fn from(row: DeploymentLogRow) -> Self {
        DeploymentLog {
            deployment_id: row.deployment_id,
            content: row.content,
            created_at: row.created_at,
        }
    }
}
