//! Job Repository
//!
//! Handles all database operations related to jobs.

use keel_core::domain::job::{JobRecord, JobStatus};
use keel_core::domain::pipeline::JobSpec;
use sqlx::PgPool;
use uuid::Uuid;

/// Register a pending job of a pipeline run
pub async fn create(pool: &PgPool, pipeline_id: Uuid, job: &JobSpec) -> Result<Uuid, sqlx::Error> {
    let id = Uuid::new_v4();

    sqlx::query(
        r#"
        INSERT INTO jobs (id, pipeline_id, name, stage, image, status, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(id)
    .bind(pipeline_id)
    .bind(&job.name)
    .bind(&job.stage)
    .bind(&job.image)
    .bind(status_to_string(JobStatus::Pending))
    .bind(chrono::Utc::now())
    .execute(pool)
    .await?;

    Ok(id)
}

/// Find a job by ID
pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<JobRecord>, sqlx::Error> {
    let row = sqlx::query_as::<_, JobRow>(
        r#"
        SELECT id, pipeline_id, name, stage, image, status, exit_code, started_at, finished_at
        FROM jobs
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| r.into()))
}

/// Find jobs by pipeline ID
pub async fn find_by_pipeline(
    pool: &PgPool,
    pipeline_id: Uuid,
) -> Result<Vec<JobRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, JobRow>(
        r#"
        SELECT id, pipeline_id, name, stage, image, status, exit_code, started_at, finished_at
        FROM jobs
        WHERE pipeline_id = $1
        ORDER BY created_at ASC, name ASC
        "#,
    )
    .bind(pipeline_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| r.into()).collect())
}

/// Update job status
///
/// `started_at` is stamped when the job starts running and `finished_at`
/// when it reaches a terminal state. A `None` exit code leaves the stored
/// one untouched.
pub async fn update_status(
    pool: &PgPool,
    job_id: Uuid,
    status: JobStatus,
    exit_code: Option<i32>,
) -> Result<bool, sqlx::Error> {
    let now = chrono::Utc::now();
    let started_at = (status == JobStatus::Running).then_some(now);
    let finished_at = status.is_terminal().then_some(now);

    let result = sqlx::query(
        r#"
        UPDATE jobs
        SET status = $1,
            exit_code = COALESCE($2, exit_code),
            started_at = COALESCE($3, started_at),
            finished_at = COALESCE($4, finished_at)
        WHERE id = $5
        "#,
    )
    .bind(status_to_string(status))
    .bind(exit_code)
    .bind(started_at)
    .bind(finished_at)
    .bind(job_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

// =============================================================================
// Helper Functions
// =============================================================================

fn status_to_string(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Pending => "pending",
        JobStatus::Running => "running",
        JobStatus::Success => "success",
        JobStatus::Failed => "failed",
    }
}

fn string_to_status(s: &str) -> JobStatus {
    match s {
        "pending" => JobStatus::Pending,
        "running" => JobStatus::Running,
        "success" => JobStatus::Success,
        "failed" => JobStatus::Failed,
        _ => JobStatus::Pending,
    }
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct JobRow {
    id: Uuid,
    pipeline_id: Uuid,
    name: String,
    stage: String,
    image: String,
    status: String,
    exit_code: Option<i32>,
    started_at: Option<chrono::DateTime<chrono::Utc>>,
    finished_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<JobRow> for JobRecord {
    fn from(row: JobRow) -> Self {
        JobRecord {
            id: row.id,
            pipeline_id: row.pipeline_id,
            name: row.name,
            stage: row.stage,
            image: row.image,
            status: string_to_status(&row.status),
            exit_code: row.exit_code,
            started_at: row.started_at,
            finished_at: row.finished_at,
        }
    }
}
