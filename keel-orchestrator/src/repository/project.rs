//! Project Repository
//!
//! Handles all database operations related to projects.

use keel_core::domain::project::Project;
use sqlx::PgPool;
use uuid::Uuid;

/// Insert a new project
pub async fn create(pool: &PgPool, project: &Project) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO projects (
            id, name, repo_url, access_token, pipeline_filename, deployment_filename, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(project.id)
    .bind(&project.name)
    .bind(&project.repo_url)
    .bind(&project.access_token)
    .bind(&project.pipeline_filename)
    .bind(&project.deployment_filename)
    .bind(project.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Find a project by ID
pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Project>, sqlx::Error> {
    let row = sqlx::query_as::<_, ProjectRow>(
        r#"
        SELECT id, name, repo_url, access_token, pipeline_filename, deployment_filename, created_at
        FROM projects
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| r.into()))
}

/// Find a project by its repository URL
pub async fn find_by_repo_url(pool: &PgPool, repo_url: &str) -> Result<Option<Project>, sqlx::Error> {
    let row = sqlx::query_as::<_, ProjectRow>(
        r#"
        SELECT id, name, repo_url, access_token, pipeline_filename, deployment_filename, created_at
        FROM projects
        WHERE repo_url = $1
        "#,
    )
    .bind(repo_url)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| r.into()))
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct ProjectRow {
    id: Uuid,
    name: String,
    repo_url: String,
    access_token: Option<String>,
    pipeline_filename: String,
    deployment_filename: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<ProjectRow> for Project {
    fn from(row: ProjectRow) -> Self {
        Project {
            id: row.id,
            name: row.name,
            repo_url: row.repo_url,
            access_token: row.access_token,
            pipeline_filename: row.pipeline_filename,
            deployment_filename: row.deployment_filename,
            created_at: row.created_at,
        }
    }
}
