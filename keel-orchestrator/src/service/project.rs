//! Project Service
//!
//! Business logic for project registration.

use keel_core::domain::project::Project;
use keel_core::dto::project::CreateProject;
use sqlx::PgPool;
use std::path::{Component, Path};
use uuid::Uuid;

use crate::repository::project_repository;

/// Filenames applied to projects that do not name their own
#[derive(Debug, Clone)]
pub struct ProjectDefaults {
    pub pipeline_filename: String,
    pub deployment_filename: String,
}

/// Service error type
#[derive(Debug)]
pub enum ProjectError {
    NotFound(Uuid),
    ValidationError(String),
    DatabaseError(sqlx::Error),
}

impl From<sqlx::Error> for ProjectError {
    fn from(err: sqlx::Error) -> Self {
        ProjectError::DatabaseError(err)
    }
}

pub type Result<T> = std::result::Result<T, ProjectError>;

/// Register a new project
pub async fn create_project(
    pool: &PgPool,
    req: CreateProject,
    defaults: &ProjectDefaults,
) -> Result<Project> {
    let project = build_project(req, defaults)?;

    if project_repository::find_by_repo_url(pool, &project.repo_url)
        .await?
        .is_some()
    {
        return Err(ProjectError::ValidationError(format!(
            "A project for {} already exists",
            project.repo_url
        )));
    }

    project_repository::create(pool, &project).await?;

    tracing::info!("Project created: {} ({})", project.name, project.id);

    Ok(project)
}

/// Get a project by ID
pub async fn get_project(pool: &PgPool, id: Uuid) -> Result<Project> {
    project_repository::find_by_id(pool, id)
        .await?
        .ok_or(ProjectError::NotFound(id))
}

/// Find the project of a repository, registering it with defaults if unknown
pub async fn find_or_create_for_repo(
    pool: &PgPool,
    name: &str,
    repo_url: &str,
    defaults: &ProjectDefaults,
) -> Result<Project> {
    if let Some(project) = project_repository::find_by_repo_url(pool, repo_url).await? {
        return Ok(project);
    }

    let req = CreateProject {
        name: name.to_string(),
        repo_url: repo_url.to_string(),
        access_token: None,
        pipeline_filename: None,
        deployment_filename: None,
    };
    let project = build_project(req, defaults)?;
    project_repository::create(pool, &project).await?;

    tracing::info!(
        "Project registered from push event: {} ({})",
        project.name,
        project.id
    );

    Ok(project)
}

// =============================================================================
// Validation
// =============================================================================

fn build_project(req: CreateProject, defaults: &ProjectDefaults) -> Result<Project> {
    validate_project_request(&req)?;

    let pipeline_filename = req
        .pipeline_filename
        .unwrap_or_else(|| defaults.pipeline_filename.clone());
    let deployment_filename = req
        .deployment_filename
        .unwrap_or_else(|| defaults.deployment_filename.clone());
    validate_filename("pipeline_filename", &pipeline_filename)?;
    validate_filename("deployment_filename", &deployment_filename)?;

    Ok(Project {
        id: Uuid::new_v4(),
        name: req.name.trim().to_string(),
        repo_url: req.repo_url.trim().to_string(),
        access_token: req.access_token.filter(|t| !t.is_empty()),
        pipeline_filename,
        deployment_filename,
        created_at: chrono::Utc::now(),
    })
}

fn validate_project_request(req: &CreateProject) -> Result<()> {
    if req.name.trim().is_empty() {
        return Err(ProjectError::ValidationError(
            "Project name cannot be empty".to_string(),
        ));
    }

    if req.name.len() > 255 {
        return Err(ProjectError::ValidationError(
            "Project name is too long (max 255 characters)".to_string(),
        ));
    }

    if req.repo_url.trim().is_empty() {
        return Err(ProjectError::ValidationError(
            "Repository URL cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Config files are read from inside the checkout only
fn validate_filename(field: &str, filename: &str) -> Result<()> {
    let path = Path::new(filename);
    let inside_checkout = !filename.is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));

    if !inside_checkout {
        return Err(ProjectError::ValidationError(format!(
            "{} must be a relative path inside the repository",
            field
        )));
    }

    Ok(())
}
