//! Log Service
//!
//! Read access to job and deployment logs.

use keel_core::domain::log::{DeploymentLog, LogLine};
use sqlx::PgPool;
use uuid::Uuid;

use crate::repository::{deployment_repository, job_repository, log_repository};

/// Service error type
#[derive(Debug)]
pub enum LogError {
    JobNotFound(Uuid),
    DeploymentNotFound(Uuid),
    DatabaseError(sqlx::Error),
}

impl From<sqlx::Error> for LogError {
    fn from(err: sqlx::Error) -> Self {
        LogError::DatabaseError(err)
    }
}

pub type Result<T> = std::result::Result<T, LogError>;

/// Get all log lines of a job
pub async fn get_job_logs(pool: &PgPool, job_id: Uuid) -> Result<Vec<LogLine>> {
    job_repository::find_by_id(pool, job_id)
        .await?
        .ok_or(LogError::JobNotFound(job_id))?;

    let logs = log_repository::find_by_job(pool, job_id).await?;
    Ok(logs)
}

/// Get all log entries of a deployment
pub async fn get_deployment_logs(pool: &PgPool, deployment_id: Uuid) -> Result<Vec<DeploymentLog>> {
    deployment_repository::find_by_id(pool, deployment_id)
        .await?
        .ok_or(LogError::DeploymentNotFound(deployment_id))?;

    let logs = log_repository::find_by_deployment(pool, deployment_id).await?;
    Ok(logs)
}
