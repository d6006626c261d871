//! API Module
//!
//! HTTP API layer for the orchestrator.
//! Each submodule handles endpoints for a specific domain.

pub mod deployment;
pub mod error;
pub mod health;
pub mod job;
pub mod pipeline;
pub mod project;
pub mod webhook;

use axum::{
    Router,
    routing::{get, post},
};
use keel_runner::PipelineRunner;
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::service::project_service::ProjectDefaults;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub runner: Arc<PipelineRunner>,
    pub defaults: ProjectDefaults,
}

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Project endpoints
        .route("/project", post(project::create_project))
        .route("/project/{id}", get(project::get_project))
        .route("/project/{id}/trigger", post(project::trigger_pipeline))
        // Trigger endpoints
        .route("/webhook/push", post(webhook::push))
        // Run inspection endpoints
        .route("/pipeline/{id}", get(pipeline::get_pipeline))
        .route("/job/{id}/logs", get(job::get_job_logs))
        .route("/deployment/{id}/logs", get(deployment::get_deployment_logs))
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
