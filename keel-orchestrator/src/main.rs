//! Keel Orchestrator
//!
//! HTTP trigger surface and persistence for the Keel CI/CD engine.
//!
//! Architecture:
//! - Configuration: server flags/env (`config`) and engine settings from env
//! - Repositories: Postgres data access
//! - Services: project registration, pipeline triggers, log queries
//! - API: axum handlers
//!
//! Triggers are acknowledged immediately; runs execute in background tasks
//! and report progress through the database.

use anyhow::{Context, Result};
use clap::Parser;
use keel_runner::{
    ComposeDeployer, EngineConfig, GitFetcher, PipelineRunner, PodmanRuntime,
    check_podman_available,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod api;
pub mod config;
pub mod db;
pub mod repository;
pub mod service;
pub mod store;

use crate::config::ServerConfig;
use crate::service::project_service::ProjectDefaults;
use crate::store::PgStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "keel_orchestrator=info,keel_runner=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Keel Orchestrator...");

    let server = ServerConfig::parse();
    let engine = EngineConfig::from_env();
    engine.validate().context("Invalid engine configuration")?;

    check_podman_available(&engine.container_bin)
        .await
        .context("Container runtime unavailable")?;

    tokio::fs::create_dir_all(&engine.workspace_root)
        .await
        .with_context(|| {
            format!(
                "Failed to create workspace root {}",
                engine.workspace_root.display()
            )
        })?;

    tracing::info!("Connecting to database...");

    // Create database connection pool
    let pool = db::create_pool(&server.database_url)
        .await
        .context("Failed to create database pool")?;

    tracing::info!("Database connection pool created");

    // Run migrations
    db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    let runner = Arc::new(PipelineRunner::new(
        engine.clone(),
        Arc::new(PodmanRuntime::new(&engine.container_bin)),
        Arc::new(PgStore::new(pool.clone())),
        Arc::new(GitFetcher::new()),
        Arc::new(ComposeDeployer::new(&engine.compose_bin)),
    ));

    // Build router with all API endpoints
    let app = api::create_router(api::AppState {
        pool,
        runner,
        defaults: ProjectDefaults {
            pipeline_filename: server.default_pipeline_file,
            deployment_filename: server.default_deployment_file,
        },
    });

    tracing::info!("Listening on {}", server.bind_addr);

    let listener = tokio::net::TcpListener::bind(&server.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", server.bind_addr))?;

    axum::serve(listener, app)
        .await
        .context("Server terminated unexpectedly")?;

    Ok(())
}
