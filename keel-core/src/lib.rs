//! Keel Core
//!
//! Core types and abstractions for the Keel CI/CD system.
//!
//! This crate contains:
//! - Domain types: Core business entities (Project, Pipeline, Job, Deployment, etc.)
//! - Parser: Pipeline configuration file (YAML) to validated stage/job model
//! - DTOs: Request and response payloads of the trigger surface

pub mod domain;
pub mod dto;
pub mod parser;
pub mod sanitize;
