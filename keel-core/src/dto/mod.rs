//! Data Transfer Objects for the trigger surface
//!
//! Request and response payloads exchanged with the orchestrator's HTTP API.

pub mod pipeline;
pub mod project;
pub mod webhook;
