//! Pipeline configuration parser
//!
//! Parses a GitLab-CI style YAML file into a validated [`PipelineConfig`]:
//!
//! ```yaml
//! stages: [build, test]
//! image: alpine:3.20
//! variables:
//!   RUST_LOG: debug
//!
//! compile:
//!   stage: build
//!   image: rust:1.85
//!   script:
//!     - cargo build
//! unit:
//!   stage: test
//!   script: cargo test
//! ```
//!
//! Top-level keys other than the reserved ones are jobs. Keys starting with
//! `.` are hidden templates and are skipped.

use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::domain::pipeline::{JobSpec, PipelineConfig};

/// Stages used when the file declares none
pub const DEFAULT_STAGES: &[&str] = &["build", "test", "deploy"];

/// Stage of a job that declares none
pub const DEFAULT_JOB_STAGE: &str = "test";

const RESERVED_KEYS: &[&str] = &[
    "stages",
    "image",
    "variables",
    "default",
    "include",
    "workflow",
    "before_script",
    "after_script",
    "services",
    "cache",
];

/// Errors produced while loading a pipeline configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("pipeline config not found at {0}")]
    NotFound(PathBuf),

    #[error("failed to read pipeline config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed pipeline config: {0}")]
    Malformed(String),

    #[error("stage '{0}' is declared more than once")]
    DuplicateStage(String),

    #[error("job '{job}' references undeclared stage '{stage}'")]
    UnknownStage { job: String, stage: String },

    #[error("job '{0}' has no image and no default image is set")]
    MissingImage(String),

    #[error("job '{0}' has an empty script")]
    EmptyScript(String),
}

#[derive(Debug, Deserialize)]
struct RawJob {
    stage: Option<String>,
    image: Option<String>,
    script: Option<RawScript>,
    #[serde(default)]
    variables: Mapping,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawScript {
    Line(String),
    Lines(Vec<String>),
}

impl RawScript {
    fn into_commands(self) -> Vec<String> {
        let lines = match self {
            RawScript::Line(line) => vec![line],
            RawScript::Lines(lines) => lines,
        };
        lines
            .into_iter()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect()
    }
}

/// Reads and parses the pipeline configuration at `path`
pub fn parse_file(path: &Path) -> Result<PipelineConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    parse_str(&source)
}

/// Parses a pipeline configuration from YAML source
pub fn parse_str(source: &str) -> Result<PipelineConfig, ConfigError> {
    let document: Value =
        serde_yaml::from_str(source).map_err(|e| ConfigError::Malformed(e.to_string()))?;

    let Value::Mapping(document) = document else {
        return Err(ConfigError::Malformed(
            "top level must be a mapping".to_string(),
        ));
    };

    let stages = match document.get("stages") {
        Some(value) => serde_yaml::from_value::<Vec<String>>(value.clone())
            .map_err(|e| ConfigError::Malformed(format!("stages: {}", e)))?,
        None => DEFAULT_STAGES.iter().map(|s| s.to_string()).collect(),
    };

    let mut seen = HashSet::new();
    for stage in &stages {
        if !seen.insert(stage.as_str()) {
            return Err(ConfigError::DuplicateStage(stage.clone()));
        }
    }

    let default_image = match document.get("image") {
        Some(value) => Some(
            serde_yaml::from_value::<String>(value.clone())
                .map_err(|e| ConfigError::Malformed(format!("image: {}", e)))?,
        ),
        None => None,
    };

    let global_variables = match document.get("variables") {
        Some(Value::Mapping(vars)) => parse_variables("variables", vars)?,
        Some(_) => {
            return Err(ConfigError::Malformed(
                "variables must be a mapping".to_string(),
            ));
        }
        None => BTreeMap::new(),
    };

    let mut jobs = BTreeMap::new();

    for (key, value) in &document {
        let Some(name) = key.as_str() else {
            return Err(ConfigError::Malformed(format!(
                "non-string top-level key: {:?}",
                key
            )));
        };

        if RESERVED_KEYS.contains(&name) || name.starts_with('.') {
            continue;
        }

        let raw: RawJob = serde_yaml::from_value(value.clone())
            .map_err(|e| ConfigError::Malformed(format!("job '{}': {}", name, e)))?;

        let stage = raw.stage.unwrap_or_else(|| DEFAULT_JOB_STAGE.to_string());
        if !seen.contains(stage.as_str()) {
            return Err(ConfigError::UnknownStage {
                job: name.to_string(),
                stage,
            });
        }

        let image = raw
            .image
            .or_else(|| default_image.clone())
            .filter(|image| !image.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingImage(name.to_string()))?;

        let script = raw.script.map(RawScript::into_commands).unwrap_or_default();
        if script.is_empty() {
            return Err(ConfigError::EmptyScript(name.to_string()));
        }

        let mut variables = global_variables.clone();
        variables.extend(parse_variables(name, &raw.variables)?);

        jobs.insert(
            name.to_string(),
            JobSpec {
                name: name.to_string(),
                stage,
                image,
                script,
                variables,
            },
        );
    }

    Ok(PipelineConfig { stages, jobs })
}

/// Flattens a YAML variables mapping; scalar values are stringified
fn parse_variables(owner: &str, vars: &Mapping) -> Result<BTreeMap<String, String>, ConfigError> {
    let mut parsed = BTreeMap::new();

    for (key, value) in vars {
        let key = key.as_str().ok_or_else(|| {
            ConfigError::Malformed(format!("{}: variable names must be strings", owner))
        })?;

        let value = match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Null => String::new(),
            _ => {
                return Err(ConfigError::Malformed(format!(
                    "{}: variable '{}' must be a scalar",
                    owner, key
                )));
            }
        };

        parsed.insert(key.to_string(), value);
    }

    Ok(parsed)
}
