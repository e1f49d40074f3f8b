//! Error types for loading tenant configuration documents.

use thiserror::Error;

/// Errors that can occur while loading schema or ruleset documents.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read.
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// YAML document failed to parse.
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON document failed to parse.
    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Document parsed but is structurally invalid.
    #[error("invalid configuration: {0}")]
    Config(String),
}
