//! Configuration error types.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for configuration handling.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while reading or validating launcher configuration.
///
/// All of these are raised before any placement is computed.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid retrieval type '{0}' (expected e, b, or t)")]
    InvalidRetrieval(String),

    #[error("invalid optimization '{0}' (expected p, h2, or h4)")]
    InvalidOptimization(String),

    #[error("multi-retrieval optimization '{opt}' requires a retrieval rate > 1 (got {rate})")]
    OptimizationNeedsRate { opt: String, rate: u32 },

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
