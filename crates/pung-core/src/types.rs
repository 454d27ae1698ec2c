//! Shared types used across the Pung launcher crates.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How a worker maps labels to database indices during retrieval.
///
/// Serialized as the single-letter flag the worker binaries accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RetrievalScheme {
    #[serde(rename = "e")]
    Explicit,
    #[default]
    #[serde(rename = "b")]
    Bloom,
    #[serde(rename = "t")]
    Tree,
}

impl RetrievalScheme {
    /// The value passed to a worker's `-t` flag.
    pub fn flag(&self) -> &'static str {
        match self {
            RetrievalScheme::Explicit => "e",
            RetrievalScheme::Bloom => "b",
            RetrievalScheme::Tree => "t",
        }
    }
}

impl FromStr for RetrievalScheme {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "e" => Ok(RetrievalScheme::Explicit),
            "b" => Ok(RetrievalScheme::Bloom),
            "t" => Ok(RetrievalScheme::Tree),
            other => Err(ConfigError::InvalidRetrieval(other.to_string())),
        }
    }
}

impl fmt::Display for RetrievalScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.flag())
    }
}

/// Multi-retrieval optimization applied by the workers.
///
/// Absence of an optimization is modelled as `Option::<OptScheme>::None`
/// rather than a variant, since it also drops the `-o` flag and the
/// log-file suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptScheme {
    /// Power-of-two-choices aliasing.
    #[serde(rename = "p")]
    Aliasing,
    /// Hybrid scheme tolerating 2 collisions per bucket.
    #[serde(rename = "h2")]
    Hybrid2,
    /// Hybrid scheme tolerating 4 collisions per bucket.
    #[serde(rename = "h4")]
    Hybrid4,
}

impl OptScheme {
    /// The value passed to a worker's `-o` flag and used as the log tag.
    pub fn flag(&self) -> &'static str {
        match self {
            OptScheme::Aliasing => "p",
            OptScheme::Hybrid2 => "h2",
            OptScheme::Hybrid4 => "h4",
        }
    }
}

impl FromStr for OptScheme {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "p" => Ok(OptScheme::Aliasing),
            "h2" => Ok(OptScheme::Hybrid2),
            "h4" => Ok(OptScheme::Hybrid4),
            other => Err(ConfigError::InvalidOptimization(other.to_string())),
        }
    }
}

impl fmt::Display for OptScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.flag())
    }
}

/// The role hosted by a VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerRole {
    Server,
    Client,
}

impl WorkerRole {
    pub fn label(&self) -> &'static str {
        match self {
            WorkerRole::Server => "server",
            WorkerRole::Client => "client",
        }
    }
}

impl fmt::Display for WorkerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
