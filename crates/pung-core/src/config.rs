//! pung.toml configuration parser.
//!
//! Every field is optional: command-line flags take precedence, then the
//! file, then the built-in defaults of the launch scripts.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::types::{OptScheme, RetrievalScheme};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LaunchConfig {
    #[serde(default)]
    pub topology: TopologyConfig,
    #[serde(default)]
    pub binaries: BinariesConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub launch: LaunchSection,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TopologyConfig {
    pub total_servers: Option<u32>,
    pub total_clients: Option<u32>,
    pub server_vms: Option<u32>,
    pub client_vms: Option<u32>,
    pub vm_id: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BinariesConfig {
    pub server: Option<PathBuf>,
    pub client: Option<PathBuf>,
}

/// Parameters that both roles pass to their workers and must agree on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetrievalConfig {
    pub rate: Option<u32>,
    pub opt: Option<OptScheme>,
    #[serde(rename = "type")]
    pub ret: Option<RetrievalScheme>,
    pub depth: Option<u32>,
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    pub ip: Option<String>,
    pub host_file: Option<PathBuf>,
    pub out: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    pub ip: Option<String>,
    pub num: Option<Vec<u32>>,
    pub trial: Option<u32>,
    pub rounds: Option<u32>,
    pub out: Option<PathBuf>,
    pub secret: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LaunchSection {
    /// Reject topologies whose counts do not divide evenly.
    pub strict: Option<bool>,
    /// Delay between client trials, in seconds.
    pub settle_secs: Option<u64>,
    /// Give up waiting on a batch after this many seconds.
    pub worker_timeout_secs: Option<u64>,
}

impl LaunchConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load `path` if given, otherwise fall back to an empty config.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }
}
