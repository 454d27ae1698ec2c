//! Launcher error types.

use thiserror::Error;

use pung_core::{ConfigError, WorkerRole};
use pung_placement::PlacementError;

/// Errors that stop a launch before any worker is spawned.
///
/// Worker failures are never reported here; they are counted in
/// [`crate::BatchSummary`].
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("placement error: {0}")]
    Placement(#[from] PlacementError),

    #[error("{role} port {port} is outside the valid port range")]
    PortOverflow { role: WorkerRole, port: u64 },
}

pub type LaunchResult<T> = Result<T, LaunchError>;
