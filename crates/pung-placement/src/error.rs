//! Placement error types.

use thiserror::Error;

pub type PlacementResult<T> = Result<T, PlacementError>;

/// Topologies the placement calculator refuses to partition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlacementError {
    #[error("{field} must be at least 1")]
    ZeroCount { field: &'static str },

    #[error("{vms} {role} VMs for {total} {role}s leaves every VM with zero {role}s")]
    EmptySlice {
        role: &'static str,
        total: u32,
        vms: u32,
    },

    #[error("vm id {vm_id} out of range: only {server_vms} server VMs exist")]
    VmOutOfRange { vm_id: u32, server_vms: u32 },

    #[error("{total} {role}s do not divide evenly across {vms} VMs ({dropped} would be left unassigned)")]
    UnevenSplit {
        role: &'static str,
        total: u32,
        vms: u32,
        dropped: u32,
    },
}
