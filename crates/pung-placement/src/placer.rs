//! Placement engine: decides which ids a VM owns.
//!
//! Given a [`GlobalTopology`] and a VM ordinal, the placer decides:
//! 1. The contiguous slice of global server ids the VM owns
//! 2. Which server in that slice each local client slot targets
//! 3. How many synthetic messages each server must fabricate

use std::ops::Range;

use serde::Serialize;
use tracing::debug;

use crate::error::{PlacementError, PlacementResult};
use crate::topology::GlobalTopology;

/// The contiguous range of global server ids owned by one server VM.
///
/// Client VMs use the slice of the server VM with the same ordinal to
/// pick their targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ServerSlice {
    init_server_id: u32,
    servers_per_vm: u32,
}

impl ServerSlice {
    /// First global server id in the slice.
    pub fn init_server_id(&self) -> u32 {
        self.init_server_id
    }

    /// Number of ids in the slice. Always at least 1.
    pub fn servers_per_vm(&self) -> u32 {
        self.servers_per_vm
    }

    pub fn ids(&self) -> Range<u32> {
        self.init_server_id..self.init_server_id + self.servers_per_vm
    }

    pub fn contains(&self, server_id: u32) -> bool {
        self.ids().contains(&server_id)
    }
}

/// One local client worker and the server it is balanced against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClientSlot {
    pub slot: u32,
    pub target_server: u32,
}

/// Compute the slice of server ids owned by server VM `vm_id`.
pub fn compute_server_slice(topology: &GlobalTopology, vm_id: u32) -> PlacementResult<ServerSlice> {
    if vm_id >= topology.server_vms() {
        return Err(PlacementError::VmOutOfRange {
            vm_id,
            server_vms: topology.server_vms(),
        });
    }

    let servers_per_vm = topology.servers_per_vm();
    let slice = ServerSlice {
        init_server_id: vm_id * servers_per_vm,
        servers_per_vm,
    };
    debug!(vm_id, first = slice.init_server_id, count = servers_per_vm, "computed server slice");
    Ok(slice)
}

/// Global id of the server that local client slot `local_index` targets.
///
/// Slots are spread round-robin over the VM's own slice, never over the
/// global server set.
pub fn compute_client_target(slice: &ServerSlice, local_index: u32) -> u32 {
    slice.init_server_id + local_index % slice.servers_per_vm
}

/// Assign every local client slot of a client VM to a server in `slice`.
pub fn assign_clients(topology: &GlobalTopology, slice: &ServerSlice) -> Vec<ClientSlot> {
    (0..topology.clients_per_vm())
        .map(|slot| ClientSlot {
            slot,
            target_server: compute_client_target(slice, slot),
        })
        .collect()
}

/// Synthetic messages each server must add so that real clients plus
/// filler reach `target` messages in total.
///
/// Floor division; negative when `target` is below the client count.
pub fn extra_tuples(topology: &GlobalTopology, target: u32) -> i64 {
    let surplus = i64::from(target) - i64::from(topology.total_clients());
    surplus.div_euclid(i64::from(topology.total_servers()))
}
