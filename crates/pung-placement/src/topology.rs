//! Global experiment topology.
//!
//! All ratios use floor division, matching the Pung launch scripts.
//! Uneven splits therefore leave a tail of ids without an owner unless [`PartitionMode::Strict`] is used.

use std::ops::Range;

use serde::Serialize;
use tracing::warn;

use crate::error::{PlacementError, PlacementResult};

/// What to do when a role count does not divide evenly across its VMs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PartitionMode {
    /// Floor-divide and leave the remainder unassigned (logged).
    #[default]
    Truncate,
    /// Reject the topology.
    Strict,
}

/// Global experiment size, validated once per invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GlobalTopology {
    total_servers: u32,
    total_clients: u32,
    server_vms: u32,
    client_vms: u32,
}

impl GlobalTopology {
    /// Validate the four logical counts.
    ///
    /// Zero counts and VM counts that would give every VM an empty slice
    /// are always rejected. Uneven splits are rejected only in strict mode.
    pub fn new(
        total_servers: u32,
        total_clients: u32,
        server_vms: u32,
        client_vms: u32,
        mode: PartitionMode,
    ) -> PlacementResult<Self> {
        for (field, value) in [
            ("total servers", total_servers),
            ("total clients", total_clients),
            ("server VMs", server_vms),
            ("client VMs", client_vms),
        ] {
            if value == 0 {
                return Err(PlacementError::ZeroCount { field });
            }
        }

        let topology = Self {
            total_servers,
            total_clients,
            server_vms,
            client_vms,
        };

        if topology.servers_per_vm() == 0 {
            return Err(PlacementError::EmptySlice {
                role: "server",
                total: total_servers,
                vms: server_vms,
            });
        }
        if topology.clients_per_vm() == 0 {
            return Err(PlacementError::EmptySlice {
                role: "client",
                total: total_clients,
                vms: client_vms,
            });
        }

        if topology.check_split("server", total_servers, server_vms, mode)? {
            warn!(
                total_servers,
                server_vms,
                unassigned_ids = ?topology.unassigned_server_ids(),
                "uneven server split; trailing server ids have no owner"
            );
        }
        if topology.check_split("client", total_clients, client_vms, mode)? {
            warn!(
                total_clients,
                client_vms,
                unassigned = topology.unassigned_clients(),
                "uneven client split; trailing clients are never started"
            );
        }

        if topology.clients_per_server() == 0 {
            warn!(
                total_servers,
                total_clients, "fewer clients than servers; servers will expect zero clients"
            );
        }

        Ok(topology)
    }

    /// Returns whether the split leaves a tail unassigned.
    fn check_split(&self, role: &'static str, total: u32, vms: u32, mode: PartitionMode) -> PlacementResult<bool> {
        let dropped = total % vms;
        if dropped == 0 {
            return Ok(false);
        }
        match mode {
            PartitionMode::Strict => Err(PlacementError::UnevenSplit {
                role,
                total,
                vms,
                dropped,
            }),
            PartitionMode::Truncate => Ok(true),
        }
    }

    pub fn total_servers(&self) -> u32 {
        self.total_servers
    }

    pub fn total_clients(&self) -> u32 {
        self.total_clients
    }

    pub fn server_vms(&self) -> u32 {
        self.server_vms
    }

    pub fn client_vms(&self) -> u32 {
        self.client_vms
    }

    /// Clients each server should expect (its capacity).
    pub fn clients_per_server(&self) -> u32 {
        self.total_clients / self.total_servers
    }

    /// Server workers per server VM.
    pub fn servers_per_vm(&self) -> u32 {
        self.total_servers / self.server_vms
    }

    /// Client workers per client VM.
    pub fn clients_per_vm(&self) -> u32 {
        self.total_clients / self.client_vms
    }

    /// Global server ids that no VM owns because of truncation.
    pub fn unassigned_server_ids(&self) -> Range<u32> {
        self.servers_per_vm() * self.server_vms..self.total_servers
    }

    /// Clients that no VM starts because of truncation.
    pub fn unassigned_clients(&self) -> u32 {
        self.total_clients - self.clients_per_vm() * self.client_vms
    }
}
