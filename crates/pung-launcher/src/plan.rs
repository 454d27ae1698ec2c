//! Per-VM launch plans.
//!
//! A plan is everything a launcher invocation decides before it spawns
//! anything. Building one validates the topology, the VM ordinal, and
//! the port range, so configuration problems surface before any worker
//! starts.

use serde::Serialize;
use tracing::info;

use pung_core::{ConfigError, WorkerRole};
use pung_placement::{ClientSlot, GlobalTopology, ServerSlice, assign_clients, compute_server_slice, extra_tuples};

use crate::command::{
    ClientInvocation, ClientParams, ServerInvocation, ServerParams, WorkerCommand, client_invocations,
    server_invocations, worker_port,
};
use crate::error::{LaunchError, LaunchResult};

const MAX_PORT: u64 = u16::MAX as u64;

/// The server workers one server VM starts.
#[derive(Debug, Clone, Serialize)]
pub struct ServerLaunch {
    pub topology: GlobalTopology,
    pub vm_id: u32,
    pub slice: ServerSlice,
    pub invocations: Vec<ServerInvocation>,
    #[serde(skip)]
    params: ServerParams,
}

impl ServerLaunch {
    pub fn new(topology: GlobalTopology, vm_id: u32, params: ServerParams) -> LaunchResult<Self> {
        let slice = compute_server_slice(&topology, vm_id)?;
        check_port(WorkerRole::Server, worker_port(params.base_port, slice.ids().end - 1))?;
        let invocations = server_invocations(&topology, &slice, &params);

        info!(
            vm_id,
            first_server = slice.init_server_id(),
            servers = slice.servers_per_vm(),
            capacity = topology.clients_per_server(),
            "server placement computed"
        );

        Ok(Self {
            topology,
            vm_id,
            slice,
            invocations,
            params,
        })
    }

    /// One command per owned server id, in id order.
    pub fn commands(&self) -> Vec<WorkerCommand> {
        self.invocations
            .iter()
            .zip(0..)
            .map(|(inv, slot)| inv.to_command(slot, &self.params.program))
            .collect()
    }
}

/// One (message-count target, trial) point of a client sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExperimentRun {
    pub target: u32,
    pub trial: u32,
}

/// The client workers one client VM starts, across the whole sweep.
#[derive(Debug, Clone, Serialize)]
pub struct ClientLaunch {
    pub topology: GlobalTopology,
    /// Ordinal of the server VM whose slice these clients target.
    pub vm_id: u32,
    pub slice: ServerSlice,
    pub slots: Vec<ClientSlot>,
    pub targets: Vec<u32>,
    pub trials: u32,
    #[serde(skip)]
    params: ClientParams,
}

impl ClientLaunch {
    pub fn new(
        topology: GlobalTopology,
        vm_id: u32,
        params: ClientParams,
        targets: Vec<u32>,
        trials: u32,
    ) -> LaunchResult<Self> {
        if targets.is_empty() {
            return Err(ConfigError::Invalid {
                field: "num",
                reason: "at least one message-count target is required".to_string(),
            }
            .into());
        }
        if trials == 0 {
            return Err(ConfigError::Invalid {
                field: "trial",
                reason: "must be at least 1".to_string(),
            }
            .into());
        }
        if let Some(opt) = params.opt {
            if params.rate <= 1 {
                return Err(ConfigError::OptimizationNeedsRate {
                    opt: opt.flag().to_string(),
                    rate: params.rate,
                }
                .into());
            }
        }

        let slice = compute_server_slice(&topology, vm_id)?;
        check_port(WorkerRole::Client, u64::from(topology.clients_per_vm() - 1))?;
        check_port(WorkerRole::Server, worker_port(params.base_port, slice.ids().end - 1))?;
        let slots = assign_clients(&topology, &slice);

        info!(
            vm_id,
            clients = topology.clients_per_vm(),
            first_server = slice.init_server_id(),
            servers = slice.servers_per_vm(),
            targets = targets.len(),
            trials,
            "client placement computed"
        );

        Ok(Self {
            topology,
            vm_id,
            slice,
            slots,
            targets,
            trials,
            params,
        })
    }

    /// Every sweep point in launch order: targets as given, trials inner.
    pub fn runs(&self) -> impl Iterator<Item = ExperimentRun> + '_ {
        self.targets
            .iter()
            .flat_map(move |&target| (0..self.trials).map(move |trial| ExperimentRun { target, trial }))
    }

    pub fn extra_for(&self, target: u32) -> i64 {
        extra_tuples(&self.topology, target)
    }

    pub fn invocations_for(&self, target: u32) -> Vec<ClientInvocation> {
        client_invocations(&self.topology, &self.slice, &self.params, target)
    }

    /// One command per local client slot, in slot order.
    pub fn commands_for(&self, target: u32) -> Vec<WorkerCommand> {
        self.invocations_for(target)
            .iter()
            .map(|inv| inv.to_command(&self.params.program))
            .collect()
    }
}

fn check_port(role: WorkerRole, port: u64) -> LaunchResult<()> {
    if port > MAX_PORT {
        return Err(LaunchError::PortOverflow { role, port });
    }
    Ok(())
}
