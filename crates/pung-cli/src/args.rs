//! Command-line flags and their resolution against pung.toml.
//!
//! Flag names follow the Python launch scripts. Precedence for every value:
//! flag, then config file, then the script default.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use tokio::sync::watch;

use pung_core::{ConfigError, LaunchConfig, OptScheme, RetrievalScheme};
use pung_launcher::command::DEFAULT_SECRET;
use pung_launcher::{
    ClientLaunch, ClientParams, DryRunSpawner, LaunchResult, ProcessSpawner, ServerLaunch, ServerParams, Spawner,
    SweepController,
};
use pung_placement::{GlobalTopology, PartitionMode};

use crate::net;

pub const DEFAULT_SERVER_BIN: &str = "./target/release/server";
pub const DEFAULT_CLIENT_BIN: &str = "./target/release/client";
pub const DEFAULT_HOST_FILE: &str = "scripts/hosts.txt";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_DEPTH: u32 = 2;
pub const DEFAULT_ROUNDS: u32 = 10;
pub const DEFAULT_TARGET: u32 = 131_072;

#[derive(Args, Debug, Clone, Default)]
pub struct TopologyArgs {
    /// Total server workers across all server VMs.
    #[arg(short = 's', long)]
    pub total_servers: Option<u32>,
    /// Total client workers across all client VMs.
    #[arg(short = 'c', long)]
    pub total_clients: Option<u32>,
    /// Number of server VMs.
    #[arg(long = "svm")]
    pub server_vms: Option<u32>,
    /// Number of client VMs.
    #[arg(long = "cvm")]
    pub client_vms: Option<u32>,
    /// Ordinal of the server VM whose slice this invocation handles.
    #[arg(short = 'i', long)]
    pub vm_id: Option<u32>,
    /// Reject counts that do not divide evenly across VMs.
    #[arg(long)]
    pub strict: bool,
}

impl TopologyArgs {
    pub fn resolve(&self, config: &LaunchConfig) -> LaunchResult<(GlobalTopology, u32)> {
        let file = &config.topology;
        let mode = if self.strict || config.launch.strict.unwrap_or(false) {
            PartitionMode::Strict
        } else {
            PartitionMode::Truncate
        };
        let topology = GlobalTopology::new(
            self.total_servers.or(file.total_servers).unwrap_or(1),
            self.total_clients.or(file.total_clients).unwrap_or(1),
            self.server_vms.or(file.server_vms).unwrap_or(1),
            self.client_vms.or(file.client_vms).unwrap_or(1),
            mode,
        )?;
        Ok((topology, self.vm_id.or(file.vm_id).unwrap_or(0)))
    }
}

/// Parameters both roles must agree on.
#[derive(Args, Debug, Clone, Default)]
pub struct ExperimentArgs {
    /// Retrieval rate (messages retrieved per round).
    #[arg(short = 'k', long)]
    pub rate: Option<u32>,
    /// Multi-retrieval optimization: p, h2, or h4.
    #[arg(short = 'o', long)]
    pub opt: Option<OptScheme>,
    /// Retrieval type: e (explicit), b (bloom), or t (tree).
    #[arg(short = 't', long = "type")]
    pub ret: Option<RetrievalScheme>,
    /// PIR recursion depth.
    #[arg(short = 'd', long)]
    pub depth: Option<u32>,
    /// Port of server id 0.
    #[arg(short = 'p', long)]
    pub port: Option<u16>,
}

struct Experiment {
    rate: u32,
    opt: Option<OptScheme>,
    ret: RetrievalScheme,
    depth: u32,
    port: u16,
}

impl ExperimentArgs {
    fn resolve(&self, config: &LaunchConfig) -> LaunchResult<Experiment> {
        let file = &config.retrieval;
        let rate = self.rate.or(file.rate).unwrap_or(1);
        if rate == 0 {
            return Err(ConfigError::Invalid {
                field: "rate",
                reason: "must be at least 1".to_string(),
            }
            .into());
        }
        Ok(Experiment {
            rate,
            opt: self.opt.or(file.opt),
            ret: self.ret.or(file.ret).unwrap_or_default(),
            depth: self.depth.or(file.depth).unwrap_or(DEFAULT_DEPTH),
            port: self.port.or(file.port).unwrap_or(DEFAULT_PORT),
        })
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct ServerArgs {
    #[command(flatten)]
    pub topology: TopologyArgs,
    #[command(flatten)]
    pub experiment: ExperimentArgs,
    /// Address the server workers bind (default: this host's address).
    #[arg(long)]
    pub ip: Option<String>,
    /// Host file listing every server worker, passed through unchanged.
    #[arg(short = 'f', long)]
    pub host_file: Option<PathBuf>,
    /// Append server output to logs in this directory.
    #[arg(long)]
    pub out: Option<PathBuf>,
    /// Server worker binary.
    #[arg(long)]
    pub server_bin: Option<PathBuf>,
}

impl ServerArgs {
    pub fn to_launch(&self, config: &LaunchConfig) -> LaunchResult<ServerLaunch> {
        let (topology, vm_id) = self.topology.resolve(config)?;
        let experiment = self.experiment.resolve(config)?;
        let params = ServerParams {
            program: self
                .server_bin
                .clone()
                .or_else(|| config.binaries.server.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SERVER_BIN)),
            ip: self
                .ip
                .clone()
                .or_else(|| config.server.ip.clone())
                .unwrap_or_else(|| net::local_ip().to_string()),
            base_port: experiment.port,
            depth: experiment.depth,
            ret: experiment.ret,
            opt: experiment.opt,
            rate: experiment.rate,
            host_file: self
                .host_file
                .clone()
                .or_else(|| config.server.host_file.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_HOST_FILE)),
            out: self.out.clone().or_else(|| config.server.out.clone()),
        };
        ServerLaunch::new(topology, vm_id, params)
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct ClientArgs {
    #[command(flatten)]
    pub topology: TopologyArgs,
    #[command(flatten)]
    pub experiment: ExperimentArgs,
    /// Message-count target; repeat for a sweep (default: 131072).
    #[arg(short = 'n', long = "num")]
    pub num: Vec<u32>,
    /// Trials per target.
    #[arg(long)]
    pub trial: Option<u32>,
    /// Rounds each client runs.
    #[arg(short = 'r', long)]
    pub rounds: Option<u32>,
    /// Server address.
    #[arg(long)]
    pub ip: Option<String>,
    /// Directory the sweep logs are appended in.
    #[arg(long)]
    pub out: Option<PathBuf>,
    /// Payload marker shared by every client.
    #[arg(long)]
    pub secret: Option<String>,
    /// Client worker binary.
    #[arg(long)]
    pub client_bin: Option<PathBuf>,
}

impl ClientArgs {
    pub fn to_launch(&self, config: &LaunchConfig) -> LaunchResult<ClientLaunch> {
        let (topology, vm_id) = self.topology.resolve(config)?;
        let experiment = self.experiment.resolve(config)?;
        let file = &config.client;

        let targets = if self.num.is_empty() {
            file.num.clone().unwrap_or_else(|| vec![DEFAULT_TARGET])
        } else {
            self.num.clone()
        };

        let params = ClientParams {
            program: self
                .client_bin
                .clone()
                .or_else(|| config.binaries.client.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CLIENT_BIN)),
            server_ip: self
                .ip
                .clone()
                .or_else(|| file.ip.clone())
                .unwrap_or_else(|| "127.0.0.1".to_string()),
            base_port: experiment.port,
            depth: experiment.depth,
            ret: experiment.ret,
            opt: experiment.opt,
            rate: experiment.rate,
            rounds: self.rounds.or(file.rounds).unwrap_or(DEFAULT_ROUNDS),
            out: self
                .out
                .clone()
                .or_else(|| file.out.clone())
                .unwrap_or_else(|| PathBuf::from(".")),
            secret: self
                .secret
                .clone()
                .or_else(|| file.secret.clone())
                .unwrap_or_else(|| DEFAULT_SECRET.to_string()),
        };

        ClientLaunch::new(
            topology,
            vm_id,
            params,
            targets,
            self.trial.or(file.trial).unwrap_or(1),
        )
    }
}

/// How batches are run, as opposed to what they contain.
#[derive(Args, Debug, Clone, Default)]
pub struct LaunchArgs {
    /// Print every command without starting workers.
    #[arg(long)]
    pub dry_run: bool,
    /// Abandon a batch still running after this many seconds.
    #[arg(long)]
    pub worker_timeout: Option<u64>,
    /// Seconds to wait between client trials.
    #[arg(long)]
    pub settle: Option<u64>,
}

impl LaunchArgs {
    pub fn controller(&self, config: &LaunchConfig, shutdown: watch::Receiver<bool>) -> SweepController {
        let spawner: Arc<dyn Spawner> = if self.dry_run {
            Arc::new(DryRunSpawner)
        } else {
            Arc::new(ProcessSpawner::new())
        };
        let settle = self
            .settle
            .or(config.launch.settle_secs)
            .map(Duration::from_secs)
            .unwrap_or(pung_launcher::sweep::DEFAULT_SETTLE);
        let timeout = self
            .worker_timeout
            .or(config.launch.worker_timeout_secs)
            .map(Duration::from_secs);

        SweepController::new(spawner, shutdown)
            .with_settle(settle)
            .with_worker_timeout(timeout)
    }
}
