//! pung-launch: places and starts Pung experiment workers on one VM.
//!
//! Run once per server VM and once per client VM:
//!
//! ```text
//! pung-launch servers -f host_file.txt -s 1 -c 8 --svm 1 --cvm 8 -i 0 -k 64 -o h2 -t b
//! pung-launch clients --ip 10.0.0.1 -s 1 -c 8 --svm 1 --cvm 8 -i 0 -k 64 -o h2 -t b -n 1000 -n 2000
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pung_core::LaunchConfig;

mod args;
mod commands;
mod net;

use args::{ClientArgs, LaunchArgs, ServerArgs};
use commands::plan::PlanFormat;

#[derive(Parser)]
#[command(
    name = "pung-launch",
    about = "Pung experiment launcher: partitions roles across VMs and starts workers",
    version,
    propagate_version = true
)]
struct Cli {
    /// Read defaults from a pung.toml file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server workers owned by this VM.
    Servers {
        #[command(flatten)]
        args: ServerArgs,
        #[command(flatten)]
        launch: LaunchArgs,
    },
    /// Run the client sweep for this VM: every target, every trial.
    Clients {
        #[command(flatten)]
        args: ClientArgs,
        #[command(flatten)]
        launch: LaunchArgs,
    },
    /// Print placement and commands without starting anything.
    Plan {
        /// Output format.
        #[arg(long, value_enum, default_value_t = PlanFormat::Text, global = true)]
        format: PlanFormat,
        #[command(subcommand)]
        role: PlanRole,
    },
}

#[derive(Subcommand)]
enum PlanRole {
    Servers(ServerArgs),
    Clients(ClientArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries the commands themselves.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = LaunchConfig::load(cli.config.as_deref()).context("failed to load config")?;

    match cli.command {
        Commands::Servers { args, launch } => {
            commands::servers::run(&args, &launch, &config, shutdown_listener()).await
        }
        Commands::Clients { args, launch } => {
            commands::clients::run(&args, &launch, &config, shutdown_listener()).await
        }
        Commands::Plan { format, role } => match role {
            PlanRole::Servers(args) => commands::plan::servers(&args, &config, format),
            PlanRole::Clients(args) => commands::plan::clients(&args, &config, format),
        },
    }
}

/// Flips to `true` on SIGINT or SIGTERM. Spawned workers are left running.
fn shutdown_listener() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received");
        let _ = tx.send(true);
    });
    rx
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_client_sweep() {
        let cli = Cli::try_parse_from([
            "pung-launch", "clients", "-n", "1000", "-n", "2000", "--trial", "3", "--dry-run",
        ])
        .unwrap();
        match cli.command {
            Commands::Clients { args, launch } => {
                assert_eq!(args.num, vec![1000, 2000]);
                assert_eq!(args.trial, Some(3));
                assert!(launch.dry_run);
            }
            _ => panic!("expected clients"),
        }
    }

    #[test]
    fn config_file_feeds_client_launch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pung.toml");
        std::fs::write(
            &path,
            "[topology]\ntotal_servers = 2\ntotal_clients = 8\n\n[client]\nnum = [1000]\ntrial = 2\n",
        )
        .unwrap();

        let cli = Cli::try_parse_from(["pung-launch", "--config", path.to_str().unwrap(), "clients", "-k", "4"]).unwrap();
        let config = LaunchConfig::load(cli.config.as_deref()).unwrap();
        let Commands::Clients { args, .. } = cli.command else {
            panic!("expected clients");
        };
        let launch = args.to_launch(&config).unwrap();

        assert_eq!(launch.targets, vec![1000]);
        assert_eq!(launch.trials, 2);
        assert_eq!(launch.slots.len(), 8);
        let cmd = launch.commands_for(1000)[1].to_string();
        assert!(cmd.contains("-h 127.0.0.1:8001"));
        assert!(cmd.contains("-b 496 -k 4"));
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let cli = Cli::try_parse_from(["pung-launch", "plan", "servers", "--config", path.to_str().unwrap()]).unwrap();
        assert!(LaunchConfig::load(cli.config.as_deref()).is_err());
    }

    #[test]
    fn parses_plan_with_config() {
        let cli = Cli::try_parse_from([
            "pung-launch", "plan", "servers", "-s", "4", "--format", "json", "--config", "pung.toml",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("pung.toml")));
        match cli.command {
            Commands::Plan { format, role: PlanRole::Servers(args) } => {
                assert_eq!(format, PlanFormat::Json);
                assert_eq!(args.topology.total_servers, Some(4));
            }
            _ => panic!("expected plan servers"),
        }
    }
}
