//! `pung-launch servers`: start this VM's slice of server workers.

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{info, warn};

use pung_core::LaunchConfig;

use crate::args::{LaunchArgs, ServerArgs};

pub async fn run(
    args: &ServerArgs,
    launch_args: &LaunchArgs,
    config: &LaunchConfig,
    shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let launch = args
        .to_launch(config)
        .context("invalid server launch configuration")?;

    info!(
        vm_id = launch.vm_id,
        servers = launch.invocations.len(),
        dry_run = launch_args.dry_run,
        "launching server workers"
    );

    let summary = launch_args
        .controller(config, shutdown)
        .run_servers(&launch)
        .await;

    summary.log();
    if summary.interrupted {
        warn!("server launch interrupted");
    }
    Ok(())
}
