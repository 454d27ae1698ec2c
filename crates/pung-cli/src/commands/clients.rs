//! `pung-launch clients`: run this VM's client sweep.

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{info, warn};

use pung_core::LaunchConfig;

use crate::args::{ClientArgs, LaunchArgs};

pub async fn run(
    args: &ClientArgs,
    launch_args: &LaunchArgs,
    config: &LaunchConfig,
    shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let launch = args
        .to_launch(config)
        .context("invalid client launch configuration")?;

    info!(
        clients = launch.slots.len(),
        targets = ?launch.targets,
        trials = launch.trials,
        dry_run = launch_args.dry_run,
        "starting client sweep"
    );

    let summary = launch_args
        .controller(config, shutdown)
        .run_clients(&launch)
        .await;

    summary.log();
    if summary.interrupted {
        warn!("client sweep interrupted; remaining trials skipped");
    }
    Ok(())
}
