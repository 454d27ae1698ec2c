//! `pung-launch plan`: show placement and commands without spawning.

use std::fmt::Write;
use std::ops::Range;

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Serialize;

use pung_core::LaunchConfig;
use pung_launcher::{ClientLaunch, ServerLaunch};
use pung_placement::GlobalTopology;

use crate::args::{ClientArgs, ServerArgs};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum PlanFormat {
    #[default]
    Text,
    Json,
}

/// Ids that no VM owns under floor-division truncation.
#[derive(Debug, Serialize)]
struct Unassigned {
    server_ids: Range<u32>,
    clients: u32,
}

impl Unassigned {
    fn of(topology: &GlobalTopology) -> Self {
        Self {
            server_ids: topology.unassigned_server_ids(),
            clients: topology.unassigned_clients(),
        }
    }

    fn is_empty(&self) -> bool {
        self.server_ids.is_empty() && self.clients == 0
    }

    fn write_text(&self, out: &mut String) -> std::fmt::Result {
        if self.is_empty() {
            return Ok(());
        }
        writeln!(
            out,
            "unassigned: servers {}..{}, {} client(s)",
            self.server_ids.start, self.server_ids.end, self.clients
        )
    }
}

#[derive(Serialize)]
struct ServerPlanView<'a> {
    #[serde(flatten)]
    launch: &'a ServerLaunch,
    unassigned: Unassigned,
    commands: Vec<String>,
}

#[derive(Serialize)]
struct TargetView {
    target: u32,
    extra: i64,
    commands: Vec<String>,
}

#[derive(Serialize)]
struct ClientPlanView<'a> {
    #[serde(flatten)]
    launch: &'a ClientLaunch,
    unassigned: Unassigned,
    sweep: Vec<TargetView>,
}

pub fn servers(args: &ServerArgs, config: &LaunchConfig, format: PlanFormat) -> Result<()> {
    let launch = args.to_launch(config).context("invalid server launch configuration")?;
    print!("{}", render_servers(&launch, format)?);
    Ok(())
}

pub fn clients(args: &ClientArgs, config: &LaunchConfig, format: PlanFormat) -> Result<()> {
    let launch = args.to_launch(config).context("invalid client launch configuration")?;
    print!("{}", render_clients(&launch, format)?);
    Ok(())
}

fn render_servers(launch: &ServerLaunch, format: PlanFormat) -> Result<String> {
    let commands: Vec<String> = launch.commands().iter().map(ToString::to_string).collect();

    if format == PlanFormat::Json {
        let view = ServerPlanView {
            launch,
            unassigned: Unassigned::of(&launch.topology),
            commands,
        };
        return Ok(serde_json::to_string_pretty(&view)? + "\n");
    }

    let ids = launch.slice.ids();
    let mut out = String::new();
    writeln!(
        out,
        "server VM {}: servers {}..{} of {}, {} clients each",
        launch.vm_id,
        ids.start,
        ids.end,
        launch.topology.total_servers(),
        launch.topology.clients_per_server(),
    )?;
    Unassigned::of(&launch.topology).write_text(&mut out)?;
    for cmd in commands {
        writeln!(out, "  {cmd}")?;
    }
    Ok(out)
}

fn render_clients(launch: &ClientLaunch, format: PlanFormat) -> Result<String> {
    let sweep: Vec<TargetView> = launch
        .targets
        .iter()
        .map(|&target| TargetView {
            target,
            extra: launch.extra_for(target),
            commands: launch.commands_for(target).iter().map(ToString::to_string).collect(),
        })
        .collect();

    if format == PlanFormat::Json {
        let view = ClientPlanView {
            launch,
            unassigned: Unassigned::of(&launch.topology),
            sweep,
        };
        return Ok(serde_json::to_string_pretty(&view)? + "\n");
    }

    let ids = launch.slice.ids();
    let mut out = String::new();
    writeln!(
        out,
        "client VM: {} clients over servers {}..{}, {} trial(s) per target",
        launch.slots.len(),
        ids.start,
        ids.end,
        launch.trials,
    )?;
    Unassigned::of(&launch.topology).write_text(&mut out)?;
    for point in sweep {
        writeln!(out, "target {} (extra {} per server)", point.target, point.extra)?;
        for cmd in point.commands {
            writeln!(out, "  {cmd}")?;
        }
    }
    Ok(out)
}
