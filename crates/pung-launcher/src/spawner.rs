//! Worker spawning: the only layer that touches the OS.
//!
//! A [`Spawner`] starts a worker immediately and hands back a future that
//! resolves when the worker exits. Start order therefore follows call
//! order, while waiting is left to the caller.

use std::fs::{File, OpenOptions};
use std::future::Future;
use std::io::{self, Write};
use std::path::Path;
use std::pin::Pin;
use std::process::Stdio;

use serde::Serialize;
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::command::{WorkerCommand, WorkerOutput};

/// Resolves once a spawned worker has exited (or failed to start).
pub type WorkerFuture = Pin<Box<dyn Future<Output = WorkerOutcome> + Send>>;

/// How one worker invocation ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum WorkerOutcome {
    /// The worker ran and exited. `code` is `None` when killed by a signal.
    Exited { slot: u32, code: Option<i32> },
    /// The worker never started (missing binary, unwritable log, ...).
    SpawnFailed { slot: u32, error: String },
}

impl WorkerOutcome {
    pub fn slot(&self) -> u32 {
        match self {
            WorkerOutcome::Exited { slot, .. } | WorkerOutcome::SpawnFailed { slot, .. } => *slot,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, WorkerOutcome::Exited { code: Some(0), .. })
    }
}

/// Starts workers. Implementations must not block.
pub trait Spawner: Send + Sync {
    fn spawn(&self, command: &WorkerCommand) -> WorkerFuture;
}

/// Spawns real OS processes with their output appended to log files.
///
/// On unix each worker leads its own process group, so signals sent to
/// the launcher's group do not reach it. Dropping the returned future
/// does not kill the worker.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessSpawner;

impl ProcessSpawner {
    pub fn new() -> Self {
        Self
    }

    fn start(command: &WorkerCommand) -> io::Result<Child> {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args).stdin(Stdio::null());
        // A terminal ctrl-c reaches the launcher's group only.
        #[cfg(unix)]
        cmd.process_group(0);

        let log = match &command.output {
            WorkerOutput::Inherit => None,
            WorkerOutput::Append(path) => {
                let file = open_log(path)?;
                cmd.stdout(Stdio::from(file.try_clone()?))
                    .stderr(Stdio::from(file.try_clone()?));
                Some(file)
            }
        };

        cmd.spawn().inspect_err(|e| {
            // Record the failure where the worker's own output would have gone.
            if let Some(mut file) = log.as_ref() {
                let _ = writeln!(
                    file,
                    "pung-launch: failed to start {}: {e}",
                    command.program.display()
                );
            }
        })
    }
}

fn open_log(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

impl Spawner for ProcessSpawner {
    fn spawn(&self, command: &WorkerCommand) -> WorkerFuture {
        let slot = command.slot;
        let mut child = match Self::start(command) {
            Ok(child) => child,
            Err(e) => {
                warn!(role = %command.role, slot, program = %command.program.display(), error = %e, "worker failed to start");
                return Box::pin(std::future::ready(WorkerOutcome::SpawnFailed {
                    slot,
                    error: e.to_string(),
                }));
            }
        };
        debug!(role = %command.role, slot, pid = child.id(), "worker started");

        Box::pin(async move {
            match child.wait().await {
                Ok(status) => WorkerOutcome::Exited {
                    slot,
                    code: status.code(),
                },
                Err(e) => WorkerOutcome::SpawnFailed {
                    slot,
                    error: e.to_string(),
                },
            }
        })
    }
}

/// Starts nothing; every worker "exits" successfully at once.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunSpawner;

impl Spawner for DryRunSpawner {
    fn spawn(&self, command: &WorkerCommand) -> WorkerFuture {
        Box::pin(std::future::ready(WorkerOutcome::Exited {
            slot: command.slot,
            code: Some(0),
        }))
    }
}
