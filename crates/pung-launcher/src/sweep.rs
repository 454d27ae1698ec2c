//! Sweep controller: drives targets × trials × slots and paces trials.
//!
//! Every batch is joined as a whole before the controller moves on: a
//! trial is complete only when all of this VM's workers have exited.
//! Worker failures are counted, never retried.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinSet};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::command::WorkerCommand;
use crate::plan::{ClientLaunch, ServerLaunch};
use crate::spawner::{Spawner, WorkerOutcome};

/// Pause between client trials.
pub const DEFAULT_SETTLE: Duration = Duration::from_secs(1);

/// Outcome counts for one batch of workers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub launched: u32,
    pub succeeded: u32,
    /// Exited non-zero or killed by a signal.
    pub failed: u32,
    pub spawn_failed: u32,
    /// Still running when the worker timeout expired.
    pub timed_out: u32,
    pub interrupted: bool,
}

impl BatchSummary {
    fn record(&mut self, outcome: &WorkerOutcome) {
        match outcome {
            WorkerOutcome::Exited { code: Some(0), .. } => self.succeeded += 1,
            WorkerOutcome::Exited { slot, code } => {
                warn!(slot, code = ?code, "worker exited unsuccessfully");
                self.failed += 1;
            }
            WorkerOutcome::SpawnFailed { slot, error } => {
                warn!(slot, %error, "worker did not run");
                self.spawn_failed += 1;
            }
        }
    }
}

/// Totals across every batch of a launcher invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepSummary {
    pub batches: u32,
    pub launched: u32,
    pub succeeded: u32,
    pub failed: u32,
    pub spawn_failed: u32,
    pub timed_out: u32,
    pub interrupted: bool,
}

impl SweepSummary {
    fn absorb(&mut self, batch: &BatchSummary) {
        self.batches += 1;
        self.launched += batch.launched;
        self.succeeded += batch.succeeded;
        self.failed += batch.failed;
        self.spawn_failed += batch.spawn_failed;
        self.timed_out += batch.timed_out;
        self.interrupted |= batch.interrupted;
    }

    pub fn log(&self) {
        info!(
            batches = self.batches,
            launched = self.launched,
            succeeded = self.succeeded,
            failed = self.failed,
            spawn_failed = self.spawn_failed,
            timed_out = self.timed_out,
            interrupted = self.interrupted,
            "launch finished"
        );
    }
}

enum BatchEvent {
    Joined(Option<Result<WorkerOutcome, JoinError>>),
    Shutdown,
    TimedOut,
}

/// Runs batches of worker commands through a [`Spawner`].
pub struct SweepController {
    spawner: Arc<dyn Spawner>,
    shutdown: watch::Receiver<bool>,
    settle: Duration,
    worker_timeout: Option<Duration>,
}

impl SweepController {
    /// The controller stops at the next wait point once `shutdown` reads `true`.
    pub fn new(spawner: Arc<dyn Spawner>, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            spawner,
            shutdown,
            settle: DEFAULT_SETTLE,
            worker_timeout: None,
        }
    }

    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Without a timeout a hung worker stalls the sweep indefinitely.
    pub fn with_worker_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.worker_timeout = timeout;
        self
    }

    /// Start every command, then wait for all of them to exit.
    pub async fn run_batch(&self, commands: &[WorkerCommand]) -> BatchSummary {
        let mut summary = BatchSummary::default();
        let mut set = JoinSet::new();

        for command in commands {
            println!("{command}");
            info!(role = %command.role, slot = command.slot, %command, "launching worker");
            set.spawn(self.spawner.spawn(command));
            summary.launched += 1;
        }

        let deadline = self.worker_timeout.map(|t| Instant::now() + t);
        loop {
            let event = tokio::select! {
                joined = set.join_next() => BatchEvent::Joined(joined),
                _ = wait_for_shutdown(self.shutdown.clone()) => BatchEvent::Shutdown,
                _ = sleep_until(deadline) => BatchEvent::TimedOut,
            };

            match event {
                BatchEvent::Joined(None) => break,
                BatchEvent::Joined(Some(Ok(outcome))) => {
                    debug!(
                        slot = outcome.slot(),
                        success = outcome.is_success(),
                        remaining = set.len(),
                        "worker finished"
                    );
                    summary.record(&outcome);
                }
                BatchEvent::Joined(Some(Err(e))) => {
                    warn!(error = %e, "worker wait task failed");
                    summary.failed += 1;
                }
                BatchEvent::Shutdown => {
                    warn!(running = set.len(), "shutdown requested; leaving running workers alone");
                    summary.interrupted = true;
                    break;
                }
                BatchEvent::TimedOut => {
                    summary.timed_out = set.len() as u32;
                    warn!(running = summary.timed_out, "worker timeout expired; abandoning batch");
                    break;
                }
            }
        }

        // Workers still running keep being reaped in the background.
        set.detach_all();
        summary
    }

    /// Launch one server VM's workers as a single batch.
    pub async fn run_servers(&self, launch: &ServerLaunch) -> SweepSummary {
        let mut total = SweepSummary::default();
        let batch = self.run_batch(&launch.commands()).await;
        total.absorb(&batch);
        total
    }

    /// Run the whole client sweep: each target in order, `trials` times.
    pub async fn run_clients(&self, launch: &ClientLaunch) -> SweepSummary {
        let mut total = SweepSummary::default();

        for run in launch.runs() {
            info!(
                target = run.target,
                trial = run.trial,
                extra = launch.extra_for(run.target),
                "starting trial"
            );
            let batch = self.run_batch(&launch.commands_for(run.target)).await;
            total.absorb(&batch);
            info!(
                target = run.target,
                trial = run.trial,
                succeeded = batch.succeeded,
                failed = batch.failed + batch.spawn_failed,
                "trial complete"
            );

            if batch.interrupted || self.settle_interrupted().await {
                total.interrupted = true;
                break;
            }
        }

        total
    }

    async fn settle_interrupted(&self) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(self.settle) => false,
            _ = wait_for_shutdown(self.shutdown.clone()) => {
                warn!("shutdown requested; skipping remaining trials");
                true
            }
        }
    }
}

/// Resolves once the shutdown flag is set. Never resolves if the sender
/// is dropped without setting it.
pub async fn wait_for_shutdown(mut rx: watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
