//! pung-launcher: turns placement into running workers.
//!
//! Builds the exact invocation each local worker needs and drives the
//! trial sweep. The only side effects live in [`spawner::ProcessSpawner`];
//! everything above it is testable without starting processes.
//!
//! # Architecture
//!
//! ```text
//! ServerLaunch / ClientLaunch   (placement + params → invocations)
//!   └── WorkerCommand           (program, argv, log target)
//!         └── SweepController   (targets × trials × slots, pacing)
//!               └── Spawner     (OS processes, or dry run)
//! ```

pub mod command;
pub mod error;
pub mod plan;
pub mod spawner;
pub mod sweep;

pub use command::{ClientInvocation, ClientParams, ServerInvocation, ServerParams, WorkerCommand, WorkerOutput};
pub use error::{LaunchError, LaunchResult};
pub use plan::{ClientLaunch, ExperimentRun, ServerLaunch};
pub use spawner::{DryRunSpawner, ProcessSpawner, Spawner, WorkerFuture, WorkerOutcome};
pub use sweep::{BatchSummary, SweepController, SweepSummary};
