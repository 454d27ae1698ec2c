//! End-to-end sweep scenarios.
//!
//! Drives full server and client launches through a spawner that records
//! every command instead of starting processes.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pung_core::{OptScheme, RetrievalScheme};
use pung_launcher::command::DEFAULT_SECRET;
use pung_launcher::*;
use pung_placement::{GlobalTopology, PartitionMode};
use tokio::sync::watch;
use tokio::time::Instant;

#[derive(Default)]
struct RecordingSpawner {
    commands: Mutex<Vec<WorkerCommand>>,
}

impl RecordingSpawner {
    fn recorded(&self) -> Vec<WorkerCommand> {
        self.commands.lock().unwrap().clone()
    }
}

impl Spawner for RecordingSpawner {
    fn spawn(&self, command: &WorkerCommand) -> WorkerFuture {
        self.commands.lock().unwrap().push(command.clone());
        let slot = command.slot;
        Box::pin(async move { WorkerOutcome::Exited { slot, code: Some(0) } })
    }
}

/// Records the (paused) clock reading at every spawn.
#[derive(Default)]
struct TimedSpawner {
    starts: Mutex<Vec<Instant>>,
}

impl TimedSpawner {
    fn starts(&self) -> Vec<Instant> {
        self.starts.lock().unwrap().clone()
    }
}

impl Spawner for TimedSpawner {
    fn spawn(&self, command: &WorkerCommand) -> WorkerFuture {
        self.starts.lock().unwrap().push(Instant::now());
        let slot = command.slot;
        Box::pin(async move { WorkerOutcome::Exited { slot, code: Some(0) } })
    }
}

fn topology(s: u32, c: u32, svm: u32, cvm: u32) -> GlobalTopology {
    GlobalTopology::new(s, c, svm, cvm, PartitionMode::Truncate).unwrap()
}

fn client_params(rate: u32, opt: Option<OptScheme>) -> ClientParams {
    ClientParams {
        program: PathBuf::from("./target/release/client"),
        server_ip: "10.1.0.1".to_string(),
        base_port: 8000,
        depth: 2,
        ret: RetrievalScheme::Bloom,
        opt,
        rate,
        rounds: 10,
        out: PathBuf::from("results"),
        secret: DEFAULT_SECRET.to_string(),
    }
}

fn controller(spawner: Arc<RecordingSpawner>) -> SweepController {
    // A dropped sender never signals shutdown.
    let (_, rx) = watch::channel(false);
    SweepController::new(spawner, rx).with_settle(Duration::ZERO)
}

fn arg_after<'a>(cmd: &'a WorkerCommand, flag: &str) -> &'a str {
    let pos = cmd.args.iter().position(|a| a == flag).unwrap();
    &cmd.args[pos + 1]
}

#[tokio::test]
async fn one_server_eight_clients_all_target_server_zero() {
    let launch = ClientLaunch::new(topology(1, 8, 1, 1), 0, client_params(1, None), vec![1000], 1).unwrap();
    let spawner = Arc::new(RecordingSpawner::default());

    let summary = controller(spawner.clone()).run_clients(&launch).await;

    let cmds = spawner.recorded();
    assert_eq!(cmds.len(), 8);
    assert_eq!(summary.launched, 8);
    assert_eq!(summary.succeeded, 8);
    for cmd in &cmds {
        assert_eq!(arg_after(cmd, "-h"), "10.1.0.1:8000");
    }
}

#[tokio::test]
async fn two_servers_split_clients_by_parity() {
    let launch = ClientLaunch::new(topology(2, 8, 1, 1), 0, client_params(64, None), vec![1000], 1).unwrap();
    let spawner = Arc::new(RecordingSpawner::default());

    controller(spawner.clone()).run_clients(&launch).await;

    for cmd in spawner.recorded() {
        let expected = if cmd.slot % 2 == 0 { "10.1.0.1:8000" } else { "10.1.0.1:8001" };
        assert_eq!(arg_after(&cmd, "-h"), expected);
        assert_eq!(arg_after(&cmd, "-b"), "496");
        assert_eq!(arg_after(&cmd, "-k"), "64");
    }
}

#[tokio::test]
async fn trials_share_a_log_and_targets_do_not() {
    let launch = ClientLaunch::new(
        topology(2, 4, 1, 2),
        0,
        client_params(64, Some(OptScheme::Hybrid2)),
        vec![1000, 2000],
        3,
    )
    .unwrap();
    let spawner = Arc::new(RecordingSpawner::default());

    let summary = controller(spawner.clone()).run_clients(&launch).await;

    // 2 targets × 3 trials × 2 clients per VM.
    let cmds = spawner.recorded();
    assert_eq!(cmds.len(), 12);
    assert_eq!(summary.batches, 6);

    let logs: Vec<PathBuf> = cmds
        .iter()
        .map(|c| match &c.output {
            WorkerOutput::Append(path) => path.clone(),
            WorkerOutput::Inherit => panic!("client output must go to a log"),
        })
        .collect();
    let first = PathBuf::from("results/1000_2s_4c_2vm_64k_h2.log");
    let second = PathBuf::from("results/2000_2s_4c_2vm_64k_h2.log");
    assert!(logs[..6].iter().all(|p| *p == first));
    assert!(logs[6..].iter().all(|p| *p == second));

    // Both calls for the same target yield identical commands.
    assert_eq!(cmds[0..2], cmds[2..4]);
    assert_eq!(arg_after(&cmds[6], "-b"), "998");
}

#[tokio::test]
async fn second_server_vm_starts_ids_two_and_three() {
    let params = ServerParams {
        program: PathBuf::from("./target/release/server"),
        ip: "10.1.0.2".to_string(),
        base_port: 8000,
        depth: 2,
        ret: RetrievalScheme::Tree,
        opt: None,
        rate: 1,
        host_file: PathBuf::from("scripts/hosts.txt"),
        out: None,
    };
    let launch = ServerLaunch::new(topology(4, 16, 2, 1), 1, params).unwrap();
    let spawner = Arc::new(RecordingSpawner::default());

    let summary = controller(spawner.clone()).run_servers(&launch).await;

    let cmds = spawner.recorded();
    assert_eq!(summary.batches, 1);
    let ids: Vec<&str> = cmds.iter().map(|c| arg_after(c, "-p")).collect();
    assert_eq!(ids, vec!["2", "3"]);
    assert!(cmds.iter().all(|c| arg_after(c, "-m") == "4"));
    assert!(cmds.iter().all(|c| arg_after(c, "-n") == "4"));
    assert_eq!(launch.invocations[1].bind_port, 8003);
}

#[tokio::test]
async fn dry_run_spawner_reports_success() {
    let launch = ClientLaunch::new(topology(1, 3, 1, 1), 0, client_params(1, None), vec![10, 20], 2).unwrap();
    let (_tx, rx) = watch::channel(false);
    let controller = SweepController::new(Arc::new(DryRunSpawner), rx).with_settle(Duration::ZERO);

    let summary = controller.run_clients(&launch).await;

    assert_eq!(summary.batches, 4);
    assert_eq!(summary.launched, 12);
    assert_eq!(summary.succeeded, 12);
    assert!(!summary.interrupted);
}

#[tokio::test(start_paused = true)]
async fn trials_are_paced_by_the_settle_delay() {
    let launch = ClientLaunch::new(topology(1, 2, 1, 1), 0, client_params(1, None), vec![10], 3).unwrap();
    let spawner = Arc::new(TimedSpawner::default());
    let (_tx, rx) = watch::channel(false);
    let controller = SweepController::new(spawner.clone(), rx).with_settle(Duration::from_secs(1));

    let start = Instant::now();
    let summary = controller.run_clients(&launch).await;

    assert_eq!(summary.batches, 3);
    let starts = spawner.starts();
    assert_eq!(starts.len(), 6);
    for (i, at) in starts.iter().enumerate() {
        let trial = (i / 2) as u64;
        let offset = at.duration_since(start);
        assert!(offset >= Duration::from_secs(trial), "slot {i} started at {offset:?}");
        assert!(offset < Duration::from_secs(trial + 1), "slot {i} started at {offset:?}");
    }
    // The delay also follows the final trial.
    assert!(start.elapsed() >= Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn shutdown_during_settle_starts_no_further_trials() {
    let launch = ClientLaunch::new(topology(1, 2, 1, 1), 0, client_params(1, None), vec![10, 20], 3).unwrap();
    let spawner = Arc::new(TimedSpawner::default());
    let (tx, rx) = watch::channel(false);
    let controller = SweepController::new(spawner.clone(), rx).with_settle(Duration::from_secs(10));

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        let _ = tx.send(true);
    });
    let start = Instant::now();
    let summary = controller.run_clients(&launch).await;

    assert!(summary.interrupted);
    assert_eq!(summary.batches, 1);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(spawner.starts().len(), 2);
    assert!(start.elapsed() < Duration::from_secs(10));
}
