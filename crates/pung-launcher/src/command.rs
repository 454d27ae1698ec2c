//! Command builder: placement output plus experiment parameters in,
//! fully specified worker invocations out.
//!
//! Invocations are typed records first ([`ServerInvocation`],
//! [`ClientInvocation`]) and only rendered into an argv by `to_command`.
//! Everything here is pure.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use pung_core::{OptScheme, RetrievalScheme, WorkerRole};
use pung_placement::{GlobalTopology, ServerSlice, compute_client_target, extra_tuples};

/// Payload marker every client passes as its shared secret.
pub const DEFAULT_SECRET: &str = "hahahahe";

/// Port of the worker `offset` places above `base_port`.
///
/// Widened so that no topology can overflow; callers range-check the result.
pub fn worker_port(base_port: u16, offset: u32) -> u64 {
    u64::from(base_port) + u64::from(offset)
}

/// Where a worker's stdout and stderr go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerOutput {
    /// Share the launcher's terminal.
    Inherit,
    /// Append to a log file, created on first use.
    Append(PathBuf),
}

/// A worker invocation ready to hand to a [`crate::Spawner`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerCommand {
    pub role: WorkerRole,
    /// Local slot index within this VM's batch.
    pub slot: u32,
    pub program: PathBuf,
    pub args: Vec<String>,
    pub output: WorkerOutput,
}

impl fmt::Display for WorkerCommand {
    /// Shell form, suitable for copy-pasting to reproduce a run.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", shell_quote(&self.program.display().to_string()))?;
        for arg in &self.args {
            write!(f, " {}", shell_quote(arg))?;
        }
        if let WorkerOutput::Append(path) = &self.output {
            write!(f, " >> {}", shell_quote(&path.display().to_string()))?;
        }
        Ok(())
    }
}

fn shell_quote(s: &str) -> String {
    let plain = !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=,+@%".contains(c));
    if plain {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}

/// Experiment parameters a server VM passes through to its workers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerParams {
    pub program: PathBuf,
    /// Address this VM's workers bind their RPC endpoint on.
    pub ip: String,
    /// Port of global server id 0; server `n` listens on `base_port + n`.
    pub base_port: u16,
    pub depth: u32,
    pub ret: RetrievalScheme,
    pub opt: Option<OptScheme>,
    pub rate: u32,
    pub host_file: PathBuf,
    /// Append worker output under this directory instead of inheriting it.
    pub out: Option<PathBuf>,
}

/// Experiment parameters a client VM passes through to its workers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientParams {
    pub program: PathBuf,
    pub server_ip: String,
    pub base_port: u16,
    pub depth: u32,
    pub ret: RetrievalScheme,
    pub opt: Option<OptScheme>,
    pub rate: u32,
    pub rounds: u32,
    pub out: PathBuf,
    pub secret: String,
}

/// One server worker's identity, endpoint, and capacity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerInvocation {
    pub server_id: u32,
    pub bind_ip: String,
    pub base_port: u16,
    pub bind_port: u64,
    pub capacity: u32,
    pub total_servers: u32,
    pub depth: u32,
    pub ret: RetrievalScheme,
    pub opt: Option<OptScheme>,
    pub rate: u32,
    pub host_file: PathBuf,
    pub output: WorkerOutput,
}

impl ServerInvocation {
    /// Render as a server worker argv.
    ///
    /// The worker derives its own listen port from `-s` and `-p`, so the
    /// base port is what goes on the command line.
    pub fn to_command(&self, slot: u32, program: &Path) -> WorkerCommand {
        let mut args = vec![
            "-i".to_string(),
            self.bind_ip.clone(),
            "-s".to_string(),
            self.base_port.to_string(),
            "-d".to_string(),
            self.depth.to_string(),
            "-t".to_string(),
            self.ret.flag().to_string(),
            "-m".to_string(),
            self.capacity.to_string(),
            "-h".to_string(),
            self.host_file.display().to_string(),
            "-n".to_string(),
            self.total_servers.to_string(),
            "-p".to_string(),
            self.server_id.to_string(),
            "-k".to_string(),
            self.rate.to_string(),
        ];
        if let Some(opt) = self.opt {
            args.push("-o".to_string());
            args.push(opt.flag().to_string());
        }
        WorkerCommand {
            role: WorkerRole::Server,
            slot,
            program: program.to_path_buf(),
            args,
            output: self.output.clone(),
        }
    }
}

/// One client worker's identity, target, and synthetic-load request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientInvocation {
    pub client_id: u32,
    /// Equal to `client_id` by convention.
    pub local_port: u32,
    pub target_server: u32,
    pub server_addr: String,
    pub depth: u32,
    pub rounds: u32,
    pub extra: i64,
    pub rate: u32,
    pub opt: Option<OptScheme>,
    pub ret: RetrievalScheme,
    pub secret: String,
    pub log: PathBuf,
}

impl ClientInvocation {
    pub fn to_command(&self, program: &Path) -> WorkerCommand {
        let mut args = vec![
            "-n".to_string(),
            self.client_id.to_string(),
            "-p".to_string(),
            self.local_port.to_string(),
            "-x".to_string(),
            self.secret.clone(),
            "-h".to_string(),
            self.server_addr.clone(),
            "-d".to_string(),
            self.depth.to_string(),
            "-r".to_string(),
            self.rounds.to_string(),
            "-b".to_string(),
            self.extra.to_string(),
            "-k".to_string(),
            self.rate.to_string(),
        ];
        if let Some(opt) = self.opt {
            args.push("-o".to_string());
            args.push(opt.flag().to_string());
        }
        args.push("-t".to_string());
        args.push(self.ret.flag().to_string());

        WorkerCommand {
            role: WorkerRole::Client,
            slot: self.client_id,
            program: program.to_path_buf(),
            args,
            output: WorkerOutput::Append(self.log.clone()),
        }
    }
}

/// Build one invocation per server id in `slice`.
pub fn server_invocations(
    topology: &GlobalTopology,
    slice: &ServerSlice,
    params: &ServerParams,
) -> Vec<ServerInvocation> {
    slice
        .ids()
        .map(|server_id| ServerInvocation {
            server_id,
            bind_ip: params.ip.clone(),
            base_port: params.base_port,
            bind_port: worker_port(params.base_port, server_id),
            capacity: topology.clients_per_server(),
            total_servers: topology.total_servers(),
            depth: params.depth,
            ret: params.ret,
            opt: params.opt,
            rate: params.rate,
            host_file: params.host_file.clone(),
            output: match &params.out {
                Some(dir) => WorkerOutput::Append(server_log_path(dir, server_id, topology, params.rate, params.opt)),
                None => WorkerOutput::Inherit,
            },
        })
        .collect()
}

/// Build one invocation per local client slot for message-count `target`.
pub fn client_invocations(
    topology: &GlobalTopology,
    slice: &ServerSlice,
    params: &ClientParams,
    target: u32,
) -> Vec<ClientInvocation> {
    let extra = extra_tuples(topology, target);
    let log = client_log_path(&params.out, target, topology, params.rate, params.opt);

    (0..topology.clients_per_vm())
        .map(|slot| {
            let target_server = compute_client_target(slice, slot);
            let server_port = worker_port(params.base_port, target_server);
            ClientInvocation {
                client_id: slot,
                local_port: slot,
                target_server,
                server_addr: format!("{}:{}", params.server_ip, server_port),
                depth: params.depth,
                rounds: params.rounds,
                extra,
                rate: params.rate,
                opt: params.opt,
                ret: params.ret,
                secret: params.secret.clone(),
                log: log.clone(),
            }
        })
        .collect()
}

/// Log file shared by every client worker and trial of one sweep point.
///
/// `<out>/<target>_<S>s_<C>c_<cvm>vm_<rate>k[_<opt>].log`
pub fn client_log_path(
    out: &Path,
    target: u32,
    topology: &GlobalTopology,
    rate: u32,
    opt: Option<OptScheme>,
) -> PathBuf {
    out.join(format!(
        "{target}_{}s_{}c_{}vm_{rate}k{}.log",
        topology.total_servers(),
        topology.total_clients(),
        topology.client_vms(),
        opt_suffix(opt),
    ))
}

/// `<out>/server<id>_<S>s_<C>c_<svm>vm_<rate>k[_<opt>].log`
pub fn server_log_path(
    out: &Path,
    server_id: u32,
    topology: &GlobalTopology,
    rate: u32,
    opt: Option<OptScheme>,
) -> PathBuf {
    out.join(format!(
        "server{server_id}_{}s_{}c_{}vm_{rate}k{}.log",
        topology.total_servers(),
        topology.total_clients(),
        topology.server_vms(),
        opt_suffix(opt),
    ))
}

fn opt_suffix(opt: Option<OptScheme>) -> String {
    opt.map(|o| format!("_{}", o.flag())).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pung_placement::{PartitionMode, compute_server_slice};

    fn topo(s: u32, c: u32, svm: u32, cvm: u32) -> GlobalTopology {
        GlobalTopology::new(s, c, svm, cvm, PartitionMode::Truncate).unwrap()
    }

    fn server_params() -> ServerParams {
        ServerParams {
            program: PathBuf::from("./target/release/server"),
            ip: "10.0.0.5".to_string(),
            base_port: 8000,
            depth: 2,
            ret: RetrievalScheme::Bloom,
            opt: Some(OptScheme::Hybrid2),
            rate: 64,
            host_file: PathBuf::from("scripts/hosts.txt"),
            out: None,
        }
    }

    fn client_params() -> ClientParams {
        ClientParams {
            program: PathBuf::from("./target/release/client"),
            server_ip: "10.0.0.5".to_string(),
            base_port: 8000,
            depth: 2,
            ret: RetrievalScheme::Bloom,
            opt: None,
            rate: 64,
            rounds: 10,
            out: PathBuf::from("."),
            secret: DEFAULT_SECRET.to_string(),
        }
    }

    #[test]
    fn server_command_line() {
        let t = topo(4, 8, 2, 1);
        let slice = compute_server_slice(&t, 1).unwrap();
        let params = server_params();

        let invs = server_invocations(&t, &slice, &params);
        assert_eq!(invs.len(), 2);
        assert_eq!(invs[0].server_id, 2);
        assert_eq!(invs[0].bind_port, 8002);
        assert_eq!(invs[1].bind_port, 8003);
        assert_eq!(invs[0].capacity, 2);

        let cmd = invs[0].to_command(0, &params.program);
        assert_eq!(
            cmd.to_string(),
            "./target/release/server -i 10.0.0.5 -s 8000 -d 2 -t b -m 2 -h scripts/hosts.txt -n 4 -p 2 -k 64 -o h2"
        );
        assert_eq!(cmd.output, WorkerOutput::Inherit);
    }

    #[test]
    fn server_log_when_out_given() {
        let t = topo(2, 8, 1, 1);
        let slice = compute_server_slice(&t, 0).unwrap();
        let mut params = server_params();
        params.out = Some(PathBuf::from("logs"));

        let invs = server_invocations(&t, &slice, &params);
        assert_eq!(
            invs[1].output,
            WorkerOutput::Append(PathBuf::from("logs/server1_2s_8c_1vm_64k_h2.log"))
        );
    }

    #[test]
    fn client_command_line() {
        let t = topo(2, 8, 1, 1);
        let slice = compute_server_slice(&t, 0).unwrap();
        let params = client_params();

        let invs = client_invocations(&t, &slice, &params, 1000);
        let cmd = invs[3].to_command(&params.program);
        assert_eq!(
            cmd.to_string(),
            "./target/release/client -n 3 -p 3 -x hahahahe -h 10.0.0.5:8001 -d 2 -r 10 -b 496 -k 64 -t b \
             >> ./1000_2s_8c_1vm_64k.log"
        );
        assert_eq!(cmd.slot, 3);
    }

    #[test]
    fn client_identity_and_port_are_separate_fields() {
        let t = topo(1, 4, 1, 1);
        let slice = compute_server_slice(&t, 0).unwrap();

        for inv in client_invocations(&t, &slice, &client_params(), 100) {
            assert_eq!(inv.client_id, inv.local_port);
            assert_eq!(inv.server_addr, "10.0.0.5:8000");
        }
    }

    #[test]
    fn client_opt_flag_precedes_type() {
        let t = topo(1, 1, 1, 1);
        let slice = compute_server_slice(&t, 0).unwrap();
        let mut params = client_params();
        params.opt = Some(OptScheme::Aliasing);

        let cmd = client_invocations(&t, &slice, &params, 10)[0].to_command(&params.program);
        let tail: Vec<&str> = cmd.args.iter().rev().take(4).rev().map(String::as_str).collect();
        assert_eq!(tail, vec!["-o", "p", "-t", "b"]);
        assert_eq!(cmd.output, WorkerOutput::Append(PathBuf::from("./10_1s_1c_1vm_64k_p.log")));
    }

    #[test]
    fn log_paths_distinguish_sweep_points() {
        let out = Path::new("out");
        let a = topo(2, 8, 1, 1);
        let b = topo(2, 8, 1, 2);
        let c = topo(4, 8, 1, 1);

        let paths = [
            client_log_path(out, 1000, &a, 64, None),
            client_log_path(out, 2000, &a, 64, None),
            client_log_path(out, 1000, &b, 64, None),
            client_log_path(out, 1000, &c, 64, None),
            client_log_path(out, 1000, &a, 32, None),
            client_log_path(out, 1000, &a, 64, Some(OptScheme::Hybrid2)),
            client_log_path(out, 1000, &a, 64, Some(OptScheme::Hybrid4)),
        ];
        for (i, p) in paths.iter().enumerate() {
            for q in &paths[i + 1..] {
                assert_ne!(p, q);
            }
        }
        assert_eq!(client_log_path(out, 1000, &a, 64, None), paths[0]);
    }

    #[test]
    fn negative_extra_passes_through() {
        let t = topo(2, 8, 1, 1);
        let slice = compute_server_slice(&t, 0).unwrap();
        let invs = client_invocations(&t, &slice, &client_params(), 4);
        assert_eq!(invs[0].extra, -2);
        assert!(invs[0].to_command(Path::new("c")).args.contains(&"-2".to_string()));
    }

    #[test]
    fn display_quotes_unsafe_args() {
        let cmd = WorkerCommand {
            role: WorkerRole::Client,
            slot: 0,
            program: PathBuf::from("/bin/client"),
            args: vec!["-x".to_string(), "two words".to_string(), "it's".to_string()],
            output: WorkerOutput::Append(PathBuf::from("my logs/a.log")),
        };
        assert_eq!(
            cmd.to_string(),
            r"/bin/client -x 'two words' 'it'\''s' >> 'my logs/a.log'"
        );
    }
}
