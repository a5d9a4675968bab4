//! Process supervision for the three node binaries.
//!
//! The supervised binaries expose no handle that survives a hydractl restart,
//! so everything here treats the OS process table as ground truth: status is
//! re-derived from a `pgrep` signature match on every call, the registry only
//! caches what the last probe confirmed, and start failures are diagnosed from
//! the node's log file because that is the only failure signal there is.

pub mod node;
pub mod registry;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::errors::SupervisorError;
use crate::exec::{Executor, shell_quote};

pub use node::{ALL_NODES, NodeId, NodeKind, NodeSpec};
pub use registry::{NodeProcess, ProcessRegistry};

/// Lines of log context captured when a start fails.
const LOG_EXCERPT_LINES: u32 = 40;

/// Result of a successful start.
#[derive(Debug, Clone, Copy)]
pub struct StartOutcome {
    pub pid: u32,
    pub api_port: Option<u16>,
}

/// Point-in-time view of one node, always backed by a live process-table
/// lookup.
#[derive(Debug, Clone, Serialize)]
pub struct NodeStatus {
    pub running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<chrono::DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_port: Option<u16>,
}

impl NodeStatus {
    fn stopped() -> Self {
        Self {
            running: false,
            pid: None,
            start_time: None,
            api_port: None,
        }
    }
}

pub struct NodeSupervisor {
    config: Config,
    executor: Arc<dyn Executor>,
    registry: ProcessRegistry,
    poll_attempts: u32,
    poll_interval: Duration,
}

impl NodeSupervisor {
    pub fn new(config: Config, executor: Arc<dyn Executor>) -> Self {
        Self {
            config,
            executor,
            registry: ProcessRegistry::new(),
            poll_attempts: 10,
            poll_interval: Duration::from_secs(1),
        }
    }

    /// Shrink the verification budget; used by tests.
    #[cfg(test)]
    pub fn with_poll(mut self, attempts: u32, interval: Duration) -> Self {
        self.poll_attempts = attempts;
        self.poll_interval = interval;
        self
    }

    /// Start `node` as a detached background process and wait until it shows
    /// up in the process table.
    pub async fn start(&self, node: NodeId) -> Result<StartOutcome, SupervisorError> {
        let lock = self.registry.lock(node);
        let _guard = lock.lock().await;

        let spec = NodeSpec::build(node, &self.config).map_err(|source| {
            SupervisorError::InvalidConfig {
                node: node.to_string(),
                source,
            }
        })?;

        // Reconcile before refusing: a registry entry whose process is gone is
        // pruned, a live process means AlreadyRunning whether registered or not.
        if let Some(pid) = self.probe(&spec.signature).await? {
            self.registry.mark_alive(node, pid);
            return Err(SupervisorError::AlreadyRunning {
                node: node.to_string(),
            });
        }
        self.registry.remove(node);

        if node == NodeId::Cardano {
            self.clean_stale_lock(&spec).await?;
        }

        if let Some(parent) = spec.log_file.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SupervisorError::StartFailed {
                node: node.to_string(),
                log_excerpt: format!("could not create log directory: {e}"),
            })?;
        }

        info!(node = %node, log = %spec.log_file.display(), "launching node");
        self.executor
            .spawn_background(&spec.launch_command, &spec.log_file)
            .await?;

        // The launch is fire-and-forget; the only confirmation is the process
        // showing up under its signature.
        for attempt in 1..=self.poll_attempts {
            tokio::time::sleep(self.poll_interval).await;
            if let Some(pid) = self.probe(&spec.signature).await? {
                info!(node = %node, pid, attempt, "node is up");
                self.registry.insert(NodeProcess {
                    id: node,
                    kind: node.kind(),
                    pid,
                    start_time: Utc::now(),
                    api_port: spec.api_port,
                    log_tail: None,
                    last_known_alive: Utc::now(),
                });
                return Ok(StartOutcome {
                    pid,
                    api_port: spec.api_port,
                });
            }
            debug!(node = %node, attempt, "not in process table yet");
        }

        let log_excerpt = self.log_tail(node, LOG_EXCERPT_LINES).await;
        warn!(node = %node, "start verification budget exhausted");
        Err(SupervisorError::StartFailed {
            node: node.to_string(),
            log_excerpt,
        })
    }

    /// Stop `node`. Kills both the registered pid and any process matching the
    /// node's signature, because the registry may be stale after a supervisor
    /// restart while the real process lives on. Never fails outward: a caller
    /// cannot recover from a failed stop anyway, so residual processes are
    /// logged and the stop still reports success.
    pub async fn stop(&self, node: NodeId) {
        let lock = self.registry.lock(node);
        let _guard = lock.lock().await;

        let signature = node::signature(node, &self.config);

        if let Some(entry) = self.registry.get(node) {
            self.run_quiet(&format!("kill {}", entry.pid)).await;
        }

        // Independent re-discovery, with escalating force.
        self.run_quiet(&format!("pkill -f {}", shell_quote(&signature)))
            .await;
        tokio::time::sleep(self.poll_interval).await;
        self.run_quiet(&format!("pkill -9 -f {}", shell_quote(&signature)))
            .await;

        match self.probe(&signature).await {
            Ok(Some(pid)) => warn!(node = %node, pid, "process survived kill escalation"),
            Ok(None) => info!(node = %node, "stopped"),
            Err(e) => warn!(node = %node, error = %e, "post-kill verification failed"),
        }

        self.registry.remove(node);
    }

    /// Authoritative status: live process-table lookup, registry reconciled as
    /// a side effect (stale entries pruned, confirmed entries refreshed).
    pub async fn status(&self, node: NodeId) -> Result<NodeStatus, SupervisorError> {
        let signature = node::signature(node, &self.config);
        match self.probe(&signature).await? {
            Some(pid) => {
                self.registry.mark_alive(node, pid);
                let entry = self.registry.get(node);
                Ok(NodeStatus {
                    running: true,
                    pid: Some(pid),
                    start_time: entry.map(|e| e.start_time),
                    api_port: node.participant().map(|p| self.config.api_port(p)),
                })
            }
            None => {
                if self.registry.remove(node).is_some() {
                    debug!(node = %node, "pruned stale registry entry");
                }
                Ok(NodeStatus::stopped())
            }
        }
    }

    /// Status of all three managed nodes, in fixed order.
    pub async fn status_all(&self) -> Result<Vec<(NodeId, NodeStatus)>, SupervisorError> {
        let mut out = Vec::with_capacity(ALL_NODES.len());
        for node in ALL_NODES {
            out.push((node, self.status(node).await?));
        }
        Ok(out)
    }

    /// Remove persistence data in one shell invocation and recreate the two
    /// head-node working directories. Idempotent; any failure fails the batch.
    pub async fn clear_data(&self, paths: Option<Vec<String>>) -> Result<(), SupervisorError> {
        let paths = paths.unwrap_or_else(|| self.config.clear_data_paths());
        let removals: Vec<String> = paths
            .iter()
            // Glob patterns must reach the shell unquoted to expand.
            .map(|p| {
                if p.contains('*') {
                    p.clone()
                } else {
                    shell_quote(p)
                }
            })
            .collect();

        let command = format!(
            "rm -rf {} && mkdir -p {} {}",
            removals.join(" "),
            shell_quote(
                &self
                    .config
                    .persistence_dir(crate::config::Participant::Alice)
                    .to_string_lossy()
            ),
            shell_quote(
                &self
                    .config
                    .persistence_dir(crate::config::Participant::Bob)
                    .to_string_lossy()
            ),
        );

        let output = self.executor.run(&command).await?;
        if !output.success() {
            return Err(SupervisorError::ClearDataFailed {
                detail: output.stderr.trim().to_string(),
            });
        }
        info!(count = paths.len(), "cleared persistence data");
        Ok(())
    }

    /// Last `lines` lines of the node's log file, for diagnostics.
    pub async fn log_tail(&self, node: NodeId, lines: u32) -> String {
        let log_file = node::log_file(node, &self.config);
        let tail = match self
            .executor
            .run(&format!(
                "tail -n {} {}",
                lines,
                shell_quote(&log_file.to_string_lossy())
            ))
            .await
        {
            Ok(out) if out.success() => out.stdout,
            Ok(out) => format!("(no log available: {})", out.stderr.trim()),
            Err(e) => format!("(no log available: {e})"),
        };
        self.registry.set_log_tail(node, &tail);
        tail
    }

    /// A crashed cardano-node leaves a `lock` file in its database directory
    /// that makes the next launch die with "database locked". Detect it,
    /// terminate any lingering prior instance, and remove the lock before
    /// launching. Surfaced to the caller only when the cleanup itself fails.
    async fn clean_stale_lock(&self, spec: &NodeSpec) -> Result<(), SupervisorError> {
        let lock_path = self.config.db_dir().join("lock");
        let quoted = shell_quote(&lock_path.to_string_lossy());

        let present = self
            .executor
            .run(&format!("test -f {}", quoted))
            .await?
            .success();
        if !present {
            return Ok(());
        }

        warn!(lock = %lock_path.display(), "stale ledger lock detected, cleaning up");
        self.run_quiet(&format!("pkill -TERM -f {}", shell_quote(&spec.signature)))
            .await;
        tokio::time::sleep(self.poll_interval).await;
        self.run_quiet(&format!("pkill -KILL -f {}", shell_quote(&spec.signature)))
            .await;

        let removed = self.executor.run(&format!("rm -f {}", quoted)).await?;
        if !removed.success() {
            return Err(SupervisorError::LockCleanupFailed {
                node: spec.id.to_string(),
                detail: removed.stderr.trim().to_string(),
            });
        }
        Ok(())
    }

    /// First pid matching `signature` in the process table, if any.
    async fn probe(&self, signature: &str) -> Result<Option<u32>, SupervisorError> {
        let output = self
            .executor
            .run(&format!("pgrep -f {}", shell_quote(signature)))
            .await?;
        if !output.success() {
            return Ok(None);
        }
        Ok(output
            .stdout
            .lines()
            .find_map(|line| line.trim().parse::<u32>().ok()))
    }

    /// Run a best-effort command whose failure only merits a debug line.
    async fn run_quiet(&self, command: &str) {
        match self.executor.run(command).await {
            Ok(out) if !out.success() => {
                debug!(command, exit_code = out.exit_code, "best-effort command failed")
            }
            Ok(_) => {}
            Err(e) => warn!(command, error = %e, "best-effort command could not run"),
        }
    }
}
