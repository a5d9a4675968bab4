//! Process-wide registry of supervised node processes.
//!
//! The registry is a *hint*, not ground truth: entries are inserted on a
//! confirmed start, pruned whenever a liveness probe comes back empty, and the
//! live process table always wins a disagreement. It also owns the per-node
//! locks that serialize start/stop for the same node.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex as AsyncMutex;

use super::node::{ALL_NODES, NodeId, NodeKind};

/// Metadata for one live (or last-known-live) node process.
#[derive(Debug, Clone)]
pub struct NodeProcess {
    pub id: NodeId,
    pub kind: NodeKind,
    pub pid: u32,
    pub start_time: DateTime<Utc>,
    pub api_port: Option<u16>,
    pub log_tail: Option<String>,
    pub last_known_alive: DateTime<Utc>,
}

#[derive(Default)]
pub struct ProcessRegistry {
    entries: Mutex<HashMap<NodeId, NodeProcess>>,
    locks: HashMap<NodeId, Arc<AsyncMutex<()>>>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        let locks = ALL_NODES
            .iter()
            .map(|id| (*id, Arc::new(AsyncMutex::new(()))))
            .collect();
        Self {
            entries: Mutex::new(HashMap::new()),
            locks,
        }
    }

    /// The mutual-exclusion lock serializing start/stop for `node`.
    pub fn lock(&self, node: NodeId) -> Arc<AsyncMutex<()>> {
        Arc::clone(&self.locks[&node])
    }

    pub fn get(&self, node: NodeId) -> Option<NodeProcess> {
        self.entries.lock().unwrap().get(&node).cloned()
    }

    /// Insert the entry for `node`, replacing any stale predecessor. At most
    /// one entry per node can exist by construction (map keyed by id).
    pub fn insert(&self, process: NodeProcess) {
        self.entries.lock().unwrap().insert(process.id, process);
    }

    pub fn remove(&self, node: NodeId) -> Option<NodeProcess> {
        self.entries.lock().unwrap().remove(&node)
    }

    /// Refresh liveness bookkeeping after a successful process-table probe.
    pub fn mark_alive(&self, node: NodeId, pid: u32) {
        if let Some(entry) = self.entries.lock().unwrap().get_mut(&node) {
            entry.pid = pid;
            entry.last_known_alive = Utc::now();
        }
    }

    /// Remember the most recently captured log excerpt for `node`.
    pub fn set_log_tail(&self, node: NodeId, tail: &str) {
        if let Some(entry) = self.entries.lock().unwrap().get_mut(&node) {
            entry.log_tail = Some(tail.to_string());
        }
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.entries.lock().unwrap().contains_key(&node)
    }
}
