//! Managed node identities and launch specifications.
//!
//! The supervisor never holds a first-class handle to the binaries it starts;
//! a node is identified in the process table by its *signature* — the binary
//! name plus, for the two head nodes, the API port that distinguishes them
//! (both run the same `hydra-node` binary).

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::config::{Config, Participant};
use crate::exec::shell_quote;

/// One of the three supervised processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeId {
    Cardano,
    Alice,
    Bob,
}

pub const ALL_NODES: [NodeId; 3] = [NodeId::Cardano, NodeId::Alice, NodeId::Bob];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Ledger,
    Head,
}

impl NodeId {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeId::Cardano => "cardano-node",
            NodeId::Alice => "alice-node",
            NodeId::Bob => "bob-node",
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            NodeId::Cardano => NodeKind::Ledger,
            NodeId::Alice | NodeId::Bob => NodeKind::Head,
        }
    }

    pub fn participant(&self) -> Option<Participant> {
        match self {
            NodeId::Cardano => None,
            NodeId::Alice => Some(Participant::Alice),
            NodeId::Bob => Some(Participant::Bob),
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cardano" | "cardano-node" => Ok(NodeId::Cardano),
            "alice" | "alice-node" => Ok(NodeId::Alice),
            "bob" | "bob-node" => Ok(NodeId::Bob),
            _ => anyhow::bail!("Unknown node '{}'. Valid values: alice, bob, cardano", s),
        }
    }
}

/// `pgrep -f` pattern that matches `id`'s process and nothing else.
/// Available without a full launch spec so `stop`/`status` work even when
/// the launch configuration is incomplete.
pub fn signature(id: NodeId, config: &Config) -> String {
    match id {
        NodeId::Cardano => format!(
            "{}.*--database-path {}",
            config.binaries.cardano_node,
            config.db_dir().display()
        ),
        NodeId::Alice | NodeId::Bob => {
            let participant = id.participant().expect("head node has a participant");
            format!(
                "{}.*--api-port {}",
                config.binaries.hydra_node,
                config.api_port(participant)
            )
        }
    }
}

/// Per-node log file the background launch redirects into.
pub fn log_file(id: NodeId, config: &Config) -> PathBuf {
    config.log_dir().join(format!("{}.log", id.as_str()))
}

/// Everything needed to launch one node and later find it again.
#[derive(Debug, Clone)]
pub struct NodeSpec {
    pub id: NodeId,
    /// `pgrep -f` pattern that matches this node and nothing else.
    pub signature: String,
    /// Full shell command line handed to the background executor.
    pub launch_command: String,
    pub log_file: PathBuf,
    pub api_port: Option<u16>,
}

impl NodeSpec {
    /// Build the launch specification for `id` from the configuration.
    ///
    /// Fails for a head node when `hydra_scripts_tx_id` is not configured:
    /// guessing a per-network constant here would go silently stale on a
    /// network upgrade.
    pub fn build(id: NodeId, config: &Config) -> anyhow::Result<Self> {
        let launch_command = match id {
            NodeId::Cardano => cardano_command(config),
            NodeId::Alice | NodeId::Bob => {
                let participant = id.participant().expect("head node has a participant");
                hydra_command(id, participant, config)?
            }
        };
        Ok(Self {
            id,
            signature: signature(id, config),
            launch_command,
            log_file: log_file(id, config),
            api_port: id.participant().map(|p| config.api_port(p)),
        })
    }
}

fn cardano_command(config: &Config) -> String {
    let args = [
        "run".to_string(),
        format!("--config {}", shell_quote(&config.cardano_config().to_string_lossy())),
        format!(
            "--topology {}",
            shell_quote(&config.cardano_topology().to_string_lossy())
        ),
        format!(
            "--socket-path {}",
            shell_quote(&config.node_socket().to_string_lossy())
        ),
        format!("--database-path {}", shell_quote(&config.db_dir().to_string_lossy())),
    ];
    format!("{} {}", config.binaries.cardano_node, args.join(" "))
}

fn hydra_command(id: NodeId, participant: Participant, config: &Config) -> anyhow::Result<String> {
    let scripts_tx_id = config
        .network
        .hydra_scripts_tx_id
        .as_deref()
        .ok_or_else(|| {
            anyhow::anyhow!(
                "hydra_scripts_tx_id is not configured; set [network].hydra_scripts_tx_id in {}",
                crate::config::CONFIG_FILE
            )
        })?;

    let peer = participant.peer();
    let head = config.head(participant);
    let peer_head = config.head(peer);
    let creds = config.credentials_dir();

    let key = |name: String| shell_quote(&creds.join(name).to_string_lossy());

    let args = [
        format!("--node-id {}", id.as_str()),
        format!(
            "--persistence-dir {}",
            shell_quote(&config.persistence_dir(participant).to_string_lossy())
        ),
        format!("--cardano-signing-key {}", key(format!("{participant}-node.sk"))),
        format!("--hydra-signing-key {}", key(format!("{participant}-hydra.sk"))),
        format!("--hydra-scripts-tx-id {}", shell_quote(scripts_tx_id)),
        format!(
            "--ledger-protocol-parameters {}",
            shell_quote(&config.protocol_parameters().to_string_lossy())
        ),
        format!("--testnet-magic {}", config.network.testnet_magic),
        format!(
            "--node-socket {}",
            shell_quote(&config.node_socket().to_string_lossy())
        ),
        format!("--api-port {}", head.api_port),
        "--api-host 127.0.0.1".to_string(),
        format!("--listen 127.0.0.1:{}", head.listen_port),
        format!("--peer 127.0.0.1:{}", peer_head.listen_port),
        format!("--hydra-verification-key {}", key(format!("{peer}-hydra.vk"))),
        format!("--cardano-verification-key {}", key(format!("{peer}-node.vk"))),
    ];
    Ok(format!("{} {}", config.binaries.hydra_node, args.join(" ")))
}
