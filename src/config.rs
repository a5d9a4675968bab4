//! Layered configuration for hydractl.
//!
//! Settings are read from `hydractl.toml` in the working directory when it
//! exists, with every field defaulting to the demo topology the original
//! deployment used (alice on API port 4001, bob on 4002, credentials under
//! `~/credentials`). CLI flags override file values where it matters.
//!
//! # Configuration File Format
//!
//! ```toml
//! [network]
//! testnet_magic = 1
//! hydra_scripts_tx_id = "03f8...#0"
//!
//! [binaries]
//! cardano_node = "cardano-node"
//! hydra_node = "hydra-node"
//! cardano_cli = "cardano-cli"
//!
//! [paths]
//! credentials_dir = "~/credentials"
//! node_socket = "~/node.socket"
//! protocol_parameters = "~/protocol-parameters.json"
//! db_dir = "~/db"
//! persistence_base = "~"
//! log_dir = "~/.hydractl/logs"
//! work_dir = "~/.hydractl/work"
//!
//! [nodes.alice]
//! api_port = 4001
//! listen_port = 5001
//!
//! [nodes.bob]
//! api_port = 4002
//! listen_port = 5002
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// A head participant. Each participant owns one hydra-node plus a pair of
/// on-chain credentials (node key and funds key).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Participant {
    Alice,
    Bob,
}

impl Participant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Participant::Alice => "alice",
            Participant::Bob => "bob",
        }
    }

    pub fn peer(&self) -> Participant {
        match self {
            Participant::Alice => Participant::Bob,
            Participant::Bob => Participant::Alice,
        }
    }
}

impl fmt::Display for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Participant {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "alice" => Ok(Participant::Alice),
            "bob" => Ok(Participant::Bob),
            _ => anyhow::bail!("Unknown participant '{}'. Valid values: alice, bob", s),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub testnet_magic: u32,
    /// Transaction id of the published hydra scripts for the target network.
    /// There is deliberately no baked-in fallback: starting a head node
    /// without it is a configuration error, not a guess.
    pub hydra_scripts_tx_id: Option<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            testnet_magic: 1,
            hydra_scripts_tx_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BinariesConfig {
    pub cardano_node: String,
    pub hydra_node: String,
    pub cardano_cli: String,
}

impl Default for BinariesConfig {
    fn default() -> Self {
        Self {
            cardano_node: "cardano-node".to_string(),
            hydra_node: "hydra-node".to_string(),
            cardano_cli: "cardano-cli".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub credentials_dir: String,
    pub node_socket: String,
    pub protocol_parameters: String,
    pub cardano_config: String,
    pub cardano_topology: String,
    pub db_dir: String,
    pub persistence_base: String,
    pub log_dir: String,
    pub work_dir: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            credentials_dir: "~/credentials".to_string(),
            node_socket: "~/node.socket".to_string(),
            protocol_parameters: "~/protocol-parameters.json".to_string(),
            cardano_config: "~/config.json".to_string(),
            cardano_topology: "~/topology.json".to_string(),
            db_dir: "~/db".to_string(),
            persistence_base: "~".to_string(),
            log_dir: "~/.hydractl/logs".to_string(),
            work_dir: "~/.hydractl/work".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HeadNodeConfig {
    pub api_port: u16,
    pub listen_port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodesConfig {
    pub alice: HeadNodeConfig,
    pub bob: HeadNodeConfig,
}

impl Default for NodesConfig {
    fn default() -> Self {
        Self {
            alice: HeadNodeConfig {
                api_port: 4001,
                listen_port: 5001,
            },
            bob: HeadNodeConfig {
                api_port: 4002,
                listen_port: 5002,
            },
        }
    }
}

/// Unified configuration, as read from `hydractl.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub network: NetworkConfig,
    pub binaries: BinariesConfig,
    pub paths: PathsConfig,
    pub nodes: NodesConfig,
}

pub const CONFIG_FILE: &str = "hydractl.toml";

impl Config {
    /// Load `hydractl.toml` from `dir`, or fall back to defaults when the file
    /// does not exist. A present-but-invalid file is an error, not a default.
    pub fn load_or_default(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn head(&self, participant: Participant) -> HeadNodeConfig {
        match participant {
            Participant::Alice => self.nodes.alice,
            Participant::Bob => self.nodes.bob,
        }
    }

    pub fn api_port(&self, participant: Participant) -> u16 {
        self.head(participant).api_port
    }

    pub fn ws_url(&self, participant: Participant) -> String {
        format!("ws://127.0.0.1:{}", self.api_port(participant))
    }

    pub fn api_base_url(&self, participant: Participant) -> String {
        format!("http://127.0.0.1:{}", self.api_port(participant))
    }

    pub fn credentials_dir(&self) -> PathBuf {
        expand_tilde(&self.paths.credentials_dir)
    }

    pub fn node_socket(&self) -> PathBuf {
        expand_tilde(&self.paths.node_socket)
    }

    pub fn protocol_parameters(&self) -> PathBuf {
        expand_tilde(&self.paths.protocol_parameters)
    }

    pub fn cardano_config(&self) -> PathBuf {
        expand_tilde(&self.paths.cardano_config)
    }

    pub fn cardano_topology(&self) -> PathBuf {
        expand_tilde(&self.paths.cardano_topology)
    }

    pub fn db_dir(&self) -> PathBuf {
        expand_tilde(&self.paths.db_dir)
    }

    pub fn log_dir(&self) -> PathBuf {
        expand_tilde(&self.paths.log_dir)
    }

    pub fn work_dir(&self) -> PathBuf {
        expand_tilde(&self.paths.work_dir)
    }

    pub fn persistence_dir(&self, participant: Participant) -> PathBuf {
        expand_tilde(&self.paths.persistence_base).join(format!("persistence-{}", participant))
    }

    /// Default path set handed to `clear-data`: both persistence directories
    /// plus the temp locations older demo scripts scattered around.
    pub fn clear_data_paths(&self) -> Vec<String> {
        vec![
            self.persistence_dir(Participant::Alice)
                .to_string_lossy()
                .into_owned(),
            self.persistence_dir(Participant::Bob)
                .to_string_lossy()
                .into_owned(),
            "/tmp/persistence-*".to_string(),
            "/tmp/hydra-*".to_string(),
        ]
    }
}

/// Expand a leading `~` to the user's home directory. Paths without a tilde
/// pass through untouched.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            let rest = rest.trim_start_matches('/');
            return if rest.is_empty() { home } else { home.join(rest) };
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_load_missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load_or_default(dir.path()).unwrap();
        assert_eq!(config.nodes.alice.api_port, 4001);
        assert_eq!(config.nodes.bob.api_port, 4002);
        assert_eq!(config.network.testnet_magic, 1);
        assert!(config.network.hydra_scripts_tx_id.is_none());
    }

    #[test]
    fn test_load_partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            "[network]\ntestnet_magic = 2\nhydra_scripts_tx_id = \"abc#0\"\n",
        )
        .unwrap();

        let config = Config::load_or_default(dir.path()).unwrap();
        assert_eq!(config.network.testnet_magic, 2);
        assert_eq!(config.network.hydra_scripts_tx_id.as_deref(), Some("abc#0"));
        assert_eq!(config.nodes.alice.listen_port, 5001);
    }

    #[test]
    fn test_load_invalid_file_is_an_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "network = \"not a table\"").unwrap();
        assert!(Config::load_or_default(dir.path()).is_err());
    }

    #[test]
    fn test_ws_url_uses_configured_port() {
        let config = Config::default();
        assert_eq!(config.ws_url(Participant::Alice), "ws://127.0.0.1:4001");
        assert_eq!(config.api_base_url(Participant::Bob), "http://127.0.0.1:4002");
    }

    #[test]
    fn test_expand_tilde() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(expand_tilde("~/credentials"), home.join("credentials"));
        assert_eq!(expand_tilde("~"), home);
        assert_eq!(expand_tilde("/absolute/path"), PathBuf::from("/absolute/path"));
    }

    #[test]
    fn test_participant_parse_and_peer() {
        let p: Participant = "Alice".parse().unwrap();
        assert_eq!(p, Participant::Alice);
        assert_eq!(p.peer(), Participant::Bob);
        assert!("carol".parse::<Participant>().is_err());
    }
}
