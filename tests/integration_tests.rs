//! Integration tests for the hydractl CLI.
//!
//! Everything here runs without any node binaries installed: the commands
//! under test either never reach the shell, or probe a process table that
//! cannot contain a match.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Helper to create a hydractl Command
fn hydractl() -> Command {
    Command::cargo_bin("hydractl").unwrap()
}

/// Project directory with an isolated hydractl.toml so tests never touch the
/// real home directory.
fn temp_project(extra_toml: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    let paths = format!(
        r#"
[paths]
credentials_dir = "{0}/credentials"
node_socket = "{0}/node.socket"
protocol_parameters = "{0}/protocol-parameters.json"
cardano_config = "{0}/config.json"
cardano_topology = "{0}/topology.json"
db_dir = "{0}/db"
persistence_base = "{0}"
log_dir = "{0}/logs"
work_dir = "{0}/work"

{1}
"#,
        dir.path().display(),
        extra_toml
    );
    fs::write(dir.path().join("hydractl.toml"), paths).unwrap();
    dir
}

mod cli_basics {
    use super::*;

    #[test]
    fn test_help() {
        hydractl().arg("--help").assert().success();
    }

    #[test]
    fn test_version() {
        hydractl().arg("--version").assert().success();
    }

    #[test]
    fn test_unknown_node_is_rejected() {
        let dir = temp_project("");
        hydractl()
            .args(["--config-dir"])
            .arg(dir.path())
            .args(["node", "start", "carol"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unknown node 'carol'"));
    }

    #[test]
    fn test_invalid_config_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("hydractl.toml"), "network = 42").unwrap();
        hydractl()
            .args(["--config-dir"])
            .arg(dir.path())
            .args(["node", "status"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to parse"));
    }
}

mod node_lifecycle {
    use super::*;

    #[test]
    fn test_status_reports_all_nodes_stopped() {
        let dir = temp_project("");
        hydractl()
            .args(["--config-dir"])
            .arg(dir.path())
            .args(["node", "status"])
            .assert()
            .success()
            .stdout(
                predicate::str::contains("cardano-node")
                    .and(predicate::str::contains("alice-node"))
                    .and(predicate::str::contains("bob-node"))
                    .and(predicate::str::contains("stopped")),
            );
    }

    #[test]
    fn test_head_node_start_requires_scripts_tx_id() {
        // No [network].hydra_scripts_tx_id configured: starting a head node
        // must fail fast instead of guessing a network constant.
        let dir = temp_project("");
        hydractl()
            .args(["--config-dir"])
            .arg(dir.path())
            .args(["node", "start", "alice"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("hydra_scripts_tx_id"));
    }

    #[test]
    fn test_stop_is_idempotent_for_a_node_that_never_ran() {
        let dir = temp_project("");
        hydractl()
            .args(["--config-dir"])
            .arg(dir.path())
            .args(["node", "stop", "bob"])
            .assert()
            .success()
            .stdout(predicate::str::contains("stopped"));
    }

    #[test]
    fn test_clear_data_requires_confirmation() {
        let dir = temp_project("");
        hydractl()
            .args(["--config-dir"])
            .arg(dir.path())
            .args(["node", "clear-data"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("--yes"));
    }

    #[test]
    fn test_clear_data_recreates_persistence_dirs() {
        let dir = temp_project("");
        let alice = dir.path().join("persistence-alice");
        fs::create_dir_all(alice.join("state")).unwrap();

        hydractl()
            .args(["--config-dir"])
            .arg(dir.path())
            .args(["node", "clear-data", "--yes"])
            .arg("--path")
            .arg(&alice)
            .arg("--path")
            .arg(dir.path().join("persistence-bob"))
            .assert()
            .success();

        // Wiped and recreated empty.
        assert!(alice.is_dir());
        assert!(!alice.join("state").exists());
        assert!(dir.path().join("persistence-bob").is_dir());
    }
}

mod funds {
    use super::*;

    #[test]
    fn test_query_without_credentials_is_empty_not_an_error() {
        let dir = temp_project("");
        hydractl()
            .args(["--config-dir"])
            .arg(dir.path())
            .args(["funds", "query", "alice"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No UTxOs on chain for alice"));
    }

    #[test]
    fn test_keys_check_lists_missing_credentials() {
        let dir = temp_project("");
        hydractl()
            .args(["--config-dir"])
            .arg(dir.path())
            .args(["keys", "check"])
            .assert()
            .success()
            .stdout(
                predicate::str::contains("alice-funds.sk").and(predicate::str::contains("bob-hydra.sk")),
            );
    }
}

mod head {
    use super::*;

    #[test]
    fn test_head_command_against_stopped_node_reports_unreachable() {
        // Port 1 on loopback refuses connections; the session keeps retrying
        // until the connect timeout trips.
        let dir = temp_project("[nodes.alice]\napi_port = 1\nlisten_port = 5001\n");
        hydractl()
            .args(["--config-dir"])
            .arg(dir.path())
            .args(["head", "alice", "init"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("could not reach"));
    }
}
