//! Thin wrappers over the ledger CLI surface.
//!
//! Nothing here understands transactions; each method shells out to
//! `cardano-cli` (or `hydra-node` for hydra keys) through the Executor and
//! maps a non-zero exit to a typed error carrying the step name and stderr.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::config::{Config, Participant};
use crate::errors::FundsError;
use crate::exec::{Executor, shell_quote};

use super::excerpt;
use super::utxo::UtxoSet;

pub struct CardanoCli {
    config: Config,
    executor: Arc<dyn Executor>,
}

impl CardanoCli {
    pub fn new(config: Config, executor: Arc<dyn Executor>) -> Self {
        Self { config, executor }
    }

    fn cli(&self) -> &str {
        &self.config.binaries.cardano_cli
    }

    fn creds(&self, name: &str) -> PathBuf {
        self.config.credentials_dir().join(name)
    }

    pub fn funds_address_file(&self, participant: Participant) -> PathBuf {
        self.creds(&format!("{participant}-funds.addr"))
    }

    pub fn funds_signing_key(&self, participant: Participant) -> PathBuf {
        self.creds(&format!("{participant}-funds.sk"))
    }

    async fn run_step(&self, step: &str, command: &str) -> Result<String, FundsError> {
        let output = self.executor.run(command).await?;
        if !output.success() {
            return Err(FundsError::CardanoCli {
                step: step.to_string(),
                exit_code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output.stdout)
    }

    /// The participant's funds address, or `None` when the address file has
    /// not been generated yet.
    pub async fn read_address(&self, participant: Participant) -> Result<Option<String>, FundsError> {
        let file = self.funds_address_file(participant);
        let output = self
            .executor
            .run(&format!("cat {}", shell_quote(&file.to_string_lossy())))
            .await?;
        if !output.success() {
            return Ok(None);
        }
        let address = output.trimmed().to_string();
        Ok(if address.is_empty() { None } else { Some(address) })
    }

    /// On-chain UTxOs held by `address`, as a JSON map from the CLI.
    pub async fn query_utxo(&self, address: &str) -> Result<UtxoSet, FundsError> {
        let command = format!(
            "{} query utxo --address {} --testnet-magic {} --out-file /dev/stdout",
            self.cli(),
            shell_quote(address),
            self.config.network.testnet_magic,
        );
        let stdout = self.run_step("query utxo", &command).await?;
        serde_json::from_str(&stdout).map_err(|_| FundsError::MalformedResponse {
            raw: excerpt(&stdout),
        })
    }

    /// Build a zero-fee raw transaction body.
    pub async fn build_raw(
        &self,
        tx_in: &str,
        outputs: &[(String, u64)],
        out_file: &PathBuf,
    ) -> Result<(), FundsError> {
        let mut command = format!(
            "{} transaction build-raw --tx-in {}",
            self.cli(),
            shell_quote(tx_in)
        );
        for (address, lovelace) in outputs {
            command.push_str(&format!(" --tx-out {}", shell_quote(&format!("{address}+{lovelace}"))));
        }
        command.push_str(&format!(
            " --fee 0 --out-file {}",
            shell_quote(&out_file.to_string_lossy())
        ));
        self.run_step("transaction build-raw", &command).await?;
        Ok(())
    }

    pub async fn sign(
        &self,
        body_file: &PathBuf,
        signing_key: &PathBuf,
        out_file: &PathBuf,
    ) -> Result<(), FundsError> {
        let command = format!(
            "{} transaction sign --tx-body-file {} --signing-key-file {} --testnet-magic {} --out-file {}",
            self.cli(),
            shell_quote(&body_file.to_string_lossy()),
            shell_quote(&signing_key.to_string_lossy()),
            self.config.network.testnet_magic,
            shell_quote(&out_file.to_string_lossy()),
        );
        self.run_step("transaction sign", &command).await?;
        Ok(())
    }

    pub async fn submit(&self, signed_file: &PathBuf) -> Result<(), FundsError> {
        let command = format!(
            "{} transaction submit --tx-file {} --socket-path {} --testnet-magic {}",
            self.cli(),
            shell_quote(&signed_file.to_string_lossy()),
            shell_quote(&self.config.node_socket().to_string_lossy()),
            self.config.network.testnet_magic,
        );
        self.run_step("transaction submit", &command).await?;
        Ok(())
    }

    pub async fn txid(&self, tx_file: &PathBuf) -> Result<String, FundsError> {
        let command = format!(
            "{} transaction txid --tx-file {}",
            self.cli(),
            shell_quote(&tx_file.to_string_lossy()),
        );
        let stdout = self.run_step("transaction txid", &command).await?;
        Ok(stdout.trim().to_string())
    }

    /// Read a signed transaction file back as JSON (for `NewTx` submission
    /// into the head).
    pub async fn read_tx(&self, tx_file: &PathBuf) -> Result<serde_json::Value, FundsError> {
        let stdout = self
            .run_step(
                "read transaction",
                &format!("cat {}", shell_quote(&tx_file.to_string_lossy())),
            )
            .await?;
        serde_json::from_str(&stdout).map_err(|_| FundsError::MalformedResponse {
            raw: excerpt(&stdout),
        })
    }

    /// Generate the participant's credentials: cardano node key pair, funds
    /// key pair, hydra key pair, and the derived funds address. Skips nothing;
    /// existing files are overwritten, matching the CLI tools' behaviour.
    pub async fn generate_keys(&self, participant: Participant) -> Result<String, FundsError> {
        let creds = self.config.credentials_dir();
        let dir = shell_quote(&creds.to_string_lossy());
        self.run_step("create credentials dir", &format!("mkdir -p {dir}"))
            .await?;

        for role in ["node", "funds"] {
            let vk = self.creds(&format!("{participant}-{role}.vk"));
            let sk = self.creds(&format!("{participant}-{role}.sk"));
            let command = format!(
                "{} address key-gen --verification-key-file {} --signing-key-file {}",
                self.cli(),
                shell_quote(&vk.to_string_lossy()),
                shell_quote(&sk.to_string_lossy()),
            );
            self.run_step("address key-gen", &command).await?;
        }

        let hydra_prefix = self.creds(&format!("{participant}-hydra"));
        let command = format!(
            "{} gen-hydra-key --output-file {}",
            self.config.binaries.hydra_node,
            shell_quote(&hydra_prefix.to_string_lossy()),
        );
        self.run_step("gen-hydra-key", &command).await?;

        let funds_vk = self.creds(&format!("{participant}-funds.vk"));
        let addr_file = self.funds_address_file(participant);
        let command = format!(
            "{} address build --payment-verification-key-file {} --testnet-magic {} > {}",
            self.cli(),
            shell_quote(&funds_vk.to_string_lossy()),
            self.config.network.testnet_magic,
            shell_quote(&addr_file.to_string_lossy()),
        );
        self.run_step("address build", &command).await?;

        let address = self
            .read_address(participant)
            .await?
            .ok_or_else(|| FundsError::MalformedResponse {
                raw: "address build produced an empty address file".to_string(),
            })?;
        info!(participant = %participant, address = %address, "generated credentials");
        Ok(address)
    }

    /// Which of the participant's credential files already exist.
    pub async fn check_keys(&self, participant: Participant) -> Result<Vec<(String, bool)>, FundsError> {
        let names = [
            format!("{participant}-node.sk"),
            format!("{participant}-funds.sk"),
            format!("{participant}-hydra.sk"),
            format!("{participant}-funds.addr"),
        ];
        let mut out = Vec::with_capacity(names.len());
        for name in names {
            let file = self.creds(&name);
            let exists = self
                .executor
                .run(&format!("test -f {}", shell_quote(&file.to_string_lossy())))
                .await?
                .success();
            out.push((name, exists));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::mock::MockExecutor;

    fn cli(mock: &Arc<MockExecutor>) -> CardanoCli {
        CardanoCli::new(Config::default(), Arc::clone(mock) as Arc<dyn Executor>)
    }

    #[tokio::test]
    async fn test_read_address_missing_file_is_none() {
        let mock = Arc::new(MockExecutor::new());
        let address = cli(&mock).read_address(Participant::Alice).await.unwrap();
        assert!(address.is_none());
    }

    #[tokio::test]
    async fn test_query_utxo_parses_cli_json() {
        let mock = Arc::new(MockExecutor::new().on(
            "query utxo",
            r#"{"aa#0": {"address": "addr_test1x", "value": {"lovelace": 42}}}"#,
        ));
        let set = cli(&mock).query_utxo("addr_test1x").await.unwrap();
        assert_eq!(set["aa#0"].value.lovelace, 42);
    }

    #[tokio::test]
    async fn test_query_utxo_failure_carries_step_and_stderr() {
        let mock = Arc::new(MockExecutor::new().on_with(
            "query utxo",
            "",
            "MissingNodeSocket",
            1,
        ));
        let err = cli(&mock).query_utxo("addr_test1x").await.unwrap_err();
        match err {
            FundsError::CardanoCli { step, stderr, .. } => {
                assert_eq!(step, "query utxo");
                assert!(stderr.contains("MissingNodeSocket"));
            }
            other => panic!("expected CardanoCli, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_build_raw_zero_fee_with_change_output() {
        let mock = Arc::new(MockExecutor::new().on("build-raw", ""));
        cli(&mock)
            .build_raw(
                "aa#0",
                &[("addr_to".to_string(), 5), ("addr_change".to_string(), 7)],
                &PathBuf::from("/tmp/tx.json"),
            )
            .await
            .unwrap();
        let call = mock.calls().pop().unwrap();
        assert!(call.contains("--tx-in 'aa#0'"));
        assert!(call.contains("'addr_to+5'"));
        assert!(call.contains("'addr_change+7'"));
        assert!(call.contains("--fee 0"));
    }

    #[tokio::test]
    async fn test_generate_keys_runs_full_sequence() {
        let mock = Arc::new(
            MockExecutor::new()
                .on("mkdir -p", "")
                .on("address key-gen", "")
                .on("gen-hydra-key", "")
                .on("address build", "")
                .on("cat", "addr_test1generated"),
        );
        let address = cli(&mock).generate_keys(Participant::Bob).await.unwrap();
        assert_eq!(address, "addr_test1generated");
        assert!(mock.saw("bob-node.vk"));
        assert!(mock.saw("bob-funds.sk"));
        assert!(mock.saw("bob-hydra"));
    }
}
