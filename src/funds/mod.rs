//! Fund movement workflows.
//!
//! Each workflow is a fixed sequence of steps with validation gates between
//! them; steps delegate to the ledger CLI (through the Executor), to the head
//! node's one-shot HTTP endpoints, or to the protocol connection. A crash
//! mid-workflow leaves artifacts in the work directory that are safe to retry
//! against or remove by hand; nothing here resumes automatically.

pub mod cardano;
pub mod utxo;

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::{Config, Participant};
use crate::errors::FundsError;
use crate::exec::Executor;
use crate::protocol::{ClientInput, CommandSink};

pub use cardano::CardanoCli;
pub use utxo::{UtxoEntry, UtxoSet, UtxoValue};

pub struct FundsOrchestrator {
    config: Config,
    cardano: CardanoCli,
    http: reqwest::Client,
}

impl FundsOrchestrator {
    pub fn new(config: Config, executor: Arc<dyn Executor>) -> Self {
        let cardano = CardanoCli::new(config.clone(), executor);
        Self {
            config,
            cardano,
            http: reqwest::Client::new(),
        }
    }

    pub fn cardano(&self) -> &CardanoCli {
        &self.cardano
    }

    /// On-chain UTxOs at the participant's funds address. A missing address
    /// file means "nothing found", not a failure.
    pub async fn query_funds(&self, participant: Participant) -> Result<UtxoSet, FundsError> {
        let Some(address) = self.cardano.read_address(participant).await? else {
            debug!(participant = %participant, "no funds address file yet");
            return Ok(UtxoSet::new());
        };
        self.cardano.query_utxo(&address).await
    }

    /// Current UTxO snapshot inside the head, from the node's HTTP snapshot
    /// endpoint. An unreachable node means "nothing found"; a reachable node
    /// answering garbage is a failure.
    pub async fn query_head_funds(&self, participant: Participant) -> Result<UtxoSet, FundsError> {
        let url = format!("{}/snapshot/utxo", self.config.api_base_url(participant));
        let response = match self.http.get(&url).send().await {
            Ok(response) => response,
            Err(e) if e.is_connect() => {
                debug!(participant = %participant, "head node not reachable, empty snapshot");
                return Ok(UtxoSet::new());
            }
            Err(e) => return Err(FundsError::Http(e)),
        };

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(FundsError::MalformedResponse { raw: excerpt(&text) });
        }
        serde_json::from_str(&text).map_err(|_| FundsError::MalformedResponse { raw: excerpt(&text) })
    }

    /// Commit the selected UTxOs (or, with an empty selection, everything the
    /// participant owns) into the head: POST the draft to the node's commit
    /// endpoint, then sign and submit the returned transaction on-chain.
    pub async fn commit(
        &self,
        participant: Participant,
        selection: UtxoSet,
    ) -> Result<String, FundsError> {
        let utxos = if selection.is_empty() {
            self.query_funds(participant).await?
        } else {
            selection
        };
        if utxos.is_empty() {
            return Err(FundsError::NoFundsAvailable {
                participant: participant.to_string(),
            });
        }

        // Keep the exact payload next to the node's other artifacts; it is
        // the first thing to look at when a commit goes wrong.
        let payload = serde_json::to_string_pretty(&utxos)
            .map_err(|e| anyhow::anyhow!("serializing commit payload: {e}"))?;
        let payload_file = self.work_file(participant, "commit-utxo", "json")?;
        std::fs::write(&payload_file, &payload)
            .map_err(|e| anyhow::anyhow!("writing {}: {e}", payload_file.display()))?;

        let url = format!("{}/commit", self.config.api_base_url(participant));
        info!(participant = %participant, count = utxos.len(), url = %url, "requesting commit transaction");
        let response = self.http.post(&url).json(&utxos).send().await?;
        let text = response.text().await?;

        let draft = validate_commit_response(&text)?;

        let body_file = self.work_file(participant, "commit-tx", "json")?;
        let draft_raw =
            serde_json::to_string(&draft).map_err(|e| anyhow::anyhow!("serializing draft: {e}"))?;
        std::fs::write(&body_file, draft_raw)
            .map_err(|e| anyhow::anyhow!("writing {}: {e}", body_file.display()))?;

        let signed_file = self.work_file(participant, "commit-tx", "signed.json")?;
        self.cardano
            .sign(&body_file, &self.cardano.funds_signing_key(participant), &signed_file)
            .await?;
        self.cardano.submit(&signed_file).await?;
        let txid = self.cardano.txid(&signed_file).await?;
        info!(participant = %participant, txid = %txid, "commit transaction submitted");
        Ok(txid)
    }

    /// Move `amount` lovelace to `recipient` inside the open head. Selects a
    /// single covering input first-fit, builds a zero-fee payment + change
    /// transaction, signs it, and submits it as `NewTx` over the connection.
    pub async fn send_within_head(
        &self,
        participant: Participant,
        recipient: &str,
        amount: u64,
        sink: &dyn CommandSink,
    ) -> Result<String, FundsError> {
        let snapshot = self.query_head_funds(participant).await?;
        let own_address = self.cardano.read_address(participant).await?.unwrap_or_default();
        let mine = utxo::filter_by_address(&snapshot, &own_address);

        let Some((tx_in, entry)) = utxo::first_covering(&mine, amount) else {
            return Err(FundsError::InsufficientFunds {
                requested: amount,
                largest: utxo::largest_lovelace(&mine),
            });
        };
        let tx_in = tx_in.clone();
        let change = entry.value.lovelace - amount;
        debug!(%tx_in, amount, change, "selected head input");

        let mut outputs = vec![(recipient.to_string(), amount)];
        if change > 0 {
            outputs.push((own_address.clone(), change));
        }

        let body_file = self.work_file(participant, "head-tx", "json")?;
        let signed_file = self.work_file(participant, "head-tx", "signed.json")?;
        self.cardano.build_raw(&tx_in, &outputs, &body_file).await?;
        self.cardano
            .sign(&body_file, &self.cardano.funds_signing_key(participant), &signed_file)
            .await?;

        let transaction = self.cardano.read_tx(&signed_file).await?;
        let txid = self.cardano.txid(&signed_file).await?;
        sink.send_command(&ClientInput::NewTx { transaction })?;
        info!(participant = %participant, txid = %txid, amount, "transaction sent into head");
        Ok(txid)
    }

    fn work_file(
        &self,
        participant: Participant,
        stem: &str,
        ext: &str,
    ) -> Result<PathBuf, FundsError> {
        let dir = self.config.work_dir();
        std::fs::create_dir_all(&dir)
            .map_err(|e| anyhow::anyhow!("creating {}: {e}", dir.display()))?;
        Ok(dir.join(format!("{participant}-{stem}-{}.{ext}", Uuid::new_v4())))
    }
}

/// A commit response is either a signable transaction body or an error-shaped
/// object; anything else is treated as a rejection and surfaced verbatim,
/// never retried.
fn validate_commit_response(text: &str) -> Result<Value, FundsError> {
    let value: Value = serde_json::from_str(text).map_err(|_| FundsError::CommitRejected {
        reason: excerpt(text),
    })?;

    if let Some(error) = value.get("error").or_else(|| value.get("message")) {
        return Err(FundsError::CommitRejected {
            reason: error
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string()),
        });
    }
    if value.get("cborHex").and_then(Value::as_str).is_none() {
        return Err(FundsError::CommitRejected {
            reason: excerpt(text),
        });
    }
    Ok(value)
}

fn excerpt(raw: &str) -> String {
    const MAX: usize = 300;
    let trimmed = raw.trim();
    match trimmed.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}…", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ConnectionError;
    use crate::exec::mock::MockExecutor;
    use std::sync::Mutex;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Minimal loopback HTTP server answering every request with `body`.
    async fn spawn_http(body: &'static str) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else { return };
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 16 * 1024];
                    let mut read = 0;
                    // Read until the header/body boundary has gone past; small
                    // requests arrive in one or two reads.
                    loop {
                        match stream.read(&mut buf[read..]).await {
                            Ok(0) => break,
                            Ok(n) => {
                                read += n;
                                let text = String::from_utf8_lossy(&buf[..read]);
                                if let Some(header_end) = text.find("\r\n\r\n") {
                                    let content_length = text
                                        .lines()
                                        .find_map(|l| l.to_lowercase().strip_prefix("content-length:").map(str::trim).map(str::to_string))
                                        .and_then(|v| v.parse::<usize>().ok())
                                        .unwrap_or(0);
                                    if read >= header_end + 4 + content_length {
                                        break;
                                    }
                                }
                            }
                            Err(_) => break,
                        }
                    }
                    let response = format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        body.len(),
                        body
                    );
                    let _ = stream.write_all(response.as_bytes()).await;
                    let _ = stream.shutdown().await;
                });
            }
        });
        port
    }

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<ClientInput>>,
    }

    impl CommandSink for RecordingSink {
        fn send_command(&self, input: &ClientInput) -> Result<(), ConnectionError> {
            self.sent.lock().unwrap().push(input.clone());
            Ok(())
        }
    }

    fn config_for_port(port: u16) -> Config {
        let mut config = Config::default();
        config.nodes.alice.api_port = port;
        config.paths.work_dir = std::env::temp_dir()
            .join("hydractl-test-work")
            .to_string_lossy()
            .into_owned();
        config
    }

    fn orchestrator(port: u16, mock: &Arc<MockExecutor>) -> FundsOrchestrator {
        FundsOrchestrator::new(config_for_port(port), Arc::clone(mock) as Arc<dyn Executor>)
    }

    const SNAPSHOT: &str = r#"{
        "aa11#0": {"address": "addr_test1alice", "value": {"lovelace": 3000000}},
        "bb22#0": {"address": "addr_test1alice", "value": {"lovelace": 12000000}},
        "cc33#0": {"address": "addr_test1bob", "value": {"lovelace": 50000000}}
    }"#;

    #[tokio::test]
    async fn test_commit_with_no_funds_short_circuits() {
        // Empty caller selection and no address file: the workflow must fail
        // before ever touching the commit endpoint (port 1 would refuse and
        // surface a transport error instead of NoFundsAvailable).
        let mock = Arc::new(MockExecutor::new());
        let funds = orchestrator(1, &mock);

        let err = funds.commit(Participant::Alice, UtxoSet::new()).await.unwrap_err();
        assert!(matches!(err, FundsError::NoFundsAvailable { .. }));
        assert!(!mock.saw("transaction sign"));
    }

    #[tokio::test]
    async fn test_commit_rejected_response_is_surfaced_verbatim() {
        let port = spawn_http(r#"{"error": "SpendingNodeUtxoForbidden"}"#).await;
        let mock = Arc::new(
            MockExecutor::new()
                .on("funds.addr", "addr_test1alice")
                .on("query utxo", r#"{"aa11#0": {"address": "addr_test1alice", "value": {"lovelace": 5000000}}}"#),
        );
        let funds = orchestrator(port, &mock);

        let err = funds.commit(Participant::Alice, UtxoSet::new()).await.unwrap_err();
        match err {
            FundsError::CommitRejected { reason } => {
                assert!(reason.contains("SpendingNodeUtxoForbidden"));
            }
            other => panic!("expected CommitRejected, got {other:?}"),
        }
        // A rejected draft is never signed or submitted.
        assert!(!mock.saw("transaction sign"));
        assert!(!mock.saw("transaction submit"));
    }

    #[tokio::test]
    async fn test_commit_signs_and_submits_draft() {
        let port = spawn_http(r#"{"type": "Unwitnessed Tx ConwayEra", "cborHex": "84a300"}"#).await;
        let mock = Arc::new(
            MockExecutor::new()
                .on("funds.addr", "addr_test1alice")
                .on("query utxo", r#"{"aa11#0": {"address": "addr_test1alice", "value": {"lovelace": 5000000}}}"#)
                .on("transaction sign", "")
                .on("transaction submit", "")
                .on("transaction txid", "committx42\n"),
        );
        let funds = orchestrator(port, &mock);

        let txid = funds.commit(Participant::Alice, UtxoSet::new()).await.unwrap();
        assert_eq!(txid, "committx42");
        assert!(mock.saw("alice-funds.sk"));
        assert!(mock.saw("transaction submit"));
    }

    #[tokio::test]
    async fn test_send_within_head_insufficient_funds_issues_nothing() {
        let port = spawn_http(SNAPSHOT).await;
        let mock = Arc::new(MockExecutor::new().on("funds.addr", "addr_test1alice"));
        let funds = orchestrator(port, &mock);
        let sink = RecordingSink::default();

        // Largest alice UTxO is 12 ada; ask for 20.
        let err = funds
            .send_within_head(Participant::Alice, "addr_test1bob", 20_000_000, &sink)
            .await
            .unwrap_err();
        match err {
            FundsError::InsufficientFunds { requested, largest } => {
                assert_eq!(requested, 20_000_000);
                assert_eq!(largest, 12_000_000);
            }
            other => panic!("expected InsufficientFunds, got {other:?}"),
        }
        assert!(!mock.saw("build-raw"));
        assert!(sink.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_send_within_head_builds_payment_and_change() {
        let port = spawn_http(SNAPSHOT).await;
        let mock = Arc::new(
            MockExecutor::new()
                .on("funds.addr", "addr_test1alice")
                .on("build-raw", "")
                .on("transaction sign", "")
                .on("transaction txid", "headtx7")
                .on("cat ", r#"{"type": "Witnessed Tx ConwayEra", "cborHex": "84ff"}"#),
        );
        let funds = orchestrator(port, &mock);
        let sink = RecordingSink::default();

        let txid = funds
            .send_within_head(Participant::Alice, "addr_test1bob", 5_000_000, &sink)
            .await
            .unwrap();
        assert_eq!(txid, "headtx7");

        // First-fit skips the 3 ada entry and spends bb22#0 (12 ada).
        let build = mock
            .calls()
            .into_iter()
            .find(|c| c.contains("build-raw"))
            .unwrap();
        assert!(build.contains("bb22#0"));
        assert!(build.contains("addr_test1bob+5000000"));
        assert!(build.contains("addr_test1alice+7000000"));

        let sent = sink.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        match &sent[0] {
            ClientInput::NewTx { transaction } => {
                assert_eq!(transaction["cborHex"], "84ff");
            }
            other => panic!("expected NewTx, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_query_head_funds_unreachable_node_is_empty() {
        let mock = Arc::new(MockExecutor::new());
        let funds = orchestrator(1, &mock);
        let set = funds.query_head_funds(Participant::Alice).await.unwrap();
        assert!(set.is_empty());
    }

    #[tokio::test]
    async fn test_query_head_funds_garbage_is_malformed() {
        let port = spawn_http("<html>not json</html>").await;
        let mock = Arc::new(MockExecutor::new());
        let funds = orchestrator(port, &mock);
        let err = funds.query_head_funds(Participant::Alice).await.unwrap_err();
        assert!(matches!(err, FundsError::MalformedResponse { .. }));
    }

    #[test]
    fn test_validate_commit_response_shapes() {
        assert!(validate_commit_response(r#"{"cborHex": "84aa", "type": "Tx"}"#).is_ok());
        assert!(matches!(
            validate_commit_response(r#"{"message": "head is not initializing"}"#),
            Err(FundsError::CommitRejected { .. })
        ));
        assert!(matches!(
            validate_commit_response("total garbage"),
            Err(FundsError::CommitRejected { .. })
        ));
        assert!(matches!(
            validate_commit_response(r#"{"unexpected": true}"#),
            Err(FundsError::CommitRejected { .. })
        ));
    }
}
