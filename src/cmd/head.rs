//! Head protocol driving — `hydractl head <participant> …`.

use std::time::Duration;

use anyhow::{Context, Result};
use console::style;
use serde_json::json;
use tokio::time::timeout;

use hydractl::config::{Config, Participant};
use hydractl::protocol::{ClientInput, HeadConnection, HeadState, ServerOutput};

use crate::HeadCommands;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const GREETING_TIMEOUT: Duration = Duration::from_secs(2);
const OUTCOME_TIMEOUT: Duration = Duration::from_secs(20);

/// Connect to the participant's head node and wait for the Greetings message
/// to seed the head state. Used by every command that talks to the node.
pub(crate) async fn open_connection(
    config: &Config,
    participant: Participant,
) -> Result<HeadConnection> {
    let url = config.ws_url(participant);
    let conn = HeadConnection::new(url.clone());
    conn.connect();

    let mut connected = conn.subscribe_connected();
    timeout(CONNECT_TIMEOUT, async {
        while !*connected.borrow_and_update() {
            if connected.changed().await.is_err() {
                break;
            }
        }
    })
    .await
    .ok()
    .with_context(|| format!("could not reach {url}; is the {participant} node running?"))?;

    // The node's Greetings frame arrives right after the handshake; without
    // it the state stays Unknown and gating is meaningless.
    let mut state = conn.subscribe_head_state();
    let _ = timeout(GREETING_TIMEOUT, async {
        while *state.borrow_and_update() == HeadState::Unknown {
            if state.changed().await.is_err() {
                break;
            }
        }
    })
    .await;

    Ok(conn)
}

pub async fn cmd_head(config: &Config, participant: &str, command: &HeadCommands) -> Result<()> {
    let participant: Participant = participant.parse()?;

    if let HeadCommands::Watch = command {
        return watch(config, participant).await;
    }

    let (input, expected): (ClientInput, &[&str]) = match command {
        HeadCommands::Init => (ClientInput::Init, &["HeadIsInitializing"]),
        HeadCommands::Abort => (ClientInput::Abort, &["HeadIsAborted"]),
        HeadCommands::Close => (ClientInput::Close, &["HeadIsClosed"]),
        HeadCommands::Contest { snapshot_number } => (
            ClientInput::Contest {
                snapshot_number: *snapshot_number,
            },
            &["HeadIsClosed"],
        ),
        HeadCommands::Fanout => (ClientInput::Fanout, &["HeadIsFinalized"]),
        HeadCommands::Recover { tx_id } => (
            ClientInput::Recover {
                recover_tx_id: tx_id.clone(),
            },
            &[],
        ),
        HeadCommands::Decommit { utxo } => {
            let decommit_tx = serde_json::from_str(utxo)
                .unwrap_or_else(|_| json!({ "utxo": utxo }));
            (ClientInput::Decommit { decommit_tx }, &["DecommitFinalized"])
        }
        HeadCommands::Watch => unreachable!("handled above"),
    };

    let conn = open_connection(config, participant).await?;
    let state = conn.head_state();

    if !conn.permits(&input) {
        anyhow::bail!(
            "{} is not valid while the head state is {}",
            input.tag(),
            state
        );
    }

    let mut notifications = conn.subscribe_notifications();
    conn.send(&input)?;
    println!(
        "{} sent to {} (head state {})",
        style(input.tag()).bold(),
        participant,
        state
    );

    if expected.is_empty() {
        return Ok(());
    }

    // Lifecycle changes are confirmed asynchronously by the node; relay what
    // comes back until the expected notification (or a rejection) shows up.
    let outcome = timeout(OUTCOME_TIMEOUT, async {
        loop {
            match notifications.recv().await {
                Ok(output) => {
                    if expected.contains(&output.tag()) {
                        return Ok(output);
                    }
                    match output {
                        ServerOutput::CommandFailed { client_input } => {
                            return Err(anyhow::anyhow!("command failed: {client_input}"));
                        }
                        ServerOutput::InvalidInput { reason, .. } => {
                            return Err(anyhow::anyhow!("invalid input: {reason}"));
                        }
                        other => println!("  … {}", style(other.tag()).dim()),
                    }
                }
                Err(_) => return Err(anyhow::anyhow!("connection lost while waiting")),
            }
        }
    })
    .await;

    match outcome {
        Ok(Ok(output)) => {
            println!("{} {}", style("✓").green().bold(), output.tag());
            Ok(())
        }
        Ok(Err(e)) => Err(e),
        Err(_) => {
            println!(
                "no confirmation within {}s; the node keeps processing asynchronously (try `head {} watch`)",
                OUTCOME_TIMEOUT.as_secs(),
                participant
            );
            Ok(())
        }
    }
}

/// Stream every notification until interrupted.
async fn watch(config: &Config, participant: Participant) -> Result<()> {
    let conn = open_connection(config, participant).await?;
    let mut notifications = conn.subscribe_notifications();
    let mut connected = conn.subscribe_connected();

    println!(
        "watching {} (head state {}); press Ctrl-C to stop",
        participant,
        conn.head_state()
    );

    loop {
        tokio::select! {
            notification = notifications.recv() => match notification {
                Ok(output) => {
                    let raw = serde_json::to_string(&output).unwrap_or_default();
                    println!("{:<20} {}", style(output.tag()).bold(), style(raw).dim());
                }
                Err(_) => continue,
            },
            _ = connected.changed() => {
                let up = *connected.borrow();
                println!(
                    "{}",
                    if up { style("-- reconnected --").green() } else { style("-- disconnected, retrying --").yellow() }
                );
            }
            _ = tokio::signal::ctrl_c() => {
                conn.disconnect();
                return Ok(());
            }
        }
    }
}
