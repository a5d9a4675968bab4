//! Fund queries and movement — `hydractl funds …`.

use anyhow::Result;
use console::style;
use std::sync::Arc;

use hydractl::config::{Config, Participant};
use hydractl::exec::ShellExecutor;
use hydractl::funds::{FundsOrchestrator, UtxoSet, utxo};
use hydractl::protocol::HeadState;

use super::head::open_connection;

fn orchestrator(config: &Config) -> FundsOrchestrator {
    FundsOrchestrator::new(config.clone(), Arc::new(ShellExecutor))
}

pub async fn cmd_query(config: &Config, participant: &str, in_head: bool) -> Result<()> {
    let participant: Participant = participant.parse()?;
    let funds = orchestrator(config);

    let set = if in_head {
        funds.query_head_funds(participant).await?
    } else {
        funds.query_funds(participant).await?
    };

    let location = if in_head { "in head" } else { "on chain" };
    if set.is_empty() {
        println!("No UTxOs {location} for {participant}");
        return Ok(());
    }

    print_utxos(&set);
    println!(
        "{} UTxO(s) {location}, {} lovelace total",
        set.len(),
        style(utxo::total_lovelace(&set)).bold()
    );
    Ok(())
}

fn print_utxos(set: &UtxoSet) {
    for (key, entry) in set {
        let assets = match &entry.value.assets {
            Some(_) => "  (+assets)",
            None => "",
        };
        println!(
            "{:<68} {:>14} lovelace{assets}",
            style(key).dim(),
            entry.value.lovelace
        );
    }
}

pub async fn cmd_commit(config: &Config, participant: &str, keys: Vec<String>) -> Result<()> {
    let participant: Participant = participant.parse()?;
    let funds = orchestrator(config);

    // An explicit selection is resolved against a fresh query so the commit
    // payload carries full entries, not just keys.
    let selection = if keys.is_empty() {
        UtxoSet::new()
    } else {
        let all = funds.query_funds(participant).await?;
        let mut selection = UtxoSet::new();
        for key in keys {
            let entry = all
                .get(&key)
                .ok_or_else(|| anyhow::anyhow!("UTxO {key} not found at {participant}'s address"))?;
            selection.insert(key, entry.clone());
        }
        selection
    };

    println!("Committing funds for {}...", style(participant.as_str()).bold());
    let txid = funds.commit(participant, selection).await?;
    println!("{} commit transaction submitted: {txid}", style("✓").green().bold());
    Ok(())
}

pub async fn cmd_send(
    config: &Config,
    participant: &str,
    to: &str,
    amount: u64,
) -> Result<()> {
    let participant: Participant = participant.parse()?;
    let funds = orchestrator(config);

    let conn = open_connection(config, participant).await?;
    let state = conn.head_state();
    if state != HeadState::Open {
        anyhow::bail!("cannot send inside the head while its state is {state}");
    }

    println!(
        "Sending {} lovelace from {} to {}...",
        style(amount).bold(),
        participant,
        to
    );
    let txid = funds.send_within_head(participant, to, amount, &conn).await?;
    println!("{} submitted in head: {txid}", style("✓").green().bold());
    Ok(())
}
