//! Credential management — `hydractl keys …`.

use anyhow::Result;
use console::style;
use std::sync::Arc;

use hydractl::config::{Config, Participant};
use hydractl::exec::ShellExecutor;
use hydractl::funds::FundsOrchestrator;

pub async fn cmd_keys_generate(config: &Config, participant: &str) -> Result<()> {
    let participant: Participant = participant.parse()?;
    let funds = FundsOrchestrator::new(config.clone(), Arc::new(ShellExecutor));

    println!("Generating credentials for {}...", style(participant.as_str()).bold());
    let address = funds.cardano().generate_keys(participant).await?;
    println!(
        "{} keys written to {}",
        style("✓").green().bold(),
        config.credentials_dir().display()
    );
    println!("  funds address: {address}");
    Ok(())
}

pub async fn cmd_keys_check(config: &Config) -> Result<()> {
    let funds = FundsOrchestrator::new(config.clone(), Arc::new(ShellExecutor));

    for participant in [Participant::Alice, Participant::Bob] {
        println!("{}:", style(participant.as_str()).bold());
        for (name, exists) in funds.cardano().check_keys(participant).await? {
            let mark = if exists {
                style("✓").green().to_string()
            } else {
                style("✗").red().to_string()
            };
            println!("  {mark} {name}");
        }
    }
    Ok(())
}
