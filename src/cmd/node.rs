//! Node process management — `hydractl node …`.

use anyhow::Result;
use console::style;
use std::sync::Arc;

use hydractl::config::Config;
use hydractl::exec::ShellExecutor;
use hydractl::supervisor::{NodeId, NodeStatus, NodeSupervisor};

fn supervisor(config: &Config) -> NodeSupervisor {
    NodeSupervisor::new(config.clone(), Arc::new(ShellExecutor))
}

pub async fn cmd_start(config: &Config, node: &str) -> Result<()> {
    let node: NodeId = node.parse()?;
    println!("Starting {}...", style(node.as_str()).bold());

    let outcome = supervisor(config).start(node).await?;
    print!(
        "{} {} is running (pid {})",
        style("✓").green().bold(),
        node,
        outcome.pid
    );
    if let Some(port) = outcome.api_port {
        print!(", API port {port}");
    }
    println!();
    Ok(())
}

pub async fn cmd_stop(config: &Config, node: &str) -> Result<()> {
    let node: NodeId = node.parse()?;
    supervisor(config).stop(node).await;
    println!("{} {} stopped", style("✓").green().bold(), node);
    Ok(())
}

pub async fn cmd_status(config: &Config, node: Option<&str>) -> Result<()> {
    let supervisor = supervisor(config);
    match node {
        Some(node) => {
            let node: NodeId = node.parse()?;
            print_status(node, &supervisor.status(node).await?);
        }
        None => {
            for (node, status) in supervisor.status_all().await? {
                print_status(node, &status);
            }
        }
    }
    Ok(())
}

fn print_status(node: NodeId, status: &NodeStatus) {
    let state = if status.running {
        style("running").green().to_string()
    } else {
        style("stopped").dim().to_string()
    };
    let mut details = Vec::new();
    if let Some(pid) = status.pid {
        details.push(format!("pid {pid}"));
    }
    if let Some(port) = status.api_port {
        details.push(format!("api {port}"));
    }
    if let Some(started) = status.start_time {
        details.push(format!("since {}", started.format("%H:%M:%S")));
    }
    let suffix = if details.is_empty() {
        String::new()
    } else {
        format!("  ({})", details.join(", "))
    };
    println!("{:<14} {}{}", node.as_str(), state, suffix);
}

pub async fn cmd_logs(config: &Config, node: &str, lines: u32) -> Result<()> {
    let node: NodeId = node.parse()?;
    print!("{}", supervisor(config).log_tail(node, lines).await);
    Ok(())
}

pub async fn cmd_clear_data(config: &Config, paths: Vec<String>, yes: bool) -> Result<()> {
    if !yes {
        anyhow::bail!(
            "clear-data removes all head persistence data and cannot be undone; re-run with --yes"
        );
    }
    let paths = if paths.is_empty() { None } else { Some(paths) };
    supervisor(config).clear_data(paths).await?;
    println!("{} persistence data cleared", style("✓").green().bold());
    Ok(())
}
