use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use hydractl::config::Config;
use hydractl::logging;

mod cmd;

#[derive(Parser)]
#[command(name = "hydractl")]
#[command(version, about = "Control plane for a two-party Hydra head demo")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Directory containing hydractl.toml (defaults to the current directory)
    #[arg(long, global = true)]
    pub config_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage the node processes
    Node {
        #[command(subcommand)]
        command: NodeCommands,
    },
    /// Generate and inspect participant credentials
    Keys {
        #[command(subcommand)]
        command: KeysCommands,
    },
    /// Query and move funds
    Funds {
        #[command(subcommand)]
        command: FundsCommands,
    },
    /// Drive the head protocol for a participant
    Head {
        /// alice or bob
        participant: String,

        #[command(subcommand)]
        command: HeadCommands,
    },
}

#[derive(Subcommand)]
pub enum NodeCommands {
    /// Start a node (alice, bob, or cardano)
    Start { node: String },
    /// Stop a node, escalating to force-kill if needed
    Stop { node: String },
    /// Show node status (all nodes when none is given)
    Status { node: Option<String> },
    /// Print the tail of a node's log file
    Logs {
        node: String,
        #[arg(long, default_value = "40")]
        lines: u32,
    },
    /// Remove head persistence data and recreate the working directories
    ClearData {
        /// Extra paths/globs to remove instead of the default set
        #[arg(long = "path")]
        paths: Vec<String>,
        /// Confirm the removal
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum KeysCommands {
    /// Generate node, funds, and hydra key pairs plus the funds address
    Generate { participant: String },
    /// Show which credential files already exist
    Check,
}

#[derive(Subcommand)]
pub enum FundsCommands {
    /// List UTxOs at the participant's funds address
    Query {
        participant: String,
        /// Query the head's UTxO snapshot instead of the chain
        #[arg(long)]
        in_head: bool,
    },
    /// Lock on-chain funds into the head during the Initializing phase
    Commit {
        participant: String,
        /// Commit only these UTxOs (repeatable, "<txhash>#<index>"); default is all
        #[arg(long = "utxo")]
        utxos: Vec<String>,
    },
    /// Pay another address inside the open head
    Send {
        participant: String,
        /// Recipient address
        #[arg(long)]
        to: String,
        /// Amount in lovelace
        #[arg(long)]
        amount: u64,
    },
}

#[derive(Subcommand)]
pub enum HeadCommands {
    /// Request head initialization
    Init,
    /// Abort an initializing head
    Abort,
    /// Close the open head
    Close,
    /// Contest the closing snapshot
    Contest {
        #[arg(long)]
        snapshot_number: u64,
    },
    /// Distribute funds back on-chain after the contestation deadline
    Fanout,
    /// Recover a pending deposit
    Recover {
        #[arg(long)]
        tx_id: Option<String>,
    },
    /// Remove a UTxO from the open head without closing it
    Decommit {
        /// Decommit transaction JSON
        utxo: String,
    },
    /// Stream notifications from the node
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config_dir = match cli.config_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };
    let config = Config::load_or_default(&config_dir)?;

    match &cli.command {
        Commands::Node { command } => match command {
            NodeCommands::Start { node } => cmd::cmd_start(&config, node).await,
            NodeCommands::Stop { node } => cmd::cmd_stop(&config, node).await,
            NodeCommands::Status { node } => cmd::cmd_status(&config, node.as_deref()).await,
            NodeCommands::Logs { node, lines } => cmd::cmd_logs(&config, node, *lines).await,
            NodeCommands::ClearData { paths, yes } => {
                cmd::cmd_clear_data(&config, paths.clone(), *yes).await
            }
        },
        Commands::Keys { command } => match command {
            KeysCommands::Generate { participant } => {
                cmd::cmd_keys_generate(&config, participant).await
            }
            KeysCommands::Check => cmd::cmd_keys_check(&config).await,
        },
        Commands::Funds { command } => match command {
            FundsCommands::Query {
                participant,
                in_head,
            } => cmd::cmd_query(&config, participant, *in_head).await,
            FundsCommands::Commit { participant, utxos } => {
                cmd::cmd_commit(&config, participant, utxos.clone()).await
            }
            FundsCommands::Send {
                participant,
                to,
                amount,
            } => cmd::cmd_send(&config, participant, to, *amount).await,
        },
        Commands::Head {
            participant,
            command,
        } => cmd::cmd_head(&config, participant, command).await,
    }
}
