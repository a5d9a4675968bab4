//! Typed error hierarchy for the hydractl core.
//!
//! One enum per subsystem:
//! - `ExecError` — command executor failures
//! - `SupervisorError` — node start/stop/status failures
//! - `ConnectionError` — head protocol connection failures
//! - `FundsError` — commit and in-head transfer workflow failures

use thiserror::Error;

/// Errors from the command executor itself (not from the commands it runs —
/// a non-zero exit code is reported in `CommandOutput`, not here).
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("Failed to spawn command `{command}`: {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read command output: {0}")]
    OutputCapture(#[source] std::io::Error),
}

/// Errors from the process supervisor subsystem.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("Invalid configuration for {node}: {source}")]
    InvalidConfig {
        node: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("{node} is already running")]
    AlreadyRunning { node: String },

    #[error("{node} failed to start; last log lines:\n{log_excerpt}")]
    StartFailed { node: String, log_excerpt: String },

    #[error("{node} is not running")]
    NotRunning { node: String },

    #[error("Stale lock cleanup for {node} failed: {detail}")]
    LockCleanupFailed { node: String, detail: String },

    #[error("Clearing persistence data failed: {detail}")]
    ClearDataFailed { detail: String },

    #[error(transparent)]
    Exec(#[from] ExecError),
}

/// Errors from a head protocol connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("WebSocket is not connected")]
    NotConnected,

    #[error("WebSocket transport error: {0}")]
    Transport(String),
}

/// Errors from the funds orchestration workflows.
#[derive(Debug, Error)]
pub enum FundsError {
    #[error("No funds available to commit for {participant}")]
    NoFundsAvailable { participant: String },

    #[error(
        "Insufficient funds: requested {requested} lovelace but the largest single UTxO holds {largest}"
    )]
    InsufficientFunds { requested: u64, largest: u64 },

    #[error("Commit endpoint rejected the request: {reason}")]
    CommitRejected { reason: String },

    #[error("Malformed node response: {raw}")]
    MalformedResponse { raw: String },

    #[error("Ledger CLI `{step}` failed (exit {exit_code}): {stderr}")]
    CardanoCli {
        step: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("HTTP request to head node failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
