//! Wire types for the head node's WebSocket API.
//!
//! Frames are UTF-8 JSON with a `tag` discriminator; field names follow the
//! node's schema exactly (`headId`, `snapshotNumber`, `contestationDeadline`,
//! `validationError`, `clientInput`, …). Payloads the workflows never inspect
//! (UTxO maps, snapshots, parties) stay as raw `serde_json::Value`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Notification received from a head node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tag")]
pub enum ServerOutput {
    Greetings {
        #[serde(rename = "headStatus", default, skip_serializing_if = "Option::is_none")]
        head_status: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        me: Option<Value>,
    },
    PeerConnected {
        peer: String,
    },
    PeerDisconnected {
        peer: String,
    },
    HeadIsInitializing {
        #[serde(rename = "headId")]
        head_id: String,
        #[serde(default)]
        parties: Vec<Value>,
    },
    Committed {
        #[serde(default)]
        party: Value,
        #[serde(default)]
        utxo: Value,
    },
    HeadIsOpen {
        #[serde(rename = "headId", default, skip_serializing_if = "Option::is_none")]
        head_id: Option<String>,
        #[serde(default)]
        utxo: Value,
    },
    HeadIsClosed {
        #[serde(rename = "snapshotNumber")]
        snapshot_number: u64,
        #[serde(rename = "contestationDeadline")]
        contestation_deadline: String,
    },
    ReadyToFanout,
    HeadIsFinalized {
        #[serde(default)]
        utxo: Value,
    },
    HeadIsAborted {
        #[serde(default)]
        utxo: Value,
    },
    TxValid {
        #[serde(rename = "transactionId", default, skip_serializing_if = "Option::is_none")]
        transaction_id: Option<String>,
    },
    TxInvalid {
        #[serde(rename = "transactionId", default, skip_serializing_if = "Option::is_none")]
        transaction_id: Option<String>,
        #[serde(rename = "validationError", default)]
        validation_error: Value,
    },
    SnapshotConfirmed {
        #[serde(default)]
        snapshot: Value,
        #[serde(default)]
        signatures: Value,
    },
    GetUTxOResponse {
        #[serde(default)]
        utxo: Value,
    },
    DecommitRequested {
        #[serde(rename = "utxoToDecommit", default)]
        utxo_to_decommit: Value,
    },
    DecommitApproved {
        #[serde(rename = "utxoToDecommit", default)]
        utxo_to_decommit: Value,
    },
    DecommitFinalized,
    InvalidInput {
        reason: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input: Option<String>,
    },
    CommandFailed {
        #[serde(rename = "clientInput", default)]
        client_input: Value,
    },
}

impl ServerOutput {
    pub fn tag(&self) -> &'static str {
        match self {
            ServerOutput::Greetings { .. } => "Greetings",
            ServerOutput::PeerConnected { .. } => "PeerConnected",
            ServerOutput::PeerDisconnected { .. } => "PeerDisconnected",
            ServerOutput::HeadIsInitializing { .. } => "HeadIsInitializing",
            ServerOutput::Committed { .. } => "Committed",
            ServerOutput::HeadIsOpen { .. } => "HeadIsOpen",
            ServerOutput::HeadIsClosed { .. } => "HeadIsClosed",
            ServerOutput::ReadyToFanout => "ReadyToFanout",
            ServerOutput::HeadIsFinalized { .. } => "HeadIsFinalized",
            ServerOutput::HeadIsAborted { .. } => "HeadIsAborted",
            ServerOutput::TxValid { .. } => "TxValid",
            ServerOutput::TxInvalid { .. } => "TxInvalid",
            ServerOutput::SnapshotConfirmed { .. } => "SnapshotConfirmed",
            ServerOutput::GetUTxOResponse { .. } => "GetUTxOResponse",
            ServerOutput::DecommitRequested { .. } => "DecommitRequested",
            ServerOutput::DecommitApproved { .. } => "DecommitApproved",
            ServerOutput::DecommitFinalized => "DecommitFinalized",
            ServerOutput::InvalidInput { .. } => "InvalidInput",
            ServerOutput::CommandFailed { .. } => "CommandFailed",
        }
    }
}

/// Command sent to a head node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tag")]
pub enum ClientInput {
    Init,
    Abort,
    NewTx {
        transaction: Value,
    },
    GetUTxO,
    Close,
    Contest {
        #[serde(rename = "snapshotNumber")]
        snapshot_number: u64,
    },
    Fanout,
    Decommit {
        #[serde(rename = "decommitTx")]
        decommit_tx: Value,
    },
    Recover {
        #[serde(rename = "recoverTxId", default, skip_serializing_if = "Option::is_none")]
        recover_tx_id: Option<String>,
    },
    SideLoadSnapshot {
        snapshot: Value,
    },
}

impl ClientInput {
    pub fn tag(&self) -> &'static str {
        match self {
            ClientInput::Init => "Init",
            ClientInput::Abort => "Abort",
            ClientInput::NewTx { .. } => "NewTx",
            ClientInput::GetUTxO => "GetUTxO",
            ClientInput::Close => "Close",
            ClientInput::Contest { .. } => "Contest",
            ClientInput::Fanout => "Fanout",
            ClientInput::Decommit { .. } => "Decommit",
            ClientInput::Recover { .. } => "Recover",
            ClientInput::SideLoadSnapshot { .. } => "SideLoadSnapshot",
        }
    }
}

/// Head lifecycle as observed from notifications. Commands never set this
/// directly; they only request transitions the node may or may not honor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HeadState {
    /// Connected but no Greetings seen yet.
    Unknown,
    Idle,
    Initializing,
    Open,
    Closed,
    ReadyToFanout,
    Finalized,
    Aborted,
}

impl HeadState {
    pub fn as_str(&self) -> &'static str {
        match self {
            HeadState::Unknown => "Unknown",
            HeadState::Idle => "Idle",
            HeadState::Initializing => "Initializing",
            HeadState::Open => "Open",
            HeadState::Closed => "Closed",
            HeadState::ReadyToFanout => "ReadyToFanout",
            HeadState::Finalized => "Finalized",
            HeadState::Aborted => "Aborted",
        }
    }
}

impl std::fmt::Display for HeadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Next head state after observing `output`. Non-lifecycle notifications
/// (transactions, snapshots, peers) leave the state untouched.
pub fn transition(current: HeadState, output: &ServerOutput) -> HeadState {
    match output {
        // Greetings carries the node's own view; it seeds the state after a
        // (re)connect where all prior history was missed. An absent or
        // unrecognized hint keeps whatever we had.
        ServerOutput::Greetings { head_status, .. } => match head_status.as_deref() {
            Some("Idle") => HeadState::Idle,
            Some("Initializing") => HeadState::Initializing,
            Some("Open") => HeadState::Open,
            Some("Closed") => HeadState::Closed,
            Some("FanoutPossible") => HeadState::ReadyToFanout,
            Some("Final") => HeadState::Finalized,
            _ => current,
        },
        ServerOutput::HeadIsInitializing { .. } => HeadState::Initializing,
        ServerOutput::HeadIsOpen { .. } => HeadState::Open,
        ServerOutput::HeadIsClosed { .. } => HeadState::Closed,
        ServerOutput::ReadyToFanout => HeadState::ReadyToFanout,
        ServerOutput::HeadIsFinalized { .. } => HeadState::Finalized,
        ServerOutput::HeadIsAborted { .. } => HeadState::Aborted,
        _ => current,
    }
}

/// Whether sending `input` makes sense in `state`. This is caller-side
/// gating: the node enforces its own rules, this just avoids provoking
/// CommandFailed replies for requests that cannot succeed.
///
/// `init_requested` is the latch set when an Init was already sent this
/// lifecycle; it is cleared when the head aborts back to pre-initialization.
pub fn permitted(input: &ClientInput, state: HeadState, init_requested: bool) -> bool {
    use HeadState::*;
    match input {
        ClientInput::Init => {
            !init_requested && matches!(state, Unknown | Idle | Aborted)
        }
        ClientInput::Abort => matches!(state, Unknown | Idle | Initializing | Aborted),
        ClientInput::NewTx { .. }
        | ClientInput::GetUTxO
        | ClientInput::Close
        | ClientInput::Decommit { .. }
        | ClientInput::SideLoadSnapshot { .. } => state == Open,
        ClientInput::Contest { .. } => state == Closed,
        ClientInput::Fanout => state == ReadyToFanout,
        ClientInput::Recover { .. } => true,
    }
}
