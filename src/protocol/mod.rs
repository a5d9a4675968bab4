//! Head protocol client: wire messages, lifecycle state machine, and the
//! reconnecting WebSocket session.

pub mod connection;
pub mod messages;

pub use connection::HeadConnection;
pub use messages::{ClientInput, HeadState, ServerOutput, permitted, transition};

use crate::errors::ConnectionError;

/// Anything that can deliver a command to a head node. The funds workflows
/// depend on this seam rather than on a live connection, which keeps them
/// testable with a recording stub.
pub trait CommandSink: Send + Sync {
    fn send_command(&self, input: &ClientInput) -> Result<(), ConnectionError>;
}

impl CommandSink for HeadConnection {
    fn send_command(&self, input: &ClientInput) -> Result<(), ConnectionError> {
        self.send(input)
    }
}
