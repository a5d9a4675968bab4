//! CLI command implementations.
//!
//! Each submodule owns one subcommand group:
//!
//! | Module  | Commands handled                                  |
//! |---------|---------------------------------------------------|
//! | `node`  | `node start/stop/status/logs/clear-data`          |
//! | `keys`  | `keys generate/check`                             |
//! | `funds` | `funds query/commit/send`                         |
//! | `head`  | `head <participant> init/abort/close/…/watch`     |

pub mod funds;
pub mod head;
pub mod keys;
pub mod node;

pub use funds::{cmd_commit, cmd_query, cmd_send};
pub use head::cmd_head;
pub use keys::{cmd_keys_check, cmd_keys_generate};
pub use node::{cmd_clear_data, cmd_logs, cmd_start, cmd_status, cmd_stop};
