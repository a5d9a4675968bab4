//! Scripted executor for tests.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{CommandOutput, Executor};
use crate::errors::ExecError;

/// Test double that answers commands from a list of substring-keyed rules and
/// records every invocation so tests can assert on (the absence of) calls.
#[derive(Default)]
pub struct MockExecutor {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<String>>,
}

struct Rule {
    needle: String,
    output: CommandOutput,
    /// `None` = unlimited; `Some(n)` = consume after n matches.
    remaining: Option<u32>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Respond to any command containing `needle` with `stdout` and exit 0.
    pub fn on(self, needle: &str, stdout: &str) -> Self {
        self.on_with(needle, stdout, "", 0)
    }

    /// Respond with full control over the captured output.
    pub fn on_with(self, needle: &str, stdout: &str, stderr: &str, exit_code: i32) -> Self {
        self.rules.lock().unwrap().push(Rule {
            needle: needle.to_string(),
            output: CommandOutput {
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
                exit_code,
            },
            remaining: None,
        });
        self
    }

    /// Like `on`, but the rule only answers the first `n` matching commands.
    /// Later rules with the same needle then take over — this scripts
    /// "process appears after the second poll"-style sequences.
    pub fn on_times(self, needle: &str, stdout: &str, exit_code: i32, n: u32) -> Self {
        self.rules.lock().unwrap().push(Rule {
            needle: needle.to_string(),
            output: CommandOutput {
                stdout: stdout.to_string(),
                stderr: String::new(),
                exit_code,
            },
            remaining: Some(n),
        });
        self
    }

    /// Every command the mock has been asked to run, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// True if any recorded command contains `needle`.
    pub fn saw(&self, needle: &str) -> bool {
        self.calls.lock().unwrap().iter().any(|c| c.contains(needle))
    }
}

#[async_trait]
impl Executor for MockExecutor {
    async fn run(&self, command: &str) -> Result<CommandOutput, ExecError> {
        self.calls.lock().unwrap().push(command.to_string());

        let mut rules = self.rules.lock().unwrap();
        for rule in rules.iter_mut() {
            if !command.contains(&rule.needle) {
                continue;
            }
            match rule.remaining {
                Some(0) => continue,
                Some(ref mut n) => *n -= 1,
                None => {}
            }
            return Ok(rule.output.clone());
        }

        // Unmatched commands succeed silently: most shell probes (pgrep, test,
        // tail) default to "nothing found" in the scenarios under test.
        Ok(CommandOutput {
            stdout: String::new(),
            stderr: String::new(),
            exit_code: 1,
        })
    }

    async fn spawn_background(&self, command: &str, log_file: &Path) -> Result<(), ExecError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("[background>{}] {}", log_file.display(), command));
        Ok(())
    }
}
