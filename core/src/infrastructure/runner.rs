//! Command runner abstraction for executing shell commands.
//!
//! `CommandRunner` is the trait the command backend uses to execute hook
//! tools and package commands. `ShellRunner` is the production implementation
//! that spawns `sh -c`. `MockRunner` records calls and returns preset
//! responses.

use std::cell::RefCell;
use std::process::Command;

use tracing::debug;

/// Trait for executing shell command strings.
pub trait CommandRunner {
    fn run(&self, cmd: &str) -> Result<String, String>;
}

/// Production runner that spawns `sh -c <cmd>`.
pub struct ShellRunner;

impl CommandRunner for ShellRunner {
    fn run(&self, cmd: &str) -> Result<String, String> {
        debug!(command = cmd, "running");
        let output = Command::new("sh")
            .arg("-c")
            .arg(cmd)
            .output()
            .map_err(|e| format!("Failed to execute: {}", e))?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            Err(String::from_utf8_lossy(&output.stderr).trim().to_string())
        }
    }
}

/// Test-double runner that records commands and returns pre-configured
/// responses, either in call order or keyed by a command prefix.
pub struct MockRunner {
    responses: RefCell<Vec<Result<String, String>>>,
    by_prefix: Vec<(String, Result<String, String>)>,
    commands: RefCell<Vec<String>>,
}

impl MockRunner {
    pub fn with_responses(responses: Vec<Result<String, String>>) -> Self {
        let mut reversed = responses;
        reversed.reverse();
        MockRunner {
            responses: RefCell::new(reversed),
            by_prefix: Vec::new(),
            commands: RefCell::new(Vec::new()),
        }
    }

    pub fn new() -> Self {
        Self::with_responses(Vec::new())
    }

    /// Answer any command starting with `prefix` with `response`. Prefix
    /// answers take priority over the ordered queue.
    pub fn respond_to(mut self, prefix: &str, response: Result<String, String>) -> Self {
        self.by_prefix.push((prefix.to_string(), response));
        self
    }

    pub fn executed_commands(&self) -> Vec<String> {
        self.commands.borrow().clone()
    }
}

impl Default for MockRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRunner for MockRunner {
    fn run(&self, cmd: &str) -> Result<String, String> {
        self.commands.borrow_mut().push(cmd.to_string());
        if let Some((_, response)) = self.by_prefix.iter().find(|(p, _)| cmd.starts_with(p.as_str())) {
            return response.clone();
        }
        let mut responses = self.responses.borrow_mut();
        if let Some(response) = responses.pop() {
            response
        } else {
            Ok(String::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_runner_records_commands() {
        let runner = MockRunner::with_responses(vec![Ok("ok".into()), Ok("ok2".into())]);
        assert!(runner.run("relation-ids amqp").is_ok());
        assert!(runner.run("unit-get private-address").is_ok());
        let cmds = runner.executed_commands();
        assert_eq!(cmds, vec!["relation-ids amqp", "unit-get private-address"]);
    }

    #[test]
    fn mock_runner_returns_responses_in_order() {
        let runner = MockRunner::with_responses(vec![
            Ok("first".into()),
            Err("fail".into()),
            Ok("third".into()),
        ]);
        assert_eq!(runner.run("cmd1").unwrap(), "first");
        assert_eq!(runner.run("cmd2").unwrap_err(), "fail");
        assert_eq!(runner.run("cmd3").unwrap(), "third");
    }

    #[test]
    fn mock_runner_defaults_to_empty_ok() {
        let runner = MockRunner::new();
        assert_eq!(runner.run("anything").unwrap(), "");
    }

    #[test]
    fn prefix_responses_win() {
        let runner = MockRunner::with_responses(vec![Ok("queued".into())])
            .respond_to("unit-get", Ok("10.0.0.1\n".into()));
        assert_eq!(runner.run("unit-get private-address").unwrap(), "10.0.0.1\n");
        assert_eq!(runner.run("other").unwrap(), "queued");
    }
}
