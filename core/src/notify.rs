//! Post-mutation hooks

use crate::{Error, Result};
use std::process::Command;

/// Called after every successful, persisted peer mutation
pub trait ChangeNotifier: Send + Sync {
    fn on_change(&self) -> Result<()>;
}

/// Runs a shell command (e.g. reloading the WireGuard interface)
#[derive(Debug, Clone)]
pub struct CommandNotifier {
    command: String,
}

impl CommandNotifier {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

impl ChangeNotifier for CommandNotifier {
    fn on_change(&self) -> Result<()> {
        log::debug!("Running on-change command: {}", self.command);
        let output = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .output()
            .map_err(|e| Error::Command {
                cmd: self.command.clone(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(Error::Command {
                cmd: self.command.clone(),
                message: format!(
                    "exit code {}: {}",
                    output.status.code().unwrap_or(-1),
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        Ok(())
    }
}
