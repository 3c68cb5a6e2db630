//! Control Agent Module
//!
//! Bridges to the external line-oriented BLE control agent.
//!
//! ## Modules
//!
//! - [`protocol`] - Command lines and output line parsers
//! - [`process`] - The agent child process behind the [`Transport`] trait

pub mod process;
pub mod protocol;

#[cfg(test)]
pub mod scripted;

use crate::error::AgentError;
use std::time::Duration;

pub use process::AgentProcess;

/// Duplex line channel to the control agent
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Write one command line; no acknowledgment is awaited
    async fn send(&mut self, line: &str) -> Result<(), AgentError>;

    /// Wait up to `timeout` for output and return every line that arrived.
    /// An empty burst means the agent was idle, not that something failed.
    async fn read_burst(&mut self, timeout: Duration) -> Vec<String>;

    /// Collect whatever is already buffered without waiting
    async fn drain(&mut self) -> Vec<String> {
        self.read_burst(Duration::ZERO).await
    }

    /// Release the agent. Called once, after the `exit` command.
    async fn close(&mut self) -> Result<(), AgentError>;
}
