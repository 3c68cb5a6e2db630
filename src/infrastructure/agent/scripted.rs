//! In-memory transport replaying canned agent output

use crate::error::AgentError;
use crate::infrastructure::agent::Transport;
use std::collections::VecDeque;
use std::time::Duration;

#[derive(Debug, Default)]
pub struct ScriptedTransport {
    bursts: VecDeque<Vec<String>>,
    pub sent: Vec<String>,
    pub reads: usize,
    pub closed: usize,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one burst; an empty slice simulates a read timeout
    pub fn push_burst(&mut self, lines: &[&str]) -> &mut Self {
        self.bursts
            .push_back(lines.iter().map(|l| l.to_string()).collect());
        self
    }

    pub fn pending_bursts(&self) -> usize {
        self.bursts.len()
    }

    pub fn sent_starting_with(&self, prefix: &str) -> Vec<&str> {
        self.sent
            .iter()
            .filter(|l| l.starts_with(prefix))
            .map(|l| l.as_str())
            .collect()
    }
}

impl Transport for ScriptedTransport {
    async fn send(&mut self, line: &str) -> Result<(), AgentError> {
        if self.closed > 0 {
            return Err(AgentError::Closed);
        }
        self.sent.push(line.to_string());
        Ok(())
    }

    async fn read_burst(&mut self, _timeout: Duration) -> Vec<String> {
        self.reads += 1;
        match self.bursts.pop_front() {
            Some(burst) => burst,
            None => {
                // Out of script: behave like an idle agent and let other tasks run
                tokio::task::yield_now().await;
                Vec::new()
            }
        }
    }

    async fn close(&mut self) -> Result<(), AgentError> {
        self.closed += 1;
        Ok(())
    }
}
