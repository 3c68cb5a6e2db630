//! Control agent child process
//!
//! Spawns the agent with piped stdio. A background task turns stdout into
//! normalized lines on a channel so reads can be bounded by a timeout.

use crate::domain::settings::AgentSettings;
use crate::error::AgentError;
use crate::infrastructure::agent::{protocol, Transport};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

pub struct AgentProcess {
    program: String,
    child: Child,
    stdin: Option<ChildStdin>,
    lines: mpsc::UnboundedReceiver<String>,
    reader: JoinHandle<()>,
    burst_settle: Duration,
    max_burst: Duration,
    exit_grace: Duration,
}

impl AgentProcess {
    /// Start the agent. Failure here is fatal for the session.
    pub fn open(settings: &AgentSettings) -> Result<Self, AgentError> {
        info!("Starting control agent: {} {:?}", settings.program, settings.args);

        let mut command = Command::new(&settings.program);
        command
            .args(&settings.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        // Keep terminal interrupts away from the agent so teardown can still talk to it
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(|source| AgentError::Spawn {
            program: settings.program.clone(),
            source,
        })?;

        let stdin = child.stdin.take().ok_or(AgentError::MissingPipe("stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or(AgentError::MissingPipe("stdout"))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let reader = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(raw)) => {
                        let line = protocol::normalize_line(&raw);
                        trace!("agent> {}", line);
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        debug!("Control agent closed its output");
                        break;
                    }
                    Err(e) => {
                        warn!("Control agent output read error: {}", e);
                        break;
                    }
                }
            }
        });

        Ok(Self {
            program: settings.program.clone(),
            child,
            stdin: Some(stdin),
            lines: rx,
            reader,
            burst_settle: settings.burst_settle(),
            max_burst: settings.max_burst(),
            exit_grace: settings.exit_grace(),
        })
    }
}

impl Transport for AgentProcess {
    async fn send(&mut self, line: &str) -> Result<(), AgentError> {
        let stdin = self.stdin.as_mut().ok_or(AgentError::Closed)?;
        debug!("agent< {}", line);

        let write_err = |source| AgentError::Write {
            line: line.to_string(),
            source,
        };
        stdin
            .write_all(format!("{}\n", line).as_bytes())
            .await
            .map_err(write_err)?;
        stdin.flush().await.map_err(write_err)?;
        Ok(())
    }

    async fn read_burst(&mut self, timeout: Duration) -> Vec<String> {
        let mut burst = Vec::new();

        match tokio::time::timeout(timeout, self.lines.recv()).await {
            Ok(Some(line)) => burst.push(line),
            // Timed out, or the agent is gone; both read as "nothing yet"
            Ok(None) | Err(_) => return burst,
        }

        // Ends on a quiet settle window or at the deadline, whichever comes first
        let deadline = Instant::now() + self.max_burst;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                debug!("Burst cut off after {:?} with {} lines", self.max_burst, burst.len());
                break;
            }
            match tokio::time::timeout(remaining.min(self.burst_settle), self.lines.recv()).await {
                Ok(Some(line)) => burst.push(line),
                Ok(None) | Err(_) => break,
            }
        }
        burst
    }

    async fn close(&mut self) -> Result<(), AgentError> {
        // Dropping stdin delivers EOF, which ends agents that ignored `exit`
        self.stdin.take();

        match tokio::time::timeout(self.exit_grace, self.child.wait()).await {
            Ok(Ok(status)) => info!("Control agent {} exited: {}", self.program, status),
            Ok(Err(e)) => warn!("Waiting for control agent failed: {}", e),
            Err(_) => {
                warn!(
                    "Control agent {} still running after {:?}, killing it",
                    self.program, self.exit_grace
                );
                if let Err(e) = self.child.kill().await {
                    warn!("Failed to kill control agent: {}", e);
                }
            }
        }

        self.reader.abort();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // `cat` echoes every line back, which is enough of an agent to exercise the plumbing
    fn cat_settings() -> AgentSettings {
        AgentSettings {
            program: "cat".to_string(),
            args: Vec::new(),
            read_timeout_ms: 1000,
            burst_settle_ms: 50,
            max_burst_ms: 500,
            exit_grace_ms: 500,
        }
    }

    #[tokio::test]
    async fn test_echo_round_trip() {
        let mut agent = AgentProcess::open(&cat_settings()).unwrap();

        agent.send("scan on").await.unwrap();
        agent.send("scan off").await.unwrap();
        let burst = agent.read_burst(Duration::from_secs(2)).await;
        assert_eq!(burst, vec!["scan on".to_string(), "scan off".to_string()]);

        agent.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_idle_read_times_out_empty() {
        let mut agent = AgentProcess::open(&cat_settings()).unwrap();
        let burst = agent.read_burst(Duration::from_millis(100)).await;
        assert!(burst.is_empty());
        assert!(agent.drain().await.is_empty());
        agent.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_chatty_agent_burst_is_bounded() {
        // Scanning agents print RSSI updates faster than the settle window
        let settings = AgentSettings {
            program: "sh".to_string(),
            args: vec![
                "-c".to_string(),
                "while true; do echo '[CHG] Device 11:22:33:44:55:66 RSSI: -70'; sleep 0.01; done"
                    .to_string(),
            ],
            max_burst_ms: 300,
            ..cat_settings()
        };
        let mut agent = AgentProcess::open(&settings).unwrap();

        let burst = tokio::time::timeout(
            Duration::from_secs(5),
            agent.read_burst(Duration::from_secs(1)),
        )
        .await
        .expect("read_burst must return while the agent keeps talking");
        assert!(!burst.is_empty());
        assert!(burst[0].contains("RSSI"));

        agent.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_send_after_close_fails() {
        let mut agent = AgentProcess::open(&cat_settings()).unwrap();
        agent.close().await.unwrap();
        assert!(matches!(
            agent.send("exit").await,
            Err(AgentError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let settings = AgentSettings {
            program: "definitely-not-a-bluetooth-agent".to_string(),
            ..cat_settings()
        };
        assert!(matches!(
            AgentProcess::open(&settings),
            Err(AgentError::Spawn { .. })
        ));
    }
}
