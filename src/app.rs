//! Session orchestration
//!
//! Opens the agent, runs discovery, resolution and the drive loop, and makes
//! sure teardown follows whichever way that ends: interrupt key, end of
//! input, a signal, or an error.

use crate::domain::commands::CommandCatalog;
use crate::domain::settings::Settings;
use crate::error::RobotError;
use crate::infrastructure::agent::{AgentProcess, Transport};
use crate::infrastructure::keyboard::{KeySource, TerminalKeys};
use crate::robot::{connection, discovery, drive, RobotSession};
use anyhow::Context;
use std::future::Future;
use std::io::{self, Write};
use tracing::{error, info, warn};

/// Discover, connect and drive. Key input is opened only once the robot is
/// ready so the terminal stays in normal mode while waiting.
pub async fn control_robot<T, K, F, W>(
    session: &mut RobotSession<T>,
    open_keys: F,
    out: &mut W,
) -> Result<usize, RobotError>
where
    T: Transport,
    K: KeySource,
    F: FnOnce() -> io::Result<K>,
    W: Write,
{
    let catalog = CommandCatalog::new();

    writeln!(out, "Scanning for robot...")?;
    out.flush()?;
    let address = discovery::discover(session).await?;
    writeln!(out, "Found robot {}", address)?;

    writeln!(out, "Connecting...")?;
    out.flush()?;
    let attribute = connection::resolve(session, address).await?;
    writeln!(out, "Ready on {}. Arrow keys drive, any other key stops, Ctrl-C quits.", attribute)?;
    out.flush()?;

    let mut keys = open_keys()?;
    drive::drive(session, &mut keys, &catalog, out).await
}

/// Resolves when the process is asked to stop
#[cfg(unix)]
async fn shutdown_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            warn!("Cannot listen for SIGTERM: {}", e);
            return wait_ctrl_c().await;
        }
    };
    tokio::select! {
        name = wait_ctrl_c() => name,
        _ = terminate.recv() => "terminate",
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> &'static str {
    wait_ctrl_c().await
}

async fn wait_ctrl_c() -> &'static str {
    if let Err(e) = tokio::signal::ctrl_c().await {
        // Without a handler only the interrupt key can end the session
        warn!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    "interrupt"
}

/// Run the session until it ends or `shutdown` resolves, then tear down.
/// Teardown happens on every path, including errors and signals.
pub async fn run_session<T, K, F, S, W>(
    session: &mut RobotSession<T>,
    open_keys: F,
    shutdown: S,
    out: &mut W,
) -> Result<usize, RobotError>
where
    T: Transport,
    K: KeySource,
    F: FnOnce() -> io::Result<K>,
    S: Future<Output = &'static str>,
    W: Write,
{
    let outcome = tokio::select! {
        result = control_robot(&mut *session, open_keys, &mut *out) => result,
        signal = shutdown => {
            info!("Received {} signal", signal);
            Ok(0)
        }
    };

    // Key input, and with it raw mode, is gone by now
    session.teardown(out).await;
    outcome
}

pub async fn run(settings: &Settings) -> anyhow::Result<()> {
    let agent = AgentProcess::open(&settings.agent).context("control agent unavailable")?;
    let mut session = RobotSession::new(agent, settings);
    let mut stdout = io::stdout();

    match run_session(&mut session, TerminalKeys::open, shutdown_signal(), &mut stdout).await {
        Ok(frames) => {
            info!("Session finished after {} frames", frames);
            Ok(())
        }
        Err(e) => {
            error!("Session failed: {}", e);
            Err(e).context("robot session failed")
        }
    }
}
