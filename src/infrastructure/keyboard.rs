//! Raw key input
//!
//! Puts the terminal in raw mode so keys arrive unbuffered and unechoed, and
//! reads stdin byte by byte on a dedicated thread. Stdin reads cannot be
//! cancelled, so the thread is left detached and ends with the process.

use crossterm::terminal;
use std::io::{self, IsTerminal, Read};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Source of raw key bytes; `None` means input has ended
#[allow(async_fn_in_trait)]
pub trait KeySource {
    async fn next_byte(&mut self) -> Option<u8>;
}

/// Restores the terminal mode when dropped, including during unwinding
pub struct RawModeGuard {
    enabled: bool,
}

impl RawModeGuard {
    /// Enable raw mode when stdin is a terminal; a no-op for piped input
    pub fn enable() -> io::Result<Self> {
        if !io::stdin().is_terminal() {
            debug!("stdin is not a terminal, leaving line discipline alone");
            return Ok(Self { enabled: false });
        }
        terminal::enable_raw_mode()?;
        Ok(Self { enabled: true })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if self.enabled {
            if let Err(e) = terminal::disable_raw_mode() {
                warn!("Failed to restore terminal mode: {}", e);
            }
        }
    }
}

pub struct TerminalKeys {
    bytes: mpsc::Receiver<u8>,
    _raw_mode: RawModeGuard,
}

impl TerminalKeys {
    pub fn open() -> io::Result<Self> {
        let raw_mode = RawModeGuard::enable()?;

        let (tx, rx) = mpsc::channel(64);
        std::thread::Builder::new()
            .name("key-reader".to_string())
            .spawn(move || {
                let mut stdin = io::stdin().lock();
                let mut buf = [0u8; 1];
                loop {
                    match stdin.read(&mut buf) {
                        Ok(0) => break,
                        Ok(_) => {
                            if tx.blocking_send(buf[0]).is_err() {
                                break;
                            }
                        }
                        Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                        Err(e) => {
                            warn!("Key input read error: {}", e);
                            break;
                        }
                    }
                }
                debug!("Key reader finished");
            })?;

        Ok(Self {
            bytes: rx,
            _raw_mode: raw_mode,
        })
    }
}

impl KeySource for TerminalKeys {
    async fn next_byte(&mut self) -> Option<u8> {
        self.bytes.recv().await
    }
}

/// Replays a fixed key sequence, then reports end of input
#[cfg(test)]
pub struct CannedKeys(pub std::collections::VecDeque<u8>);

#[cfg(test)]
impl KeySource for CannedKeys {
    async fn next_byte(&mut self) -> Option<u8> {
        self.0.pop_front()
    }
}
