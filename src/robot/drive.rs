//! Drive Loop
//!
//! Maps key presses to motor frames and writes them to the selected
//! attribute until the operator interrupts.

use crate::domain::commands::{CommandCatalog, Direction};
use crate::domain::keys::{KeyAction, KeyDecoder};
use crate::domain::models::SessionState;
use crate::error::Result;
use crate::infrastructure::agent::{protocol, Transport};
use crate::infrastructure::keyboard::KeySource;
use crate::robot::session::RobotSession;
use std::io::Write;
use tracing::{debug, info, trace};

/// Run until interrupted or input ends; returns the number of frames written
pub async fn drive<T, K, W>(
    session: &mut RobotSession<T>,
    keys: &mut K,
    catalog: &CommandCatalog,
    out: &mut W,
) -> Result<usize>
where
    T: Transport,
    K: KeySource,
    W: Write,
{
    session.transition(SessionState::Driving);
    info!("Driving; arrow keys steer, any other key stops");

    let mut decoder = KeyDecoder::new();
    let mut frames = 0;

    loop {
        let Some(byte) = keys.next_byte().await else {
            info!("Key input ended");
            break;
        };

        match decoder.feed(byte) {
            None => {}
            Some(KeyAction::Ignored) => debug!("Ignoring unrecognized escape sequence"),
            Some(KeyAction::Interrupt) => {
                info!("Interrupt key pressed");
                break;
            }
            Some(KeyAction::Drive(direction)) => {
                dispatch(session, catalog, direction, out).await?;
                frames += 1;
            }
        }
    }

    Ok(frames)
}

async fn dispatch<T: Transport, W: Write>(
    session: &mut RobotSession<T>,
    catalog: &CommandCatalog,
    direction: Direction,
    out: &mut W,
) -> Result<()> {
    // Raw mode turns off output post-processing, hence the explicit \r
    write!(out, "{}\r\n", direction.label())?;
    out.flush()?;

    let command = catalog.get(direction);
    debug!(
        "{} frame: left={} right={}",
        direction,
        command.left_speed(),
        command.right_speed()
    );
    session.transport.send(&protocol::write(command)).await?;

    for line in session.transport.drain().await {
        trace!("write: {}", line);
    }
    Ok(())
}
