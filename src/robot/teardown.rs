//! Teardown Handler
//!
//! Disconnects and forgets the robot, then ends the control agent. Runs once
//! per session no matter how the session ended.

use crate::domain::models::SessionState;
use crate::infrastructure::agent::{protocol, Transport};
use crate::robot::session::RobotSession;
use std::io::Write;
use tracing::{debug, info, trace, warn};

impl<T: Transport> RobotSession<T> {
    /// Release the robot and the agent. A second call does nothing.
    pub async fn teardown<W: Write>(&mut self, out: &mut W) {
        if self.state() == SessionState::Terminated {
            return;
        }
        self.transition(SessionState::Disconnecting);
        info!("Tearing down session");

        for line in self.transport.drain().await {
            trace!("drained: {}", line);
        }

        if let Some(attribute) = &self.attribute {
            debug!("Releasing attribute {}", attribute);
        }
        if let Some(address) = self.address {
            self.send_and_print(&protocol::disconnect(&address), out).await;
            self.send_and_print(&protocol::remove(&address), out).await;
        }

        if let Err(e) = self.transport.send(protocol::EXIT).await {
            warn!("Could not send exit to control agent: {}", e);
        }
        if let Err(e) = self.transport.close().await {
            warn!("Closing control agent failed: {}", e);
        }

        self.transition(SessionState::Terminated);
    }

    async fn send_and_print<W: Write>(&mut self, line: &str, out: &mut W) {
        match self.request(line).await {
            Ok(reply) => {
                let printed = reply
                    .iter()
                    .try_for_each(|reply_line| writeln!(out, "{}", reply_line))
                    .and_then(|()| out.flush());
                if let Err(e) = printed {
                    warn!("Could not show reply to `{}`: {}", line, e);
                }
            }
            Err(e) => warn!("Teardown step `{}` failed: {}", line, e),
        }
    }
}
