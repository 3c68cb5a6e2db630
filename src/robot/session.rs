//! Robot Session
//!
//! Owns the agent transport together with everything learned about the robot
//! during one run. Discovery, resolution, driving and teardown all operate on
//! this object instead of shared globals.

use crate::domain::models::{AttributeHandle, DeviceAddress, SessionState};
use crate::domain::settings::Settings;
use crate::infrastructure::agent::Transport;
use std::time::Duration;
use tracing::{debug, warn};

pub struct RobotSession<T: Transport> {
    pub(crate) transport: T,
    pub(crate) service_uuid: String,
    pub(crate) write_char_uuid: String,
    pub(crate) read_timeout: Duration,
    pub(crate) discovery_timeout: Option<Duration>,
    pub(crate) resolve_timeout: Option<Duration>,
    pub(crate) address: Option<DeviceAddress>,
    pub(crate) attribute: Option<AttributeHandle>,
    state: SessionState,
}

impl<T: Transport> RobotSession<T> {
    pub fn new(transport: T, settings: &Settings) -> Self {
        Self {
            transport,
            service_uuid: settings.robot.service_uuid.clone(),
            write_char_uuid: settings.robot.write_char_uuid.clone(),
            read_timeout: settings.agent.read_timeout(),
            discovery_timeout: settings.robot.discovery_timeout_secs.map(Duration::from_secs),
            resolve_timeout: settings.robot.resolve_timeout_secs.map(Duration::from_secs),
            address: None,
            attribute: None,
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub(crate) fn transition(&mut self, next: SessionState) {
        if self.state != next {
            debug!("Session state {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }

    /// Send a command and hand back the reply burst it produced
    pub(crate) async fn request(
        &mut self,
        line: &str,
    ) -> Result<Vec<String>, crate::error::AgentError> {
        self.transport.send(line).await?;
        Ok(self.transport.read_burst(self.read_timeout).await)
    }

    #[cfg(test)]
    pub(crate) fn transport(&self) -> &T {
        &self.transport
    }
}

impl<T: Transport> Drop for RobotSession<T> {
    fn drop(&mut self) {
        if self.state != SessionState::Terminated {
            warn!(
                "Session dropped in state {:?} without teardown; the agent will be killed",
                self.state
            );
        }
    }
}
