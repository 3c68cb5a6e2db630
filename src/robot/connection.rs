//! Connection Resolver
//!
//! Connects to the discovered robot and picks the writable characteristic.
//! The agent announces a characteristic as an attribute path followed by its
//! UUID on the next line, so the matcher keeps one line of lookback that
//! survives across read bursts.

use crate::domain::models::{AttributeHandle, DeviceAddress, SessionState};
use crate::error::{Result, RobotError};
use crate::infrastructure::agent::{protocol, Transport};
use crate::robot::session::RobotSession;
use std::time::Instant;
use tracing::{debug, info};

#[derive(Debug)]
pub struct AttributeMatcher {
    char_uuid: String,
    previous: Option<String>,
}

impl AttributeMatcher {
    pub fn new(char_uuid: impl Into<String>) -> Self {
        Self {
            char_uuid: char_uuid.into(),
            previous: None,
        }
    }

    /// Feed one burst; returns the attribute once its UUID line is seen
    pub fn feed(&mut self, burst: &[String]) -> Option<AttributeHandle> {
        for line in burst {
            if protocol::announces_characteristic(line, &self.char_uuid) {
                if let Some(handle) = self.previous.as_deref().and_then(AttributeHandle::from_line)
                {
                    return Some(handle);
                }
            }
            self.previous = Some(line.clone());
        }
        None
    }
}

/// Connect and select the write attribute. Without a configured timeout this waits forever.
pub async fn resolve<T: Transport>(
    session: &mut RobotSession<T>,
    address: DeviceAddress,
) -> Result<AttributeHandle> {
    info!("Connecting to {}", address);
    session.transition(SessionState::Connecting);
    // The reply is absorbed by the reads below
    session.transport.send(&protocol::connect(&address)).await?;

    session.transition(SessionState::ResolvingAttribute);
    let mut matcher = AttributeMatcher::new(session.write_char_uuid.clone());
    let started = Instant::now();
    let handle = loop {
        let burst = session.transport.read_burst(session.read_timeout).await;
        for line in &burst {
            debug!("connect: {}", line);
        }
        if let Some(handle) = matcher.feed(&burst) {
            break handle;
        }

        if let Some(limit) = session.resolve_timeout {
            if started.elapsed() >= limit {
                return Err(RobotError::AttributeNotFound {
                    char_uuid: session.write_char_uuid.clone(),
                    secs: limit.as_secs(),
                });
            }
        }
    };

    info!("Selecting attribute {}", handle);
    for line in session.request(&protocol::select_attribute(&handle)).await? {
        debug!("select-attribute: {}", line);
    }
    session.attribute = Some(handle.clone());

    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::settings::Settings;
    use crate::infrastructure::agent::scripted::ScriptedTransport;

    const RX_UUID: &str = "6e400002-b5a3-f393-e0a9-e50e24dcca9e";

    fn burst(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|l| l.to_string()).collect()
    }

    #[test]
    fn test_matches_previous_line() {
        let mut matcher = AttributeMatcher::new(RX_UUID);
        let handle = matcher
            .feed(&burst(&[
                "[NEW] Characteristic (Handle 0x0010)",
                "  /org/bluez/hci0/dev_AB_CD_EF_12_34_56/service000c/char0010",
                "  6e400002-b5a3-f393-e0a9-e50e24dcca9e",
                "  Nordic UART RX",
            ]))
            .unwrap();
        assert_eq!(
            handle.as_str(),
            "/org/bluez/hci0/dev_AB_CD_EF_12_34_56/service000c/char0010"
        );
    }

    #[test]
    fn test_lookback_spans_bursts() {
        let mut matcher = AttributeMatcher::new(RX_UUID);
        assert!(matcher
            .feed(&burst(&["Attempting to connect", "\t/org/bluez/hci0/dev_X/service000c/char000d"]))
            .is_none());
        assert!(matcher.feed(&[]).is_none());

        let handle = matcher
            .feed(&burst(&["\t6e400002-b5a3-f393-e0a9-e50e24dcca9e"]))
            .unwrap();
        assert_eq!(handle.as_str(), "/org/bluez/hci0/dev_X/service000c/char000d");
    }

    #[test]
    fn test_ignores_other_characteristics() {
        let mut matcher = AttributeMatcher::new(RX_UUID);
        assert!(matcher
            .feed(&burst(&[
                "\t/org/bluez/hci0/dev_X/service000c/char000f",
                "\t6e400003-b5a3-f393-e0a9-e50e24dcca9e",
            ]))
            .is_none());
    }

    #[tokio::test]
    async fn test_resolve_sequence() {
        let mut agent = ScriptedTransport::new();
        agent
            .push_burst(&["Attempting to connect to AB:CD:EF:12:34:56"])
            .push_burst(&[
                "[CHG] Device AB:CD:EF:12:34:56 Connected: yes",
                "[NEW] Characteristic (Handle 0x0010)",
                "\t/org/bluez/hci0/dev_AB_CD_EF_12_34_56/service000c/char0010",
            ])
            .push_burst(&["\t6e400002-b5a3-f393-e0a9-e50e24dcca9e", "\tNordic UART RX"])
            .push_burst(&["[robot:/service000c/char0010]#"]);

        let mut session = RobotSession::new(agent, &Settings::default());
        let address: DeviceAddress = "AB:CD:EF:12:34:56".parse().unwrap();
        let handle = resolve(&mut session, address).await.unwrap();

        assert_eq!(
            handle.as_str(),
            "/org/bluez/hci0/dev_AB_CD_EF_12_34_56/service000c/char0010"
        );
        assert_eq!(session.attribute.as_ref(), Some(&handle));
        assert_eq!(session.state(), SessionState::ResolvingAttribute);
        assert_eq!(
            session.transport().sent,
            vec![
                "connect AB:CD:EF:12:34:56",
                "select-attribute /org/bluez/hci0/dev_AB_CD_EF_12_34_56/service000c/char0010",
            ]
        );
        assert_eq!(session.transport().pending_bursts(), 0);
    }

    #[tokio::test]
    async fn test_resolve_times_out_when_configured() {
        let mut settings = Settings::default();
        settings.robot.resolve_timeout_secs = Some(0);

        let mut agent = ScriptedTransport::new();
        agent.push_burst(&["Failed to connect: org.bluez.Error.Failed"]);

        let mut session = RobotSession::new(agent, &settings);
        let address: DeviceAddress = "AB:CD:EF:12:34:56".parse().unwrap();
        let err = resolve(&mut session, address).await.unwrap_err();

        assert!(matches!(err, RobotError::AttributeNotFound { secs: 0, .. }));
        assert!(session.attribute.as_ref().is_none());
    }
}
