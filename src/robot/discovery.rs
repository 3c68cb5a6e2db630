//! Discovery Engine
//!
//! Filters the agent's scan by service UUID and waits for the first device
//! announcement carrying a hardware address.

use crate::domain::models::{DeviceAddress, SessionState};
use crate::error::{Result, RobotError};
use crate::infrastructure::agent::{protocol, Transport};
use crate::robot::session::RobotSession;
use std::time::Instant;
use tracing::{debug, info};

/// First device address announced in a burst, if any
pub fn find_device(burst: &[String]) -> Option<DeviceAddress> {
    burst
        .iter()
        .find_map(|line| protocol::parse_device_announcement(line))
}

/// Scan until a robot shows up. Without a configured timeout this waits forever.
pub async fn discover<T: Transport>(session: &mut RobotSession<T>) -> Result<DeviceAddress> {
    let filter = protocol::set_scan_filter(&session.service_uuid);
    for line in session.request(&filter).await? {
        debug!("filter: {}", line);
    }

    info!("Scanning for robot advertising {}", session.service_uuid);
    session.transition(SessionState::Scanning);
    session.transport.send(protocol::SCAN_ON).await?;

    let started = Instant::now();
    let address = loop {
        let burst = session.transport.read_burst(session.read_timeout).await;
        if let Some(address) = find_device(&burst) {
            break address;
        }

        if let Some(limit) = session.discovery_timeout {
            if started.elapsed() >= limit {
                return Err(RobotError::DiscoveryTimedOut {
                    service_uuid: session.service_uuid.clone(),
                    secs: limit.as_secs(),
                });
            }
        }
    };

    info!("Found robot at {}", address);
    session.address = Some(address);

    for line in session.request(protocol::SCAN_OFF).await? {
        debug!("scan off: {}", line);
    }

    Ok(address)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::settings::Settings;
    use crate::infrastructure::agent::scripted::ScriptedTransport;

    fn burst(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|l| l.to_string()).collect()
    }

    #[test]
    fn test_find_device_first_match_wins() {
        let lines = burst(&[
            "Discovery started",
            "[NEW] Device AB:CD:EF:12:34:56 SomeRobot",
            "[NEW] Device 11:22:33:44:55:66 OtherRobot",
        ]);
        assert_eq!(find_device(&lines).unwrap().to_string(), "AB:CD:EF:12:34:56");
        assert!(find_device(&burst(&["SetDiscoveryFilter success"])).is_none());
    }

    #[tokio::test]
    async fn test_discover_sequence() {
        let mut agent = ScriptedTransport::new();
        agent
            .push_burst(&["SetDiscoveryFilter success"])
            .push_burst(&["Discovery started"])
            .push_burst(&[])
            .push_burst(&["Device AB:CD:EF:12:34:56 SomeRobot", "Device 11:22:33:44:55:66 Late"])
            .push_burst(&["Discovery stopped"]);

        let mut session = RobotSession::new(agent, &Settings::default());
        let address = discover(&mut session).await.unwrap();

        assert_eq!(address.to_string(), "AB:CD:EF:12:34:56");
        assert_eq!(session.address, Some(address));
        assert_eq!(
            session.transport().sent,
            vec![
                "set-scan-filter-uuids 6e400001-b5a3-f393-e0a9-e50e24dcca9e",
                "scan on",
                "scan off",
            ]
        );
        assert_eq!(session.transport().pending_bursts(), 0);
    }

    #[tokio::test]
    async fn test_discover_times_out_when_configured() {
        let mut settings = Settings::default();
        settings.robot.discovery_timeout_secs = Some(0);

        let mut agent = ScriptedTransport::new();
        agent.push_burst(&[]).push_burst(&["Discovery started"]);

        let mut session = RobotSession::new(agent, &settings);
        let err = discover(&mut session).await.unwrap_err();

        assert!(matches!(err, RobotError::DiscoveryTimedOut { secs: 0, .. }));
        assert!(session.address.is_none());
        assert!(session.transport().sent_starting_with("scan off").is_empty());
    }
}
