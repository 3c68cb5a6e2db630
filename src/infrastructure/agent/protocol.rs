//! Control Agent Protocol
//!
//! Command lines understood by the line-oriented BLE control agent and the
//! parsers for the output lines this crate cares about.
//!
//! ## Relevant output
//!
//! ```text
//! [NEW] Device AB:CD:EF:12:34:56 RobotName
//! [NEW] Characteristic (Handle 0x0010)
//!         /org/bluez/hci0/dev_AB_CD_EF_12_34_56/service000c/char0010
//!         6e400002-b5a3-f393-e0a9-e50e24dcca9e
//! ```

use crate::domain::commands::MotorCommand;
use crate::domain::models::{AttributeHandle, DeviceAddress};

pub const SCAN_ON: &str = "scan on";
pub const SCAN_OFF: &str = "scan off";
pub const EXIT: &str = "exit";

pub fn set_scan_filter(service_uuid: &str) -> String {
    format!("set-scan-filter-uuids {}", service_uuid)
}

pub fn connect(address: &DeviceAddress) -> String {
    format!("connect {}", address)
}

pub fn select_attribute(handle: &AttributeHandle) -> String {
    format!("select-attribute {}", handle.as_str())
}

pub fn write(command: &MotorCommand) -> String {
    format!("write {}", command.to_hex())
}

pub fn disconnect(address: &DeviceAddress) -> String {
    format!("disconnect {}", address)
}

pub fn remove(address: &DeviceAddress) -> String {
    format!("remove {}", address)
}

/// Clean a raw output line the way a terminal would show it.
///
/// The agent redraws its prompt with `\r` and colours tags with ANSI
/// sequences; only the text after the last carriage return survives, and
/// escape sequences and other control bytes (except tab) are dropped.
pub fn normalize_line(raw: &str) -> String {
    let visible = raw
        .trim_end_matches(['\r', '\n'])
        .rsplit('\r')
        .next()
        .unwrap_or_default();

    let mut out = String::with_capacity(visible.len());
    let mut chars = visible.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\x1b' {
            // CSI: ESC [ params... final byte in '@'..='~'
            if chars.peek() == Some(&'[') {
                chars.next();
                for c in chars.by_ref() {
                    if ('@'..='~').contains(&c) {
                        break;
                    }
                }
            } else {
                chars.next();
            }
        } else if c == '\t' || !c.is_control() {
            out.push(c);
        }
    }
    out
}

/// Address from a `Device <AA:BB:CC:DD:EE:FF>` announcement
pub fn parse_device_announcement(line: &str) -> Option<DeviceAddress> {
    let mut tokens = line.split_whitespace();
    while let Some(token) = tokens.next() {
        if token == "Device" {
            if let Some(address) = tokens.clone().next().and_then(|t| t.parse().ok()) {
                return Some(address);
            }
        }
    }
    None
}

/// True if the line ends with the characteristic UUID (case-insensitive)
pub fn announces_characteristic(line: &str, char_uuid: &str) -> bool {
    let line = line.trim_end();
    let uuid = char_uuid.trim();
    !uuid.is_empty()
        && line.len() >= uuid.len()
        && line.is_char_boundary(line.len() - uuid.len())
        && line[line.len() - uuid.len()..].eq_ignore_ascii_case(uuid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::commands::{CommandCatalog, Direction};

    const RX_UUID: &str = "6e400002-b5a3-f393-e0a9-e50e24dcca9e";

    #[test]
    fn test_command_lines() {
        let addr: DeviceAddress = "AB:CD:EF:12:34:56".parse().unwrap();
        assert_eq!(connect(&addr), "connect AB:CD:EF:12:34:56");
        assert_eq!(disconnect(&addr), "disconnect AB:CD:EF:12:34:56");
        assert_eq!(remove(&addr), "remove AB:CD:EF:12:34:56");
        assert_eq!(
            set_scan_filter("6e400001-b5a3-f393-e0a9-e50e24dcca9e"),
            "set-scan-filter-uuids 6e400001-b5a3-f393-e0a9-e50e24dcca9e"
        );

        let handle = AttributeHandle::from_line("/org/bluez/hci0/char0010").unwrap();
        assert_eq!(
            select_attribute(&handle),
            "select-attribute /org/bluez/hci0/char0010"
        );

        let catalog = CommandCatalog::new();
        let line = write(catalog.get(Direction::Stop));
        assert!(line.starts_with("write 0x01 0x02 "));
    }

    #[test]
    fn test_normalize_strips_colour_and_prompt() {
        let raw = "[bluetooth]# \r\x1b[K[\x1b[0;92mNEW\x1b[0m] Device AB:CD:EF:12:34:56 Robot\r\n";
        assert_eq!(normalize_line(raw), "[NEW] Device AB:CD:EF:12:34:56 Robot");
    }

    #[test]
    fn test_normalize_keeps_indentation() {
        assert_eq!(
            normalize_line("\t/org/bluez/hci0/char0010"),
            "\t/org/bluez/hci0/char0010"
        );
        assert_eq!(normalize_line("\x01[bluetooth]\x02# "), "[bluetooth]# ");
    }

    #[test]
    fn test_device_announcement() {
        let addr = parse_device_announcement("Device AB:CD:EF:12:34:56 SomeRobot").unwrap();
        assert_eq!(addr.to_string(), "AB:CD:EF:12:34:56");

        let addr = parse_device_announcement("[CHG] Device 00:11:22:33:44:55 RSSI: -60").unwrap();
        assert_eq!(addr.to_string(), "00:11:22:33:44:55");
    }

    #[test]
    fn test_non_announcements() {
        assert!(parse_device_announcement("Discovery started").is_none());
        assert!(parse_device_announcement("SetDiscoveryFilter success").is_none());
        assert!(parse_device_announcement("Device not available").is_none());
        assert!(parse_device_announcement("AB:CD:EF:12:34:56").is_none());
    }

    #[test]
    fn test_characteristic_announcement() {
        assert!(announces_characteristic(
            "\t6e400002-b5a3-f393-e0a9-e50e24dcca9e",
            RX_UUID
        ));
        assert!(announces_characteristic(
            "  6E400002-B5A3-F393-E0A9-E50E24DCCA9E  ",
            RX_UUID
        ));
        assert!(!announces_characteristic(
            "\t6e400003-b5a3-f393-e0a9-e50e24dcca9e",
            RX_UUID
        ));
        assert!(!announces_characteristic(
            "6e400002-b5a3-f393-e0a9-e50e24dcca9e Nordic UART RX",
            RX_UUID
        ));
        assert!(!announces_characteristic("short", RX_UUID));
    }
}
