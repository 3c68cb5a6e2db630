//! Motor Command Catalog
//!
//! Fixed binary frames understood by the robot's motor controller.
//!
//! # Frame Structure (20 bytes)
//!
//! ```text
//! [0]     : Device id
//! [1]     : Command id
//! [2-3]   : Reserved (zero)
//! [4-7]   : Left wheel speed (i32 little-endian)
//! [8-11]  : Right wheel speed (i32 little-endian)
//! [12-18] : Reserved (zero)
//! [19]    : Checksum, sum of all 20 bytes is 0 modulo 256
//! ```

use std::fmt;

/// Motor controller device id
pub const DEVICE_ID: u8 = 0x01;

/// Differential drive command id
pub const DRIVE_COMMAND_ID: u8 = 0x02;

/// Total frame length including the checksum trailer
pub const FRAME_LEN: usize = 20;

/// Wheel speed used for every moving command
pub const DRIVE_SPEED: i32 = 100;

const LEFT_SPEED_OFFSET: usize = 4;
const RIGHT_SPEED_OFFSET: usize = 8;

/// Logical drive direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Forward,
    Back,
    Left,
    Right,
    Stop,
}

impl Direction {
    pub const ALL: [Direction; 5] = [
        Direction::Forward,
        Direction::Back,
        Direction::Left,
        Direction::Right,
        Direction::Stop,
    ];

    /// Operator-facing label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Forward => "forward",
            Self::Back => "back",
            Self::Left => "left",
            Self::Right => "right",
            Self::Stop => "stop",
        }
    }

    /// Left and right wheel speeds
    pub fn wheel_speeds(&self) -> (i32, i32) {
        match self {
            Self::Forward => (DRIVE_SPEED, DRIVE_SPEED),
            Self::Back => (-DRIVE_SPEED, -DRIVE_SPEED),
            Self::Left => (-DRIVE_SPEED, DRIVE_SPEED),
            Self::Right => (DRIVE_SPEED, -DRIVE_SPEED),
            Self::Stop => (0, 0),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Two's-complement additive checksum: the byte that makes the total sum 0 mod 256
pub fn checksum(bytes: &[u8]) -> u8 {
    let sum = bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    sum.wrapping_neg()
}

/// An immutable motor command frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MotorCommand {
    direction: Direction,
    frame: [u8; FRAME_LEN],
}

impl MotorCommand {
    fn build(direction: Direction) -> Self {
        let (left, right) = direction.wheel_speeds();

        let mut frame = [0u8; FRAME_LEN];
        frame[0] = DEVICE_ID;
        frame[1] = DRIVE_COMMAND_ID;
        frame[LEFT_SPEED_OFFSET..LEFT_SPEED_OFFSET + 4].copy_from_slice(&left.to_le_bytes());
        frame[RIGHT_SPEED_OFFSET..RIGHT_SPEED_OFFSET + 4].copy_from_slice(&right.to_le_bytes());
        frame[FRAME_LEN - 1] = checksum(&frame[..FRAME_LEN - 1]);

        Self { direction, frame }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.frame
    }

    pub fn left_speed(&self) -> i32 {
        read_i32_le(&self.frame, LEFT_SPEED_OFFSET)
    }

    pub fn right_speed(&self) -> i32 {
        read_i32_le(&self.frame, RIGHT_SPEED_OFFSET)
    }

    /// True when the byte sum of the whole frame is 0 modulo 256
    pub fn is_checksum_valid(&self) -> bool {
        self.frame.iter().fold(0u8, |acc, b| acc.wrapping_add(*b)) == 0
    }

    /// Space-separated `0x..` literals, the form the agent's `write` expects
    pub fn to_hex(&self) -> String {
        self.as_bytes()
            .iter()
            .map(|b| format!("0x{:02x}", b))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn read_i32_le(frame: &[u8; FRAME_LEN], offset: usize) -> i32 {
    i32::from_le_bytes([
        frame[offset],
        frame[offset + 1],
        frame[offset + 2],
        frame[offset + 3],
    ])
}

/// The five drive frames, built once at startup
#[derive(Debug, Clone)]
pub struct CommandCatalog {
    commands: [MotorCommand; 5],
}

impl CommandCatalog {
    pub fn new() -> Self {
        let commands = Direction::ALL.map(MotorCommand::build);

        // A frame failing this is a bug in `build`, not a runtime condition.
        for command in &commands {
            assert!(
                command.is_checksum_valid(),
                "checksum invariant broken for {} frame",
                command.direction()
            );
        }

        Self { commands }
    }

    pub fn get(&self, direction: Direction) -> &MotorCommand {
        // Indices follow the order of `Direction::ALL`
        let index = match direction {
            Direction::Forward => 0,
            Direction::Back => 1,
            Direction::Left => 2,
            Direction::Right => 3,
            Direction::Stop => 4,
        };
        &self.commands[index]
    }
}

impl Default for CommandCatalog {
    fn default() -> Self {
        Self::new()
    }
}
