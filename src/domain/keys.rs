//! Key Decoding
//!
//! Turns raw terminal bytes into drive actions. Arrow keys arrive as
//! `ESC [ A..D`; the decoder consumes exactly two bytes after an escape.
//! A multi-byte UTF-8 character counts as one key.

use crate::domain::commands::Direction;

pub const ESCAPE: u8 = 0x1B;

/// Ctrl-C as delivered by a terminal in raw mode
pub const INTERRUPT: u8 = 0x03;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// Send the frame for this direction
    Drive(Direction),
    /// Escape sequence that is not an arrow key; nothing is sent
    Ignored,
    /// Operator asked to end the session
    Interrupt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecoderState {
    AwaitKey,
    AwaitEscapeSequence { first: Option<u8> },
    AwaitContinuation { remaining: u8 },
}

#[derive(Debug)]
pub struct KeyDecoder {
    state: DecoderState,
}

impl KeyDecoder {
    pub fn new() -> Self {
        Self {
            state: DecoderState::AwaitKey,
        }
    }

    /// Feed one byte; returns an action once a complete key has been read
    pub fn feed(&mut self, byte: u8) -> Option<KeyAction> {
        if byte == INTERRUPT {
            self.state = DecoderState::AwaitKey;
            return Some(KeyAction::Interrupt);
        }

        match self.state {
            DecoderState::AwaitKey => {
                if byte == ESCAPE {
                    self.state = DecoderState::AwaitEscapeSequence { first: None };
                    return None;
                }
                match utf8_continuations(byte) {
                    0 => Some(KeyAction::Drive(Direction::Stop)),
                    remaining => {
                        self.state = DecoderState::AwaitContinuation { remaining };
                        None
                    }
                }
            }
            DecoderState::AwaitContinuation { remaining } => {
                if !is_continuation(byte) {
                    // Truncated character; drop it and decode this byte afresh
                    self.state = DecoderState::AwaitKey;
                    return self.feed(byte);
                }
                if remaining > 1 {
                    self.state = DecoderState::AwaitContinuation {
                        remaining: remaining - 1,
                    };
                    None
                } else {
                    self.state = DecoderState::AwaitKey;
                    Some(KeyAction::Drive(Direction::Stop))
                }
            }
            DecoderState::AwaitEscapeSequence { first: None } => {
                self.state = DecoderState::AwaitEscapeSequence { first: Some(byte) };
                None
            }
            DecoderState::AwaitEscapeSequence { first: Some(first) } => {
                self.state = DecoderState::AwaitKey;
                Some(match arrow_direction([first, byte]) {
                    Some(direction) => KeyAction::Drive(direction),
                    None => KeyAction::Ignored,
                })
            }
        }
    }
}

impl Default for KeyDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Continuation bytes that follow a UTF-8 lead byte
fn utf8_continuations(byte: u8) -> u8 {
    match byte {
        0xC0..=0xDF => 1,
        0xE0..=0xEF => 2,
        0xF0..=0xF7 => 3,
        _ => 0,
    }
}

fn is_continuation(byte: u8) -> bool {
    byte & 0xC0 == 0x80
}

fn arrow_direction(code: [u8; 2]) -> Option<Direction> {
    match &code {
        b"[A" => Some(Direction::Forward),
        b"[B" => Some(Direction::Back),
        b"[C" => Some(Direction::Right),
        b"[D" => Some(Direction::Left),
        _ => None,
    }
}
