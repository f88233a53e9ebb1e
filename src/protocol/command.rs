//! Outgoing commands
//!
//! Every command is a single ASCII line; the session appends the newline.

use super::constants::{CMD_GET, CMD_INFO, CMD_SAVE, CMD_SET};
use crate::core::types::{ControlSlot, MessageType, TriggerMode};
use std::fmt;

/// Host to pedal command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Get,
    Info,
    Save,
    Set {
        index: usize,
        message_type: MessageType,
        value: u8,
        trigger_mode: TriggerMode,
        off_value: u8,
        on_value: u8,
    },
}

impl Command {
    /// `SET` carrying every field of `slot`
    pub fn set_slot(slot: &ControlSlot) -> Self {
        Command::Set {
            index: slot.index,
            message_type: slot.message_type,
            value: slot.message_value,
            trigger_mode: slot.trigger_mode,
            off_value: slot.off_value,
            on_value: slot.on_value,
        }
    }

    /// Line to send, without the trailing newline
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// Parse a command line as the firmware does.
    ///
    /// `SET` lines with four numeric fields are accepted (older firmware
    /// revisions had no off/on values); the range then defaults to `0..127`.
    pub fn parse(line: &str) -> Option<Command> {
        let mut parts = line.split_whitespace();
        let name = parts.next()?;
        match name {
            CMD_GET => Some(Command::Get),
            CMD_INFO => Some(Command::Info),
            CMD_SAVE => Some(Command::Save),
            CMD_SET => {
                let fields: Vec<&str> = parts.collect();
                if fields.len() < 4 {
                    return None;
                }
                let index = fields[0].parse::<usize>().ok()?;
                let message_type = MessageType::from_field(fields[1]);
                let value = fields[2].parse::<u8>().ok()?;
                let trigger_mode = TriggerMode::from_field(fields[3]);
                let (off_value, on_value) = if fields.len() >= 6 {
                    (fields[4].parse::<u8>().ok()?, fields[5].parse::<u8>().ok()?)
                } else {
                    (0, 127)
                };
                Some(Command::Set {
                    index,
                    message_type,
                    value,
                    trigger_mode,
                    off_value,
                    on_value,
                })
            }
            _ => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Get => write!(f, "{}", CMD_GET),
            Command::Info => write!(f, "{}", CMD_INFO),
            Command::Save => write!(f, "{}", CMD_SAVE),
            Command::Set {
                index,
                message_type,
                value,
                trigger_mode,
                off_value,
                on_value,
            } => write!(
                f,
                "{} {} {} {} {} {} {}",
                CMD_SET,
                index,
                message_type.code(),
                value,
                trigger_mode.code(),
                off_value,
                on_value
            ),
        }
    }
}
