//! Response line decoding
//!
//! Every line from the pedal is classified by prefix. Lines that match no
//! known prefix, or whose numeric fields do not parse, are dropped: the
//! firmware prints debug chatter on the same port and one bad line must not
//! abort a whole dump.

use super::constants::{
    BUTTON_MIN_FIELDS, BUTTON_RANGE_FIELDS, FIELD_SEPARATOR, GET_COMPLETE, PREFIX_BUTTON,
    PREFIX_CONTROLS, PREFIX_SLOT_TYPE, SLOT_TYPE_MIN_FIELDS,
};
use crate::core::types::{Capability, ControlSlot, MIDI_MAX, MessageType, TriggerMode};

/// One `BTN:` line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonRecord {
    pub index: usize,
    pub message_type: MessageType,
    pub value: u8,
    pub trigger_mode: TriggerMode,
    pub off_value: u8,
    pub on_value: u8,
}

impl ButtonRecord {
    /// Record describing `slot`, as the firmware would print it
    pub fn from_slot(slot: &ControlSlot) -> Self {
        Self {
            index: slot.index,
            message_type: slot.message_type,
            value: slot.message_value,
            trigger_mode: slot.trigger_mode,
            off_value: slot.off_value,
            on_value: slot.on_value,
        }
    }

    /// Slot carrying this record's settings and the given capability
    pub fn to_slot(&self, capability: Capability) -> ControlSlot {
        ControlSlot {
            index: self.index,
            message_type: self.message_type,
            message_value: self.value,
            trigger_mode: self.trigger_mode,
            off_value: self.off_value,
            on_value: self.on_value,
            capability,
        }
    }

    /// Full seven-field `BTN:` line
    pub fn encode(&self) -> String {
        format!(
            "{}{}:{}:{}:{}:{}:{}",
            PREFIX_BUTTON,
            self.index,
            self.message_type.code(),
            self.value,
            self.trigger_mode.code(),
            self.off_value,
            self.on_value
        )
    }
}

/// A decoded response line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolRecord {
    /// `BTN:<idx>:<type>:<value>:<mode>[:<off>:<on>]`
    Button(ButtonRecord),
    /// `SYS:CONTROLS:<n>`, controls per layer
    ControlCount(usize),
    /// `SYS:TYPE:<idx>:<kind>`; `kind` is kept verbatim
    SlotType { index: usize, kind: String },
    /// `OK: GET`
    Completion,
}

/// Decode one line. Returns `None` for unknown or malformed lines.
pub fn decode_line(line: &str) -> Option<ProtocolRecord> {
    let line = line.trim();

    if line == GET_COMPLETE {
        return Some(ProtocolRecord::Completion);
    }

    if line.starts_with(PREFIX_BUTTON) {
        return decode_button(line).map(ProtocolRecord::Button);
    }

    if let Some(count) = line.strip_prefix(PREFIX_CONTROLS) {
        return match count.trim().parse::<usize>() {
            Ok(n) if n > 0 => Some(ProtocolRecord::ControlCount(n)),
            _ => {
                log::debug!("Ignoring control count line: {:?}", line);
                None
            }
        };
    }

    if line.starts_with(PREFIX_SLOT_TYPE) {
        let fields: Vec<&str> = line.split(FIELD_SEPARATOR).collect();
        if fields.len() < SLOT_TYPE_MIN_FIELDS {
            log::debug!("Short slot type line: {:?}", line);
            return None;
        }
        let index = parse_field::<usize>(fields[2], line)?;
        return Some(ProtocolRecord::SlotType {
            index,
            kind: fields[3].trim().to_string(),
        });
    }

    if !line.is_empty() {
        log::trace!("Unrecognised line: {:?}", line);
    }
    None
}

/// Decode a batch of lines, keeping the order of the recognised ones
pub fn decode_all<S: AsRef<str>>(lines: &[S]) -> Vec<ProtocolRecord> {
    lines
        .iter()
        .filter_map(|line| decode_line(line.as_ref()))
        .collect()
}

fn decode_button(line: &str) -> Option<ButtonRecord> {
    let fields: Vec<&str> = line.split(FIELD_SEPARATOR).collect();
    if fields.len() < BUTTON_MIN_FIELDS {
        log::debug!("Short button line: {:?}", line);
        return None;
    }

    let index = parse_field::<usize>(fields[1], line)?;
    let value = parse_midi(fields[3], line)?;
    let (off_value, on_value) = if fields.len() >= BUTTON_RANGE_FIELDS {
        (parse_midi(fields[5], line)?, parse_midi(fields[6], line)?)
    } else {
        (0, MIDI_MAX)
    };

    Some(ButtonRecord {
        index,
        message_type: MessageType::from_field(fields[2]),
        value,
        trigger_mode: TriggerMode::from_field(fields[4]),
        off_value,
        on_value,
    })
}

fn parse_field<T: std::str::FromStr>(field: &str, line: &str) -> Option<T> {
    match field.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            log::debug!("Malformed field {:?} in {:?}", field, line);
            None
        }
    }
}

fn parse_midi(field: &str, line: &str) -> Option<u8> {
    let value = parse_field::<u8>(field, line)?;
    if value > MIDI_MAX {
        log::debug!("Value {} out of MIDI range in {:?}", value, line);
        return None;
    }
    Some(value)
}
