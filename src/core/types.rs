//! Core data types for the pedal configuration model.
//!
//! - [`ControlSlot`]: One mapped control position (button or potentiometer)
//! - [`CapabilityMap`]: Hardware capability per local slot, shared by all layers
//! - [`MessageType`], [`TriggerMode`], [`Capability`]: Slot field enums

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Number of selectable layers (three-position switch)
pub const LAYER_COUNT: usize = 3;

/// Controls per layer on the stock pedal (five footswitches)
pub const DEFAULT_SLOTS_PER_LAYER: usize = 5;

/// Widest layer accepted from the device. Larger counts or slot indices
/// are treated as line noise.
pub const MAX_SLOTS_PER_LAYER: usize = 64;

/// Highest value a MIDI data byte can carry
pub const MIDI_MAX: u8 = 127;

/// Note number assigned to slot 0 when a slot is created with defaults
pub const DEFAULT_NOTE_BASE: u8 = 60;

/// MIDI message sent by a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageType {
    #[default]
    Note,
    ControlChange,
}

impl MessageType {
    /// Wire code used in `SET` and `BTN:` lines
    pub fn code(self) -> u8 {
        match self {
            MessageType::Note => 0,
            MessageType::ControlChange => 1,
        }
    }

    /// Decode a wire field: `"1"` is ControlChange, anything else Note
    pub fn from_field(field: &str) -> Self {
        if field.trim() == "1" {
            MessageType::ControlChange
        } else {
            MessageType::Note
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageType::Note => write!(f, "Note"),
            MessageType::ControlChange => write!(f, "CC"),
        }
    }
}

impl FromStr for MessageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "note" | "0" => Ok(MessageType::Note),
            "cc" | "controlchange" | "control_change" | "1" => Ok(MessageType::ControlChange),
            other => Err(format!("unknown message type '{}'", other)),
        }
    }
}

/// Button trigger behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriggerMode {
    /// ON while held, OFF on release
    #[default]
    Momentary,
    /// Latches between ON and OFF on each press
    Toggle,
}

impl TriggerMode {
    /// Wire code used in `SET` and `BTN:` lines
    pub fn code(self) -> u8 {
        match self {
            TriggerMode::Momentary => 0,
            TriggerMode::Toggle => 1,
        }
    }

    /// Decode a wire field: `"1"` is Toggle, anything else Momentary
    pub fn from_field(field: &str) -> Self {
        if field.trim() == "1" {
            TriggerMode::Toggle
        } else {
            TriggerMode::Momentary
        }
    }
}

impl fmt::Display for TriggerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerMode::Momentary => write!(f, "Momentary"),
            TriggerMode::Toggle => write!(f, "Toggle"),
        }
    }
}

impl FromStr for TriggerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "momentary" | "0" => Ok(TriggerMode::Momentary),
            "toggle" | "1" => Ok(TriggerMode::Toggle),
            other => Err(format!("unknown trigger mode '{}'", other)),
        }
    }
}

/// Physical kind of control at a slot position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Capability {
    #[default]
    Button,
    Potentiometer,
}

impl Capability {
    /// Parse the kind field of a `SYS:TYPE:` line
    pub fn from_kind(kind: &str) -> Option<Self> {
        match kind.trim() {
            "BTN" => Some(Capability::Button),
            "POT" => Some(Capability::Potentiometer),
            _ => None,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Button => write!(f, "BTN"),
            Capability::Potentiometer => write!(f, "POT"),
        }
    }
}

/// One mapped control position.
///
/// `off_value`/`on_value` are what a button transmits on release and press;
/// they carry no meaning for a potentiometer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlSlot {
    pub index: usize,
    pub message_type: MessageType,
    pub message_value: u8,
    pub trigger_mode: TriggerMode,
    pub off_value: u8,
    pub on_value: u8,
    pub capability: Capability,
}

impl ControlSlot {
    /// Slot as created on (re)size: `Note`, value `60 + index`, `Momentary`, `0..127`
    pub fn with_defaults(index: usize) -> Self {
        let value = (DEFAULT_NOTE_BASE as usize + index).min(MIDI_MAX as usize) as u8;
        Self {
            index,
            message_type: MessageType::Note,
            message_value: value,
            trigger_mode: TriggerMode::Momentary,
            off_value: 0,
            on_value: MIDI_MAX,
            capability: Capability::Button,
        }
    }

    /// Layer this slot belongs to
    pub fn layer(&self, slots_per_layer: usize) -> usize {
        if slots_per_layer == 0 {
            0
        } else {
            self.index / slots_per_layer
        }
    }

    /// Position within its layer
    pub fn local_index(&self, slots_per_layer: usize) -> usize {
        if slots_per_layer == 0 {
            self.index
        } else {
            self.index % slots_per_layer
        }
    }
}

/// Capability per local slot index, filled from `INFO` responses.
///
/// Missing entries read as [`Capability::Button`]. Indices beyond the current
/// layer width are kept; they apply once the layout grows to include them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilityMap {
    entries: BTreeMap<usize, Capability>,
}

impl CapabilityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capability at a local index
    pub fn get(&self, local_index: usize) -> Capability {
        self.entries.get(&local_index).copied().unwrap_or_default()
    }

    /// Record a capability reported by the device
    pub fn insert(&mut self, local_index: usize, capability: Capability) {
        self.entries.insert(local_index, capability);
    }

    /// Number of explicit entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Explicit entries in local index order
    pub fn iter(&self) -> impl Iterator<Item = (usize, Capability)> + '_ {
        self.entries.iter().map(|(&i, &c)| (i, c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_defaults() {
        let slot = ControlSlot::with_defaults(7);
        assert_eq!(slot.index, 7);
        assert_eq!(slot.message_type, MessageType::Note);
        assert_eq!(slot.message_value, 67);
        assert_eq!(slot.trigger_mode, TriggerMode::Momentary);
        assert_eq!(slot.off_value, 0);
        assert_eq!(slot.on_value, 127);
        assert_eq!(slot.capability, Capability::Button);
    }

    #[test]
    fn test_slot_default_value_saturates() {
        assert_eq!(ControlSlot::with_defaults(67).message_value, 127);
        assert_eq!(ControlSlot::with_defaults(200).message_value, 127);
    }

    #[test]
    fn test_layer_and_local_index() {
        let slot = ControlSlot::with_defaults(12);
        assert_eq!(slot.layer(5), 2);
        assert_eq!(slot.local_index(5), 2);
    }

    #[test]
    fn test_wire_fields() {
        assert_eq!(MessageType::from_field("1"), MessageType::ControlChange);
        assert_eq!(MessageType::from_field("0"), MessageType::Note);
        assert_eq!(MessageType::from_field("7"), MessageType::Note);
        assert_eq!(TriggerMode::from_field("1"), TriggerMode::Toggle);
        assert_eq!(TriggerMode::from_field(""), TriggerMode::Momentary);
    }

    #[test]
    fn test_capability_map_defaults_to_button() {
        let mut caps = CapabilityMap::new();
        assert_eq!(caps.get(3), Capability::Button);
        caps.insert(3, Capability::Potentiometer);
        assert_eq!(caps.get(3), Capability::Potentiometer);
        assert_eq!(caps.len(), 1);
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("cc".parse::<MessageType>(), Ok(MessageType::ControlChange));
        assert_eq!("Toggle".parse::<TriggerMode>(), Ok(TriggerMode::Toggle));
        assert!("pitch".parse::<MessageType>().is_err());
        assert_eq!(Capability::from_kind("POT"), Some(Capability::Potentiometer));
        assert_eq!(Capability::from_kind("ENC"), None);
    }
}
