//! Working slot table and layer layout
//!
//! The table always holds `LAYER_COUNT × slots_per_layer` slots ordered by
//! index. The width comes from two places: `INFO` reports a control count,
//! and a `GET` dump implies one through its highest slot index. The dump
//! reflects what the firmware actually stores, so it wins when they differ.

use crate::core::types::{
    Capability, CapabilityMap, ControlSlot, DEFAULT_SLOTS_PER_LAYER, LAYER_COUNT,
    MAX_SLOTS_PER_LAYER, MIDI_MAX, MessageType, TriggerMode,
};
use crate::error::{Error, Result};
use crate::protocol::ProtocolRecord;
use std::fmt;
use std::str::FromStr;

/// Slots per layer implied by the highest observed slot index, or `None`
/// when that width exceeds [`MAX_SLOTS_PER_LAYER`]
pub fn detected_per_layer(max_index: usize) -> Option<usize> {
    let width = max_index.checked_add(1)?.div_ceil(LAYER_COUNT);
    (width <= MAX_SLOTS_PER_LAYER).then_some(width)
}

/// What an `INFO` response changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InfoOutcome {
    /// Control count reported, if any
    pub reported: Option<usize>,
    /// Whether the table was resized
    pub resized: bool,
    /// Number of capability entries recorded
    pub capabilities: usize,
}

/// What a `GET` dump changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadOutcome {
    /// Button records applied
    pub records: usize,
    /// Whether the table was resized
    pub resized: bool,
    /// Whether the dump ended with `OK: GET`
    pub completed: bool,
}

/// One editable slot field with its new value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotField {
    MessageType(MessageType),
    Value(u8),
    TriggerMode(TriggerMode),
    OffValue(u8),
    OnValue(u8),
}

impl SlotField {
    fn apply(self, slot: &mut ControlSlot) -> Result<()> {
        let check = |v: u8, what: &str| {
            if v > MIDI_MAX {
                Err(Error::InvalidParameter(format!(
                    "{} {} out of range 0..{}",
                    what, v, MIDI_MAX
                )))
            } else {
                Ok(v)
            }
        };
        match self {
            SlotField::MessageType(t) => slot.message_type = t,
            SlotField::Value(v) => slot.message_value = check(v, "value")?,
            SlotField::TriggerMode(m) => slot.trigger_mode = m,
            SlotField::OffValue(v) => slot.off_value = check(v, "off value")?,
            SlotField::OnValue(v) => slot.on_value = check(v, "on value")?,
        }
        Ok(())
    }
}

impl FromStr for SlotField {
    type Err = Error;

    /// Parse `field=value`, e.g. `type=cc`, `value=74`, `mode=toggle`, `on=100`
    fn from_str(s: &str) -> Result<Self> {
        let (name, value) = s
            .split_once('=')
            .ok_or_else(|| Error::InvalidParameter(format!("expected field=value, got '{}'", s)))?;
        let value = value.trim();
        let number = || {
            value
                .parse::<u8>()
                .map_err(|_| Error::InvalidParameter(format!("'{}' is not a MIDI value", value)))
        };
        match name.trim().to_ascii_lowercase().as_str() {
            "type" | "message_type" => value
                .parse()
                .map(SlotField::MessageType)
                .map_err(Error::InvalidParameter),
            "value" | "message_value" => number().map(SlotField::Value),
            "mode" | "trigger_mode" => value
                .parse()
                .map(SlotField::TriggerMode)
                .map_err(Error::InvalidParameter),
            "off" | "off_value" | "min" => number().map(SlotField::OffValue),
            "on" | "on_value" | "max" => number().map(SlotField::OnValue),
            other => Err(Error::InvalidParameter(format!("unknown field '{}'", other))),
        }
    }
}

impl fmt::Display for SlotField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotField::MessageType(t) => write!(f, "type={}", t),
            SlotField::Value(v) => write!(f, "value={}", v),
            SlotField::TriggerMode(m) => write!(f, "mode={}", m),
            SlotField::OffValue(v) => write!(f, "off={}", v),
            SlotField::OnValue(v) => write!(f, "on={}", v),
        }
    }
}

/// Slot table plus the capability map that decorates it
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    slots_per_layer: usize,
    slots: Vec<ControlSlot>,
    capabilities: CapabilityMap,
    /// Control count from the last `INFO`, if one was answered
    reported_per_layer: Option<usize>,
    capabilities_stale: bool,
}

impl Default for Layout {
    fn default() -> Self {
        Self::new(DEFAULT_SLOTS_PER_LAYER)
    }
}

impl Layout {
    /// Default-filled table; a width of zero is raised to one
    pub fn new(slots_per_layer: usize) -> Self {
        let slots_per_layer = slots_per_layer.max(1);
        Self {
            slots_per_layer,
            slots: (0..LAYER_COUNT * slots_per_layer)
                .map(ControlSlot::with_defaults)
                .collect(),
            capabilities: CapabilityMap::new(),
            reported_per_layer: None,
            capabilities_stale: false,
        }
    }

    pub fn slots_per_layer(&self) -> usize {
        self.slots_per_layer
    }

    pub fn total_slots(&self) -> usize {
        self.slots.len()
    }

    pub fn slots(&self) -> &[ControlSlot] {
        &self.slots
    }

    pub fn slot(&self, index: usize) -> Option<&ControlSlot> {
        self.slots.get(index)
    }

    pub fn capabilities(&self) -> &CapabilityMap {
        &self.capabilities
    }

    /// True when a `GET` dump contradicted the width the capability map was
    /// reported for. Cleared by the next `INFO`.
    pub fn capabilities_stale(&self) -> bool {
        self.capabilities_stale
    }

    /// Change the width. Slots that exist at both sizes keep their settings;
    /// new ones get defaults. Returns whether anything changed.
    pub fn resize(&mut self, slots_per_layer: usize) -> bool {
        let slots_per_layer = slots_per_layer.max(1);
        if slots_per_layer == self.slots_per_layer {
            return false;
        }

        let total = LAYER_COUNT * slots_per_layer;
        log::debug!(
            "Resizing layout {} -> {} per layer ({} slots)",
            self.slots_per_layer,
            slots_per_layer,
            total
        );
        self.slots.truncate(total);
        let start = self.slots.len();
        self.slots.extend((start..total).map(ControlSlot::with_defaults));
        self.slots_per_layer = slots_per_layer;
        self.refresh_capabilities();
        true
    }

    /// Replace the table with defaults at a new width
    fn reset(&mut self, slots_per_layer: usize) {
        log::debug!(
            "Rebuilding layout {} -> {} per layer from device dump",
            self.slots_per_layer,
            slots_per_layer
        );
        self.slots_per_layer = slots_per_layer;
        self.slots = (0..LAYER_COUNT * slots_per_layer)
            .map(ControlSlot::with_defaults)
            .collect();
        self.refresh_capabilities();
    }

    /// Apply decoded `INFO` records
    pub fn apply_info(&mut self, records: &[ProtocolRecord]) -> InfoOutcome {
        let mut outcome = InfoOutcome::default();

        for record in records {
            match record {
                ProtocolRecord::ControlCount(n) if *n > MAX_SLOTS_PER_LAYER => {
                    log::debug!("Ignoring control count {} above {}", n, MAX_SLOTS_PER_LAYER)
                }
                ProtocolRecord::ControlCount(n) => outcome.reported = Some(*n),
                ProtocolRecord::SlotType { index, kind } => match Capability::from_kind(kind) {
                    Some(capability) => {
                        self.capabilities.insert(*index, capability);
                        outcome.capabilities += 1;
                    }
                    None => log::debug!("Unknown control kind {:?} at slot {}", kind, index),
                },
                _ => {}
            }
        }

        if let Some(n) = outcome.reported {
            self.reported_per_layer = Some(n);
            self.capabilities_stale = false;
            outcome.resized = self.resize(n);
        }
        if outcome.capabilities > 0 {
            self.refresh_capabilities();
        }
        outcome
    }

    /// Apply a decoded `GET` dump.
    ///
    /// With no button records the table is left alone. Otherwise the width
    /// follows the highest index seen. A width change starts from a fresh
    /// default table, then every record overwrites its slot. Applying the
    /// same dump twice gives the same table.
    pub fn apply_dump(&mut self, records: &[ProtocolRecord]) -> LoadOutcome {
        let limit = LAYER_COUNT * MAX_SLOTS_PER_LAYER;
        let buttons: Vec<_> = records
            .iter()
            .filter_map(|r| match r {
                ProtocolRecord::Button(b) if b.index >= limit => {
                    log::debug!("Dropping button record for slot {} (limit {})", b.index, limit);
                    None
                }
                ProtocolRecord::Button(b) => Some(*b),
                _ => None,
            })
            .collect();
        let mut outcome = LoadOutcome {
            completed: records.iter().any(|r| *r == ProtocolRecord::Completion),
            ..LoadOutcome::default()
        };

        let Some(max_index) = buttons.iter().map(|b| b.index).max() else {
            return outcome;
        };

        let Some(detected) = detected_per_layer(max_index) else {
            return outcome;
        };
        if detected != self.slots_per_layer {
            if let Some(reported) = self.reported_per_layer {
                if reported != detected {
                    log::warn!(
                        "Device dump implies {} controls per layer but INFO reported {}; \
                         capability map may be stale",
                        detected,
                        reported
                    );
                    self.capabilities_stale = true;
                }
            }
            self.reset(detected);
            outcome.resized = true;
        }

        for record in &buttons {
            let capability = self.capabilities.get(record.index % self.slots_per_layer);
            if let Some(slot) = self.slots.get_mut(record.index) {
                *slot = record.to_slot(capability);
                outcome.records += 1;
            }
        }
        outcome
    }

    /// Edit one field of one slot
    pub fn update_slot(&mut self, index: usize, field: SlotField) -> Result<()> {
        let total = self.slots.len();
        let slot = self.slots.get_mut(index).ok_or_else(|| {
            Error::InvalidParameter(format!("slot {} out of range 0..{}", index, total))
        })?;
        field.apply(slot)
    }

    fn refresh_capabilities(&mut self) {
        let spl = self.slots_per_layer;
        for slot in &mut self.slots {
            slot.capability = self.capabilities.get(slot.index % spl);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::decode_all;

    fn dump(lines: &[&str]) -> Vec<ProtocolRecord> {
        decode_all(lines)
    }

    #[test]
    fn test_detected_per_layer() {
        assert_eq!(detected_per_layer(0), Some(1));
        assert_eq!(detected_per_layer(2), Some(1));
        assert_eq!(detected_per_layer(3), Some(2));
        assert_eq!(detected_per_layer(14), Some(5));
        assert_eq!(detected_per_layer(20), Some(7));
        assert_eq!(detected_per_layer(LAYER_COUNT * MAX_SLOTS_PER_LAYER - 1), Some(64));
        assert_eq!(detected_per_layer(LAYER_COUNT * MAX_SLOTS_PER_LAYER), None);
        assert_eq!(detected_per_layer(usize::MAX), None);
    }

    #[test]
    fn test_default_layout() {
        let layout = Layout::default();
        assert_eq!(layout.slots_per_layer(), 5);
        assert_eq!(layout.total_slots(), 15);
        assert_eq!(layout.slot(14).map(|s| s.message_value), Some(74));
    }

    #[test]
    fn test_resize_preserves_by_index() {
        let mut layout = Layout::default();
        layout.update_slot(3, SlotField::Value(11)).unwrap();
        layout
            .update_slot(14, SlotField::MessageType(MessageType::ControlChange))
            .unwrap();

        assert!(layout.resize(7));
        assert_eq!(layout.total_slots(), 21);
        assert_eq!(layout.slot(3).unwrap().message_value, 11);
        assert_eq!(
            layout.slot(14).unwrap().message_type,
            MessageType::ControlChange
        );
        for i in 15..21 {
            assert_eq!(*layout.slot(i).unwrap(), ControlSlot::with_defaults(i));
        }
        assert!(!layout.resize(7));
    }

    #[test]
    fn test_dump_resolution_is_idempotent() {
        let mut lines: Vec<String> = (0..15).map(|i| format!("BTN:{}:1:{}:1:0:127", i, i)).collect();
        lines.push("OK: GET".to_string());
        let records = decode_all(&lines);

        let mut layout = Layout::new(2);
        let first = layout.apply_dump(&records);
        let snapshot = layout.clone();
        let second = layout.apply_dump(&records);

        assert_eq!(layout.slots_per_layer(), 5);
        assert_eq!(layout, snapshot);
        assert!(first.resized);
        assert!(!second.resized);
        assert_eq!(second.records, 15);
        assert!(second.completed);
    }

    #[test]
    fn test_small_dump_shrinks_layout() {
        let mut layout = Layout::default();
        let outcome = layout.apply_dump(&dump(&[
            "BTN:0:0:60:0:0:127",
            "BTN:1:1:74:1:0:127",
            "OK: GET",
        ]));

        assert_eq!(outcome.records, 2);
        assert!(outcome.completed);
        assert_eq!(layout.slots_per_layer(), 1);
        assert_eq!(layout.total_slots(), 3);

        let s1 = layout.slot(1).unwrap();
        assert_eq!(s1.message_type, MessageType::ControlChange);
        assert_eq!(s1.message_value, 74);
        assert_eq!(s1.trigger_mode, TriggerMode::Toggle);
        assert_eq!(*layout.slot(2).unwrap(), ControlSlot::with_defaults(2));
    }

    #[test]
    fn test_width_change_discards_unlisted_slots() {
        let mut layout = Layout::default();
        layout.update_slot(2, SlotField::Value(11)).unwrap();

        let outcome = layout.apply_dump(&dump(&[
            "BTN:0:0:60:0",
            "BTN:1:0:61:0",
            "BTN:5:0:65:0",
            "OK: GET",
        ]));

        assert!(outcome.resized);
        assert_eq!(layout.slots_per_layer(), 2);
        assert_eq!(*layout.slot(2).unwrap(), ControlSlot::with_defaults(2));
        assert_eq!(layout.slot(2).unwrap().message_value, 62);
    }

    #[test]
    fn test_same_width_dump_keeps_unlisted_slots() {
        let mut layout = Layout::default();
        layout.update_slot(2, SlotField::Value(11)).unwrap();

        layout.apply_dump(&dump(&["BTN:0:0:60:0", "BTN:14:0:74:0", "OK: GET"]));
        assert_eq!(layout.slots_per_layer(), 5);
        assert_eq!(layout.slot(2).unwrap().message_value, 11);
    }

    #[test]
    fn test_out_of_range_indices_are_dropped() {
        let mut layout = Layout::default();
        let before = layout.clone();

        let outcome = layout.apply_dump(&dump(&["BTN:18446744073709551615:0:60:0"]));
        assert_eq!(outcome.records, 0);
        assert_eq!(layout, before);

        let outcome = layout.apply_dump(&dump(&["BTN:3000000:0:60:0", "BTN:4:1:20:0", "OK: GET"]));
        assert_eq!(outcome.records, 1);
        assert_eq!(layout.slots_per_layer(), 2);
        assert_eq!(layout.total_slots(), 6);
        assert_eq!(layout.slot(4).unwrap().message_value, 20);
    }

    #[test]
    fn test_oversized_control_count_ignored() {
        let mut layout = Layout::default();
        let outcome = layout.apply_info(&dump(&["SYS:CONTROLS:3000000", "SYS:TYPE:0:POT"]));
        assert_eq!(outcome.reported, None);
        assert!(!outcome.resized);
        assert_eq!(layout.total_slots(), 15);
        assert_eq!(layout.slot(0).unwrap().capability, Capability::Potentiometer);

        let outcome = layout.apply_info(&dump(&["SYS:CONTROLS:64"]));
        assert_eq!(outcome.reported, Some(64));
        assert_eq!(layout.total_slots(), 192);
    }

    #[test]
    fn test_empty_dump_leaves_layout() {
        let mut layout = Layout::default();
        layout.update_slot(0, SlotField::Value(1)).unwrap();
        let before = layout.clone();

        let outcome = layout.apply_dump(&dump(&["BTN:0:0:xx:0", "noise"]));
        assert_eq!(outcome, LoadOutcome::default());
        assert_eq!(layout, before);
    }

    #[test]
    fn test_info_sets_width_and_capabilities() {
        let mut layout = Layout::default();
        let outcome = layout.apply_info(&dump(&[
            "SYS:CONTROLS:4",
            "SYS:TYPE:0:BTN",
            "SYS:TYPE:3:POT",
            "SYS:TYPE:9:POT",
            "SYS:TYPE:1:ENC",
        ]));

        assert_eq!(outcome.reported, Some(4));
        assert!(outcome.resized);
        assert_eq!(outcome.capabilities, 3);
        assert_eq!(layout.total_slots(), 12);
        // Local index 3 in every layer
        for index in [3, 7, 11] {
            assert_eq!(layout.slot(index).unwrap().capability, Capability::Potentiometer);
        }
        assert_eq!(layout.slot(2).unwrap().capability, Capability::Button);
        // Stored even though no slot shows it yet
        assert_eq!(layout.capabilities().get(9), Capability::Potentiometer);
    }

    #[test]
    fn test_malformed_count_keeps_width() {
        let mut layout = Layout::default();
        let outcome = layout.apply_info(&dump(&["SYS:CONTROLS:abc"]));
        assert_eq!(outcome.reported, None);
        assert_eq!(layout.slots_per_layer(), 5);
    }

    #[test]
    fn test_dump_overrides_info_and_marks_stale() {
        let mut layout = Layout::default();
        layout.apply_info(&dump(&["SYS:CONTROLS:5", "SYS:TYPE:4:POT"]));
        assert!(!layout.capabilities_stale());

        layout.apply_dump(&dump(&["BTN:8:0:60:0", "OK: GET"]));
        assert_eq!(layout.slots_per_layer(), 3);
        assert!(layout.capabilities_stale());

        layout.apply_info(&dump(&["SYS:CONTROLS:3"]));
        assert!(!layout.capabilities_stale());
    }

    #[test]
    fn test_update_slot_validation() {
        let mut layout = Layout::default();
        assert!(matches!(
            layout.update_slot(15, SlotField::Value(1)),
            Err(Error::InvalidParameter(_))
        ));
        assert!(matches!(
            layout.update_slot(0, SlotField::OnValue(128)),
            Err(Error::InvalidParameter(_))
        ));
        layout.update_slot(0, SlotField::OffValue(5)).unwrap();
        assert_eq!(layout.slot(0).unwrap().off_value, 5);
    }

    #[test]
    fn test_slot_field_parse() {
        assert_eq!(
            "type=cc".parse::<SlotField>().unwrap(),
            SlotField::MessageType(MessageType::ControlChange)
        );
        assert_eq!("value=74".parse::<SlotField>().unwrap(), SlotField::Value(74));
        assert_eq!(
            "mode=Toggle".parse::<SlotField>().unwrap(),
            SlotField::TriggerMode(TriggerMode::Toggle)
        );
        assert_eq!("on=100".parse::<SlotField>().unwrap(), SlotField::OnValue(100));
        assert!("value=300".parse::<SlotField>().is_err());
        assert!("colour=red".parse::<SlotField>().is_err());
        assert!("value".parse::<SlotField>().is_err());
    }
}
