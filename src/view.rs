//! Read-only projections of the slot table for display
//!
//! Nothing here owns state; every function derives its output from the slots
//! and the capability map it is handed.

use crate::core::types::{Capability, CapabilityMap, ControlSlot, LAYER_COUNT, MessageType, TriggerMode};
use std::fmt::{self, Write};

/// Position of the layer selector switch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayerPosition {
    Left,
    /// Active when the switch is disconnected
    #[default]
    Center,
    Right,
}

impl LayerPosition {
    pub const ALL: [LayerPosition; LAYER_COUNT] =
        [LayerPosition::Left, LayerPosition::Center, LayerPosition::Right];

    /// Zero-based layer number
    pub fn layer(self) -> usize {
        match self {
            LayerPosition::Left => 0,
            LayerPosition::Center => 1,
            LayerPosition::Right => 2,
        }
    }

    pub fn from_layer(layer: usize) -> Option<Self> {
        Self::ALL.get(layer).copied()
    }

    pub fn label(self) -> &'static str {
        match self {
            LayerPosition::Left => "Left Position (Layer 1)",
            LayerPosition::Center => "Center Position (Layer 2)",
            LayerPosition::Right => "Right Position (Layer 3)",
        }
    }
}

impl fmt::Display for LayerPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One table row: a slot as seen within its layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotRow {
    /// Global slot index, the one `SET` uses
    pub index: usize,
    pub local_index: usize,
    pub label: String,
    pub capability: Capability,
    pub message_type: MessageType,
    pub value: u8,
    pub trigger_mode: TriggerMode,
    pub off_value: u8,
    pub on_value: u8,
}

/// Rows for one layer, in local index order
pub fn layer_rows(
    slots: &[ControlSlot],
    capabilities: &CapabilityMap,
    slots_per_layer: usize,
    layer: usize,
) -> Vec<SlotRow> {
    let start = layer * slots_per_layer;
    (start..start + slots_per_layer)
        .filter_map(|index| slots.get(index))
        .map(|slot| {
            let local_index = slot.index - start;
            let capability = capabilities.get(local_index);
            let label = match capability {
                Capability::Button => format!("Footswitch {}", local_index + 1),
                Capability::Potentiometer => format!("Pot {}", local_index + 1),
            };
            SlotRow {
                index: slot.index,
                local_index,
                label,
                capability,
                message_type: slot.message_type,
                value: slot.message_value,
                trigger_mode: slot.trigger_mode,
                off_value: slot.off_value,
                on_value: slot.on_value,
            }
        })
        .collect()
}

/// Plain-text table for one layer.
///
/// Potentiometers show `-` for mode and range, which only buttons use.
pub fn render_layer(
    slots: &[ControlSlot],
    capabilities: &CapabilityMap,
    slots_per_layer: usize,
    position: LayerPosition,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", position);
    let _ = writeln!(
        out,
        "  {:>3}  {:<13} {:<4} {:<5} {:>5}  {:<9} {:>3} {:>3}",
        "#", "Control", "Kind", "Type", "Value", "Mode", "Off", "On"
    );
    for row in layer_rows(slots, capabilities, slots_per_layer, position.layer()) {
        let (mode, off, on) = match row.capability {
            Capability::Button => (
                row.trigger_mode.to_string(),
                row.off_value.to_string(),
                row.on_value.to_string(),
            ),
            Capability::Potentiometer => ("-".to_string(), "-".to_string(), "-".to_string()),
        };
        let _ = writeln!(
            out,
            "  {:>3}  {:<13} {:<4} {:<5} {:>5}  {:<9} {:>3} {:>3}",
            row.index,
            row.label,
            row.capability.to_string(),
            row.message_type.to_string(),
            row.value,
            mode,
            off,
            on
        );
    }
    out
}
