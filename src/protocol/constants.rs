//! Constants for the pedal's text protocol

// Commands (host -> pedal)
pub const CMD_GET: &str = "GET"; // Dump every slot as BTN: lines, then OK: GET
pub const CMD_INFO: &str = "INFO"; // Report control count and per-slot hardware type
pub const CMD_SET: &str = "SET"; // SET <idx> <type> <value> <mode> <off> <on>
pub const CMD_SAVE: &str = "SAVE"; // Commit working table to EEPROM (no reply)

// Responses (pedal -> host)
pub const PREFIX_BUTTON: &str = "BTN:"; // BTN:<idx>:<type>:<value>:<mode>[:<off>:<on>]
pub const PREFIX_CONTROLS: &str = "SYS:CONTROLS:"; // SYS:CONTROLS:<count>
pub const PREFIX_SLOT_TYPE: &str = "SYS:TYPE:"; // SYS:TYPE:<idx>:<POT|BTN>
pub const GET_COMPLETE: &str = "OK: GET"; // Terminates a GET dump

pub const FIELD_SEPARATOR: char = ':';

// Field counts
pub const BUTTON_MIN_FIELDS: usize = 5;
pub const BUTTON_RANGE_FIELDS: usize = 7;
pub const SLOT_TYPE_MIN_FIELDS: usize = 4;

// Timing constants
pub const POLL_SLICE_MS: u64 = 200; // Longest single blocking read
pub const INFO_WINDOW_MS: u64 = 1000; // INFO has no terminator; drain until quiet
pub const LOAD_WINDOW_MS: u64 = 2000; // Idle window while waiting for OK: GET
pub const LOAD_DEADLINE_MS: u64 = 10_000; // Absolute cap on one GET transaction
pub const PACING_MS: u64 = 30; // Gap after each send; firmware input buffer is small
