//! pada-io - Serial configuration session for a three-layer MIDI foot pedal
//!
//! The pedal stores, per control slot, which MIDI message it sends and how
//! its button behaves. This library talks to the pedal's firmware over a
//! serial line to discover its layout, read the stored mapping, and write a
//! new one back to EEPROM.
//!
//! ## Layers
//!
//! - [`transport`]: byte link to the device (serial port, mock)
//! - [`session`]: link lifecycle, line splitting, timed receive
//! - [`protocol`]: command encoding and response decoding
//! - [`layout`]: slot table, resize and dump resolution
//! - [`orchestrator`]: discover / load / save transactions with status events
//! - [`view`]: per-layer display rows
//!
//! ## Features
//!
//! - `mock`: Enable the simulated pedal for hardware-free testing

pub mod config;
pub mod core;
pub mod devices;
pub mod error;
pub mod layout;
pub mod orchestrator;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod view;

// Re-export commonly used types
pub use config::Config;
pub use crate::core::types::{Capability, CapabilityMap, ControlSlot, MessageType, TriggerMode};
pub use error::{Error, Result};
pub use layout::{Layout, SlotField};
pub use orchestrator::{SessionEvent, SyncOrchestrator};
