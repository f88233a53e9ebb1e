//! Core abstractions shared by every layer.
//!
//! - [`types`]: Slot model, capability map and wire field enums
//! - [`clock::Clock`]: Time source used for polling, timeouts and pacing

pub mod clock;
pub mod types;
