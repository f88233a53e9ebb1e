//! Device implementations
//!
//! Real pedals are reached through [`crate::transport::SerialTransport`];
//! this module holds the hardware-free stand-in.

#[cfg(feature = "mock")]
pub mod simulator;

#[cfg(feature = "mock")]
pub use simulator::{PedalBehaviour, SimulatedPedal};
