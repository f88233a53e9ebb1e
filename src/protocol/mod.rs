//! Line protocol spoken by the pedal firmware
//!
//! ```text
//! host  -> GET
//! pedal <- BTN:0:0:60:0:0:127
//! pedal <- BTN:1:0:61:0:0:127
//! pedal <- ...
//! pedal <- OK: GET
//!
//! host  -> INFO
//! pedal <- SYS:CONTROLS:5
//! pedal <- SYS:TYPE:0:BTN
//! pedal <- SYS:TYPE:4:POT
//!
//! host  -> SET 3 1 74 1 0 127
//! host  -> SAVE
//! ```
//!
//! `SET` and `SAVE` get no reply. `INFO` has no terminator line.

pub mod command;
pub mod constants;
pub mod record;

pub use command::Command;
pub use record::{ButtonRecord, ProtocolRecord, decode_all, decode_line};
