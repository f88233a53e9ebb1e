//! Simulated pedal firmware
//!
//! Plays the device side of the line protocol so the whole stack can run
//! without hardware:
//!
//! | Command | Behaviour |
//! |---------|-----------|
//! | `GET`   | one `BTN:` line per slot, then `OK: GET` |
//! | `INFO`  | `SYS:CONTROLS:<n>`, then `SYS:TYPE:<i>:<kind>` per local slot |
//! | `SET`   | updates the working table, no reply |
//! | `SAVE`  | copies the working table to EEPROM, no reply |
//!
//! Replies are cut into small fragments before they become readable, the
//! way a USB CDC link delivers them.

use crate::core::clock::Clock;
use crate::core::types::{Capability, ControlSlot, LAYER_COUNT};
use crate::error::{Error, Result};
use crate::protocol::constants::{GET_COMPLETE, PREFIX_CONTROLS, PREFIX_SLOT_TYPE};
use crate::protocol::{ButtonRecord, Command};
use crate::transport::Transport;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// Default reply fragment size in bytes
const DEFAULT_FRAGMENT_SIZE: usize = 7;

/// Fault injection switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PedalBehaviour {
    /// Accept commands but never reply
    pub silent: bool,
    /// Leave `OK: GET` off the end of a dump
    pub drop_completion: bool,
    /// Accept writes; `false` rejects every write
    pub writable: bool,
    /// Print `BTN:` lines without the off/on fields (older firmware)
    pub short_button_lines: bool,
}

impl Default for PedalBehaviour {
    fn default() -> Self {
        Self {
            silent: false,
            drop_completion: false,
            writable: true,
            short_button_lines: false,
        }
    }
}

/// Simulated pedal, usable anywhere a [`Transport`] is.
///
/// Clones share state: hand one to the session and keep one to inspect the
/// working table and EEPROM.
#[derive(Clone)]
pub struct SimulatedPedal {
    inner: Arc<Mutex<PedalState>>,
    clock: Arc<dyn Clock>,
}

struct PedalState {
    slots_per_layer: usize,
    /// Hardware kind per local slot
    kinds: Vec<Capability>,
    working: Vec<ControlSlot>,
    eeprom: Vec<ControlSlot>,
    rx_line: Vec<u8>,
    outbox: VecDeque<Vec<u8>>,
    fragment_size: usize,
    behaviour: PedalBehaviour,
    received: Vec<String>,
    read_timeout: Duration,
}

impl PedalState {
    fn queue_line(&mut self, line: &str) {
        let mut bytes = line.as_bytes().to_vec();
        bytes.push(b'\n');
        for chunk in bytes.chunks(self.fragment_size.max(1)) {
            self.outbox.push_back(chunk.to_vec());
        }
    }

    fn handle_line(&mut self, line: &str) {
        log::debug!("Simulator <- {}", line);
        self.received.push(line.to_string());

        let Some(command) = Command::parse(line) else {
            log::debug!("Simulator ignoring unknown command {:?}", line);
            return;
        };

        match command {
            Command::Get => {
                if self.behaviour.silent {
                    return;
                }
                let lines: Vec<String> = self
                    .working
                    .iter()
                    .map(|slot| {
                        let line = ButtonRecord::from_slot(slot).encode();
                        if self.behaviour.short_button_lines {
                            // Keep BTN:i:t:v:m
                            line.splitn(6, ':').take(5).collect::<Vec<_>>().join(":")
                        } else {
                            line
                        }
                    })
                    .collect();
                for line in &lines {
                    self.queue_line(line);
                }
                if !self.behaviour.drop_completion {
                    self.queue_line(GET_COMPLETE);
                }
            }
            Command::Info => {
                if self.behaviour.silent {
                    return;
                }
                self.queue_line(&format!("{}{}", PREFIX_CONTROLS, self.slots_per_layer));
                let kinds = self.kinds.clone();
                for (i, kind) in kinds.iter().enumerate() {
                    self.queue_line(&format!("{}{}:{}", PREFIX_SLOT_TYPE, i, kind));
                }
            }
            Command::Set {
                index,
                message_type,
                value,
                trigger_mode,
                off_value,
                on_value,
            } => match self.working.get_mut(index) {
                Some(slot) => {
                    slot.message_type = message_type;
                    slot.message_value = value;
                    slot.trigger_mode = trigger_mode;
                    slot.off_value = off_value;
                    slot.on_value = on_value;
                }
                None => log::debug!("Simulator ignoring SET for slot {}", index),
            },
            Command::Save => {
                self.eeprom = self.working.clone();
                log::debug!("Simulator committed {} slots to EEPROM", self.eeprom.len());
            }
        }
    }
}

impl SimulatedPedal {
    /// Pedal with `slots_per_layer` buttons per layer, all at defaults
    pub fn new(clock: Arc<dyn Clock>, slots_per_layer: usize) -> Self {
        let slots_per_layer = slots_per_layer.max(1);
        let slots: Vec<ControlSlot> = (0..LAYER_COUNT * slots_per_layer)
            .map(ControlSlot::with_defaults)
            .collect();
        Self {
            inner: Arc::new(Mutex::new(PedalState {
                slots_per_layer,
                kinds: vec![Capability::Button; slots_per_layer],
                working: slots.clone(),
                eeprom: slots,
                rx_line: Vec::new(),
                outbox: VecDeque::new(),
                fragment_size: DEFAULT_FRAGMENT_SIZE,
                behaviour: PedalBehaviour::default(),
                received: Vec::new(),
                read_timeout: Duration::from_millis(200),
            })),
            clock,
        }
    }

    /// Declare the hardware kind at a local slot (all layers)
    pub fn set_kind(&self, local_index: usize, kind: Capability) {
        let mut guard = self.inner.lock();
        let state = &mut *guard;
        if let Some(k) = state.kinds.get_mut(local_index) {
            *k = kind;
        }
        let spl = state.slots_per_layer;
        for slot in state.working.iter_mut().chain(state.eeprom.iter_mut()) {
            if slot.index % spl == local_index {
                slot.capability = kind;
            }
        }
    }

    /// Store a slot in both the working table and EEPROM
    pub fn preload(&self, slot: ControlSlot) {
        let mut state = self.inner.lock();
        if let Some(s) = state.working.get_mut(slot.index) {
            *s = slot;
        }
        if let Some(s) = state.eeprom.get_mut(slot.index) {
            *s = slot;
        }
    }

    pub fn set_behaviour(&self, behaviour: PedalBehaviour) {
        self.inner.lock().behaviour = behaviour;
    }

    pub fn behaviour(&self) -> PedalBehaviour {
        self.inner.lock().behaviour
    }

    /// Reply fragment size in bytes (minimum 1)
    pub fn set_fragment_size(&self, size: usize) {
        self.inner.lock().fragment_size = size.max(1);
    }

    pub fn working_slots(&self) -> Vec<ControlSlot> {
        self.inner.lock().working.clone()
    }

    pub fn eeprom_slots(&self) -> Vec<ControlSlot> {
        self.inner.lock().eeprom.clone()
    }

    /// Every command line received, in order
    pub fn received_commands(&self) -> Vec<String> {
        self.inner.lock().received.clone()
    }

    /// Reboot: the working table is reloaded from EEPROM and pending output
    /// is lost
    pub fn power_cycle(&self) {
        let mut state = self.inner.lock();
        state.working = state.eeprom.clone();
        state.outbox.clear();
        state.rx_line.clear();
    }
}

impl Transport for SimulatedPedal {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let mut state = self.inner.lock();
        if state.outbox.is_empty() {
            let timeout = state.read_timeout;
            drop(state);
            self.clock.sleep(timeout);
            return Ok(0);
        }

        let Some(fragment) = state.outbox.front_mut() else {
            return Ok(0);
        };

        let n = fragment.len().min(buffer.len());
        buffer[..n].copy_from_slice(&fragment[..n]);
        if n < fragment.len() {
            fragment.drain(..n);
        } else {
            state.outbox.pop_front();
        }
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let mut state = self.inner.lock();
        if !state.behaviour.writable {
            return Err(Error::NotWritable);
        }

        for &byte in data {
            if byte == b'\n' {
                let line = String::from_utf8_lossy(&state.rx_line).trim().to_string();
                state.rx_line.clear();
                if !line.is_empty() {
                    state.handle_line(&line);
                }
            } else {
                state.rx_line.push(byte);
            }
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.inner.lock().read_timeout = timeout;
        Ok(())
    }

    fn is_writable(&self) -> bool {
        self.inner.lock().behaviour.writable
    }
}
