//! Sync orchestrator: the operations a front-end drives
//!
//! Owns the [`TransportSession`] and the working [`Layout`], runs the three
//! device transactions (discover, load, save) and reports progress through a
//! status line and [`SessionEvent`] callbacks.
//!
//! Every operation is blocking and takes `&mut self`, so transactions never
//! overlap. A [`CloseHandle`] from [`SyncOrchestrator::close_handle`] can end
//! a running transaction from another thread.

use crate::config::{Config, ProtocolConfig};
use crate::core::clock::{Clock, SystemClock};
use crate::core::types::{CapabilityMap, ControlSlot};
use crate::error::{Error, Result};
use crate::layout::{InfoOutcome, Layout, LoadOutcome, SlotField};
use crate::protocol::constants::GET_COMPLETE;
use crate::protocol::{Command, decode_all};
use crate::session::{CloseHandle, ReceiveWindow, TransportSession, never, until_line};
use crate::transport::LinkOpener;
use std::sync::Arc;

/// Change notification for front-ends
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    ConnectionChanged(bool),
    StatusChanged(String),
    LayoutChanged { slots_per_layer: usize },
    SlotsChanged,
}

/// Observer callback type
pub type EventCallback = Box<dyn Fn(&SessionEvent) + Send>;

/// Runs device transactions against the working slot table
pub struct SyncOrchestrator {
    session: TransportSession,
    layout: Layout,
    timing: ProtocolConfig,
    status: String,
    connected: bool,
    observers: Vec<EventCallback>,
}

impl SyncOrchestrator {
    /// Orchestrator on the system clock
    pub fn new(config: &Config) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Orchestrator on a caller-supplied clock
    pub fn with_clock(config: &Config, clock: Arc<dyn Clock>) -> Self {
        Self {
            session: TransportSession::new(clock, config.protocol.poll_slice()),
            layout: Layout::new(config.layout.slots_per_layer),
            timing: config.protocol.clone(),
            status: String::new(),
            connected: false,
            observers: Vec::new(),
        }
    }

    /// Register a change callback
    pub fn subscribe(&mut self, callback: EventCallback) {
        self.observers.push(callback);
    }

    pub fn close_handle(&self) -> CloseHandle {
        self.session.close_handle()
    }

    pub fn is_open(&self) -> bool {
        self.session.is_open()
    }

    pub fn last_status_message(&self) -> &str {
        &self.status
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn slots(&self) -> &[ControlSlot] {
        self.layout.slots()
    }

    pub fn slots_per_layer(&self) -> usize {
        self.layout.slots_per_layer()
    }

    pub fn capabilities(&self) -> &CapabilityMap {
        self.layout.capabilities()
    }

    /// See [`Layout::capabilities_stale`]
    pub fn capabilities_stale(&self) -> bool {
        self.layout.capabilities_stale()
    }

    /// Open the link chosen by `opener`
    pub fn open(&mut self, opener: &mut dyn LinkOpener) -> Result<()> {
        match self.session.open(opener) {
            Ok(()) => {
                self.sync_connection();
                self.set_status("Connected".to_string());
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to open {}: {}", opener.describe(), e);
                self.set_status(format!("Connection failed: {}", e));
                Err(e)
            }
        }
    }

    /// Close the link; safe to call when already closed
    pub fn close(&mut self) {
        self.session.close();
        self.sync_connection();
    }

    /// Ask the device for its control count and hardware types.
    ///
    /// `INFO` has no terminator, so the response is read until the device
    /// goes quiet. Silence leaves the layout untouched.
    pub fn discover_layout(&mut self) -> Result<InfoOutcome> {
        self.require_open()?;
        self.set_status("Discovering layout...".to_string());

        if let Err(e) = self.send_or_disconnect(&Command::Info.encode()) {
            self.set_status(format!("Error discovering layout: {}", e));
            return Err(e);
        }
        let lines = self.receive(never(), ReceiveWindow::idle(self.timing.info_window()))?;
        let records = decode_all(&lines);

        let before = self.layout.slots_per_layer();
        let outcome = self.layout.apply_info(&records);
        match outcome.reported {
            Some(n) => log::info!(
                "Device reports {} controls per layer, {} typed",
                n,
                outcome.capabilities
            ),
            None => log::warn!(
                "No control count in INFO response, keeping {} per layer",
                before
            ),
        }

        if outcome.resized {
            self.notify_layout();
        } else if outcome.capabilities > 0 {
            self.notify(SessionEvent::SlotsChanged);
        }
        self.set_status(format!(
            "Layout: {} controls per layer",
            self.layout.slots_per_layer()
        ));
        Ok(outcome)
    }

    /// Read every slot from the device.
    ///
    /// Whatever arrived is applied even when `OK: GET` never came; that case
    /// returns [`Error::LoadIncomplete`] after the table has been updated.
    pub fn load_configuration(&mut self) -> Result<LoadOutcome> {
        self.require_open()?;
        self.set_status("Loading...".to_string());

        if let Err(e) = self.send_or_disconnect(&Command::Get.encode()) {
            self.set_status(format!("Error loading: {}", e));
            return Err(e);
        }
        let window = ReceiveWindow::idle(self.timing.load_window())
            .with_deadline(self.timing.load_deadline());
        let lines = self.receive(until_line(GET_COMPLETE), window)?;
        let records = decode_all(&lines);

        let outcome = self.layout.apply_dump(&records);
        if outcome.resized {
            self.notify_layout();
        } else if outcome.records > 0 {
            self.notify(SessionEvent::SlotsChanged);
        }

        if outcome.completed {
            log::info!("Loaded {} slots", outcome.records);
            self.set_status("Loaded successfully".to_string());
            Ok(outcome)
        } else {
            log::warn!(
                "GET finished without {:?}, {} records applied",
                GET_COMPLETE,
                outcome.records
            );
            self.set_status(format!(
                "Load incomplete: {} records received",
                outcome.records
            ));
            Err(Error::LoadIncomplete {
                records: outcome.records,
            })
        }
    }

    /// Write `slots` to the device and commit them to EEPROM.
    ///
    /// One `SET` per slot in index order with a pacing gap after each, then
    /// `SAVE`. The firmware does not acknowledge either, so success means
    /// every line was sent. A failed send stops the sequence; slots already
    /// sent stay written on the device.
    pub fn save_configuration(&mut self, slots: &[ControlSlot]) -> Result<()> {
        self.require_open()?;
        self.set_status("Saving...".to_string());

        let mut ordered = slots.to_vec();
        ordered.sort_by_key(|s| s.index);

        let mut last_succeeded = None;
        for slot in &ordered {
            if let Err(e) = self.session.send(&Command::set_slot(slot).encode()) {
                return Err(self.write_failed(last_succeeded, e));
            }
            last_succeeded = Some(slot.index);
            self.session.pause(self.timing.pacing());
        }

        if let Err(e) = self.session.send(&Command::Save.encode()) {
            return Err(self.write_failed(last_succeeded, e));
        }

        log::info!("Sent {} slots and SAVE", ordered.len());
        self.set_status("Saved to EEPROM!".to_string());
        Ok(())
    }

    /// Save the whole working table
    pub fn save_current(&mut self) -> Result<()> {
        let slots = self.layout.slots().to_vec();
        self.save_configuration(&slots)
    }

    /// Edit one field of one slot in the working table
    pub fn update_slot(&mut self, index: usize, field: SlotField) -> Result<()> {
        self.layout.update_slot(index, field)?;
        log::debug!("Slot {} set {}", index, field);
        self.notify(SessionEvent::SlotsChanged);
        Ok(())
    }

    fn require_open(&mut self) -> Result<()> {
        if self.session.is_open() {
            Ok(())
        } else {
            // Releases the link if a close was requested from elsewhere
            self.session.close();
            self.sync_connection();
            Err(Error::NotConnected)
        }
    }

    fn send_or_disconnect(&mut self, line: &str) -> Result<()> {
        let result = self.session.send(line);
        self.sync_connection();
        result
    }

    fn receive<F>(&mut self, stop: F, window: ReceiveWindow) -> Result<Vec<String>>
    where
        F: FnMut(&[String]) -> bool,
    {
        let result = self.session.receive_until(stop, window);
        self.sync_connection();
        result
    }

    fn write_failed(&mut self, last_succeeded: Option<usize>, cause: Error) -> Error {
        log::error!(
            "Save aborted after slot {:?}: {}",
            last_succeeded,
            cause
        );
        self.sync_connection();
        let err = Error::PartialWriteFailure {
            last_succeeded,
            reason: cause.to_string(),
        };
        self.set_status(format!("Error saving: {}", cause));
        err
    }

    /// Emit a connection event when the session state moved
    fn sync_connection(&mut self) {
        let open = self.session.is_open();
        if open != self.connected {
            self.connected = open;
            self.notify(SessionEvent::ConnectionChanged(open));
            if !open {
                self.set_status("Disconnected".to_string());
            }
        }
    }

    fn set_status(&mut self, status: String) {
        if status != self.status {
            self.status = status.clone();
            self.notify(SessionEvent::StatusChanged(status));
        }
    }

    fn notify_layout(&self) {
        self.notify(SessionEvent::LayoutChanged {
            slots_per_layer: self.layout.slots_per_layer(),
        });
        self.notify(SessionEvent::SlotsChanged);
    }

    fn notify(&self, event: SessionEvent) {
        for observer in &self.observers {
            observer(&event);
        }
    }
}
