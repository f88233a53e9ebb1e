//! Transport layer for I/O abstraction

use crate::error::Result;
use std::time::Duration;

mod mock;
mod serial;
pub use mock::{MockTransport, WriteRecord};
pub use serial::{DEFAULT_BAUD_RATE, SerialLinkOpener, SerialTransport, list_ports};

/// Transport trait for device communication
pub trait Transport: Send {
    /// Read data into buffer, returns number of bytes read.
    ///
    /// Blocks for at most the configured read timeout and returns `Ok(0)`
    /// when nothing arrived in that time.
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize>;

    /// Write data from buffer, returns number of bytes written
    fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Flush any pending writes (blocking until complete)
    fn flush(&mut self) -> Result<()>;

    /// Set how long a single `read` may block
    fn set_read_timeout(&mut self, timeout: Duration) -> Result<()>;

    /// Whether a write path is currently available
    fn is_writable(&self) -> bool {
        true
    }

    /// Release the underlying device
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Selects and opens the physical link for a session.
///
/// Stands in for the one-time port selection: an opener either knows which
/// device to use or reports that none is selected.
pub trait LinkOpener {
    /// Open the selected device
    fn open_link(&mut self) -> Result<Box<dyn Transport>>;

    /// Human readable name of the selected device
    fn describe(&self) -> String;
}

/// Opener for a transport that was constructed up front (mock, simulator).
///
/// The transport can be opened once; a second open reports the link as
/// unavailable.
pub struct PreparedLink {
    transport: Option<Box<dyn Transport>>,
    name: String,
}

impl PreparedLink {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self::named(transport, "prepared link")
    }

    pub fn named(transport: Box<dyn Transport>, name: &str) -> Self {
        Self {
            transport: Some(transport),
            name: name.to_string(),
        }
    }
}

impl LinkOpener for PreparedLink {
    fn open_link(&mut self) -> Result<Box<dyn Transport>> {
        self.transport.take().ok_or_else(|| {
            crate::error::Error::LinkUnavailable(format!("{} already consumed", self.name))
        })
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}
