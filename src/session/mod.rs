//! Transport session: link lifecycle and line-oriented transactions
//!
//! The session owns the open link and the [`LineReader`] that turns its byte
//! stream into lines. Requests go out with [`TransportSession::send`]; replies
//! are collected with [`TransportSession::receive_until`], which keeps reading
//! in short poll slices until a stop predicate is satisfied or the device has
//! been quiet for the idle window.
//!
//! # Lifecycle
//!
//! ```text
//! ┌────────┐  open() ok   ┌──────┐
//! │ Closed │ ───────────▶ │ Open │
//! │        │ ◀─────────── │      │
//! └────────┘   close()    └──────┘
//! ```
//!
//! Methods take `&mut self`, so one send and one receive at most can be in
//! flight. Closing from another thread goes through a [`CloseHandle`], which
//! the session observes at its next suspension point.

pub mod reader;

pub use reader::LineReader;

use crate::core::clock::Clock;
use crate::error::{Error, Result};
use crate::transport::{LinkOpener, Transport};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Read chunk size for a single poll
const READ_CHUNK_SIZE: usize = 256;

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Closed,
    Open,
}

/// How long `receive_until` may keep listening.
///
/// `idle` restarts every time a new line arrives; `deadline`, when set, is
/// measured from the start of the call and never restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiveWindow {
    pub idle: Duration,
    pub deadline: Option<Duration>,
}

impl ReceiveWindow {
    /// Window bounded only by silence
    pub fn idle(idle: Duration) -> Self {
        Self {
            idle,
            deadline: None,
        }
    }

    /// Add an absolute cap
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// Requests a close from outside the thread driving the session
#[derive(Debug, Clone)]
pub struct CloseHandle {
    requested: Arc<AtomicBool>,
}

impl CloseHandle {
    /// Ask the session to close; a pending receive returns its partial lines
    pub fn close(&self) {
        self.requested.store(true, Ordering::Relaxed);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Relaxed)
    }
}

/// Stop once any line, trimmed, equals `token`
pub fn until_line(token: &'static str) -> impl Fn(&[String]) -> bool {
    move |lines: &[String]| lines.iter().any(|l| l.trim() == token)
}

/// Stop once at least `count` lines start with `prefix`
pub fn until_count(prefix: &'static str, count: usize) -> impl Fn(&[String]) -> bool {
    move |lines: &[String]| lines.iter().filter(|l| l.starts_with(prefix)).count() >= count
}

/// Never stop early; only silence ends the receive
pub fn never() -> impl Fn(&[String]) -> bool {
    |_: &[String]| false
}

/// Link lifecycle plus send/receive over a line-oriented device
pub struct TransportSession {
    link: Option<Box<dyn Transport>>,
    reader: LineReader,
    clock: Arc<dyn Clock>,
    poll_slice: Duration,
    close_requested: Arc<AtomicBool>,
}

impl TransportSession {
    /// Create a closed session
    ///
    /// # Arguments
    /// * `clock` - Time source for polling and pauses
    /// * `poll_slice` - Longest single blocking read inside `receive_until`
    pub fn new(clock: Arc<dyn Clock>, poll_slice: Duration) -> Self {
        Self {
            link: None,
            reader: LineReader::new(),
            clock,
            poll_slice,
            close_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn state(&self) -> SessionState {
        if self.is_open() {
            SessionState::Open
        } else {
            SessionState::Closed
        }
    }

    pub fn is_open(&self) -> bool {
        self.link.is_some() && !self.close_requested.load(Ordering::Relaxed)
    }

    /// Handle for closing the session from another thread
    pub fn close_handle(&self) -> CloseHandle {
        CloseHandle {
            requested: Arc::clone(&self.close_requested),
        }
    }

    /// Open the link chosen by `opener`
    ///
    /// Opening an already open session is a no-op.
    pub fn open(&mut self, opener: &mut dyn LinkOpener) -> Result<()> {
        if self.close_requested.load(Ordering::Relaxed) {
            self.close();
        }
        if self.link.is_some() {
            log::debug!("Session already open");
            return Ok(());
        }

        let mut link = opener.open_link().map_err(|e| match e {
            Error::LinkUnavailable(_) => e,
            other => Error::LinkUnavailable(other.to_string()),
        })?;
        link.set_read_timeout(self.poll_slice)
            .map_err(|e| Error::LinkUnavailable(format!("configuring link: {}", e)))?;

        self.reader.reset();
        self.link = Some(link);
        log::info!("Session open on {}", opener.describe());
        Ok(())
    }

    /// Close the link. Idempotent; close failures are logged, not returned.
    pub fn close(&mut self) {
        self.close_requested.store(false, Ordering::Relaxed);
        self.reader.reset();
        if let Some(mut link) = self.link.take() {
            if let Err(e) = link.close() {
                log::warn!("Error closing link: {}", e);
            }
            log::info!("Session closed");
        }
    }

    /// Close now if a [`CloseHandle`] asked for it; returns whether it did
    fn honour_close_request(&mut self) -> bool {
        if self.close_requested.load(Ordering::Relaxed) {
            log::debug!("Close requested, closing session");
            self.close();
            true
        } else {
            false
        }
    }

    /// Send one line; a single `\n` is appended
    pub fn send(&mut self, line: &str) -> Result<()> {
        if self.honour_close_request() {
            return Err(Error::NotConnected);
        }
        let link = self.link.as_mut().ok_or(Error::NotConnected)?;
        if !link.is_writable() {
            return Err(Error::NotWritable);
        }

        let mut data = Vec::with_capacity(line.len() + 1);
        data.extend_from_slice(line.as_bytes());
        data.push(b'\n');

        let mut written = 0;
        while written < data.len() {
            match link.write(&data[written..])? {
                0 => {
                    return Err(Error::Io(std::io::Error::new(
                        std::io::ErrorKind::WriteZero,
                        "link accepted no bytes",
                    )));
                }
                n => written += n,
            }
        }
        link.flush()?;

        log::trace!("-> {}", line);
        Ok(())
    }

    /// Collect lines until `stop` accepts them or the window runs out.
    ///
    /// Returns every line received since the call began, in order. Silence,
    /// a read fault and a close request all end the call early with the
    /// lines gathered so far; only a session that is closed at the start is
    /// an error. Lines arriving after the one that satisfied `stop` stay
    /// queued for the next call.
    pub fn receive_until<F>(&mut self, mut stop: F, window: ReceiveWindow) -> Result<Vec<String>>
    where
        F: FnMut(&[String]) -> bool,
    {
        if self.honour_close_request() {
            return Err(Error::NotConnected);
        }
        let Some(link) = self.link.as_mut() else {
            return Err(Error::NotConnected);
        };

        let start = self.clock.now();
        let mut last_line_at = start;
        let mut lines: Vec<String> = Vec::new();
        let mut buf = [0u8; READ_CHUNK_SIZE];

        loop {
            if self.close_requested.load(Ordering::Relaxed) {
                log::debug!("Receive cancelled by close, {} lines kept", lines.len());
                break;
            }

            let mut got_line = false;
            while let Some(line) = self.reader.next_line() {
                log::trace!("<- {}", line);
                lines.push(line);
                got_line = true;
                if stop(&lines) {
                    return Ok(lines);
                }
            }

            let now = self.clock.now();
            if got_line {
                last_line_at = now;
            }
            if now.duration_since(last_line_at) >= window.idle {
                log::debug!(
                    "Receive idle for {:?}, returning {} lines",
                    window.idle,
                    lines.len()
                );
                break;
            }
            if let Some(deadline) = window.deadline {
                if now.duration_since(start) >= deadline {
                    log::debug!(
                        "Receive deadline {:?} reached, returning {} lines",
                        deadline,
                        lines.len()
                    );
                    break;
                }
            }

            match link.read(&mut buf) {
                Ok(0) => {}
                Ok(n) => self.reader.push(&buf[..n]),
                Err(e) => {
                    log::warn!("Read fault, returning {} lines: {}", lines.len(), e);
                    break;
                }
            }
        }

        self.honour_close_request();
        Ok(lines)
    }

    /// Wait `duration` on the session clock.
    ///
    /// Sleeps in poll slices so a close request cuts the wait short.
    pub fn pause(&mut self, duration: Duration) {
        let end = self.clock.now() + duration;
        loop {
            if self.close_requested.load(Ordering::Relaxed) {
                return;
            }
            let now = self.clock.now();
            if now >= end {
                return;
            }
            self.clock.sleep((end - now).min(self.poll_slice));
        }
    }
}

impl Drop for TransportSession {
    fn drop(&mut self) {
        self.close();
    }
}
