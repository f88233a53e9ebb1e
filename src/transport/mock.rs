//! Mock transport for testing

use super::Transport;
use crate::core::clock::Clock;
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Scripted inbound event
enum ReadEvent {
    /// Bytes that become readable `delay` after the previous event was consumed
    Data { delay: Duration, bytes: Vec<u8> },
    /// Lower-level read fault
    Fault,
}

/// One `write` call as observed by the mock
#[derive(Debug, Clone)]
pub struct WriteRecord {
    /// Clock time of the write
    pub at: Instant,
    pub data: Vec<u8>,
}

/// Mock transport for unit testing.
///
/// Inbound bytes are scripted as fragments with optional delays measured on
/// the shared [`Clock`]; a read that finds nothing due sleeps the clock for
/// the read timeout, like a serial port would. Clones share state, so a test
/// keeps one handle for inspection while the session owns another.
#[derive(Clone)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
    clock: Arc<dyn Clock>,
}

struct MockTransportInner {
    script: VecDeque<ReadEvent>,
    /// When the head of `script` becomes readable, armed on first look
    head_ready_at: Option<Instant>,
    replies: Vec<(String, Vec<ReadEvent>)>,
    line_buffer: Vec<u8>,
    writes: Vec<WriteRecord>,
    read_timeout: Duration,
    writable: bool,
    writes_before_failure: Option<usize>,
    fail_close: bool,
    closed: bool,
}

impl MockTransport {
    /// Create a new mock transport on the given clock
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        MockTransport {
            inner: Arc::new(Mutex::new(MockTransportInner {
                script: VecDeque::new(),
                head_ready_at: None,
                replies: Vec::new(),
                line_buffer: Vec::new(),
                writes: Vec::new(),
                read_timeout: Duration::from_millis(200),
                writable: true,
                writes_before_failure: None,
                fail_close: false,
                closed: false,
            })),
            clock,
        }
    }

    /// Inject a fragment readable immediately
    pub fn inject_read(&self, data: &[u8]) {
        self.inject_read_after(Duration::ZERO, data);
    }

    /// Inject a fragment readable `delay` after the previous one was consumed
    pub fn inject_read_after(&self, delay: Duration, data: &[u8]) {
        self.inner.lock().script.push_back(ReadEvent::Data {
            delay,
            bytes: data.to_vec(),
        });
    }

    /// Inject a read fault at the current end of the script
    pub fn inject_read_fault(&self) {
        self.inner.lock().script.push_back(ReadEvent::Fault);
    }

    /// Queue `fragments` for reading once `command` is written as a line
    pub fn reply_to(&self, command: &str, fragments: &[&str]) {
        let events = fragments
            .iter()
            .map(|f| ReadEvent::Data {
                delay: Duration::ZERO,
                bytes: f.as_bytes().to_vec(),
            })
            .collect();
        self.inner.lock().replies.push((command.to_string(), events));
    }

    /// Allow `count` more writes, then fail every write after
    pub fn fail_writes_after(&self, count: usize) {
        self.inner.lock().writes_before_failure = Some(count);
    }

    /// Toggle the availability of a write path
    pub fn set_writable(&self, writable: bool) {
        self.inner.lock().writable = writable;
    }

    /// Make `close` report an error
    pub fn fail_close(&self) {
        self.inner.lock().fail_close = true;
    }

    /// Get all write calls in order
    pub fn writes(&self) -> Vec<WriteRecord> {
        self.inner.lock().writes.clone()
    }

    /// Get all written data as text lines, newline stripped
    pub fn written_lines(&self) -> Vec<String> {
        let inner = self.inner.lock();
        let data: Vec<u8> = inner.writes.iter().flat_map(|w| w.data.clone()).collect();
        String::from_utf8_lossy(&data)
            .split_terminator('\n')
            .map(str::to_string)
            .collect()
    }

    /// Clear written data
    pub fn clear_written(&self) {
        self.inner.lock().writes.clear();
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Read timeout most recently configured by the session
    pub fn read_timeout(&self) -> Duration {
        self.inner.lock().read_timeout
    }
}

impl Transport for MockTransport {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        let timeout = inner.read_timeout;

        let delay = match inner.script.front() {
            None => None,
            Some(ReadEvent::Fault) => {
                inner.script.pop_front();
                inner.head_ready_at = None;
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "injected read fault",
                )));
            }
            Some(ReadEvent::Data { delay, .. }) => Some(*delay),
        };
        let Some(delay) = delay else {
            drop(inner);
            self.clock.sleep(timeout);
            return Ok(0);
        };

        let ready_at = *inner.head_ready_at.get_or_insert(now + delay);
        if ready_at > now {
            let wait = ready_at - now;
            if wait > timeout {
                drop(inner);
                self.clock.sleep(timeout);
                return Ok(0);
            }
            self.clock.sleep(wait);
        }

        let Some(ReadEvent::Data { bytes, .. }) = inner.script.front_mut() else {
            return Ok(0);
        };
        let n = bytes.len().min(buffer.len());
        buffer[..n].copy_from_slice(&bytes[..n]);
        if n < bytes.len() {
            bytes.drain(..n);
        } else {
            inner.script.pop_front();
            inner.head_ready_at = None;
        }
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let at = self.clock.now();
        let mut inner = self.inner.lock();
        if !inner.writable {
            return Err(Error::NotWritable);
        }
        if let Some(remaining) = inner.writes_before_failure.as_mut() {
            if *remaining == 0 {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "injected write fault",
                )));
            }
            *remaining -= 1;
        }
        inner.writes.push(WriteRecord {
            at,
            data: data.to_vec(),
        });

        // Release any reply registered for a completed line
        inner.line_buffer.extend_from_slice(data);
        while let Some(pos) = inner.line_buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = inner.line_buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line[..line.len() - 1]).to_string();
            if let Some(i) = inner.replies.iter().position(|(cmd, _)| *cmd == line) {
                let (_, events) = inner.replies.remove(i);
                inner.script.extend(events);
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
        self.inner.lock().writable
    }

    fn close(&mut self) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.closed = true;
        if inner.fail_close {
            return Err(Error::Io(std::io::Error::other("injected close fault")));
        }
        Ok(())
    }
}
