//! Line splitting for the unframed serial stream
//!
//! The firmware prints newline-terminated text with no other framing, and the
//! serial layer hands it over in whatever chunks the USB stack produced. The
//! reader keeps the incomplete tail between chunks and queues complete lines.

use std::collections::VecDeque;

/// Upper bound on a buffered partial line before it is force-flushed
const MAX_PENDING_BYTES: usize = 4096;

/// Splits raw fragments into complete lines.
///
/// Bytes are buffered rather than decoded per fragment, so a multi-byte
/// character split across two reads survives intact. Lines are decoded
/// lossily once complete; `\n` is stripped, anything else (including a
/// trailing `\r`) is left for the codec.
#[derive(Debug, Default)]
pub struct LineReader {
    pending: Vec<u8>,
    lines: VecDeque<String>,
}

impl LineReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a raw fragment, queueing every line it completes
    pub fn push(&mut self, fragment: &[u8]) {
        for &byte in fragment {
            if byte == b'\n' {
                let line = String::from_utf8_lossy(&self.pending).into_owned();
                self.pending.clear();
                self.lines.push_back(line);
            } else {
                self.pending.push(byte);
            }
        }

        if self.pending.len() > MAX_PENDING_BYTES {
            log::warn!(
                "Line exceeds {} bytes without a newline, flushing it as a line",
                MAX_PENDING_BYTES
            );
            let line = String::from_utf8_lossy(&self.pending).into_owned();
            self.pending.clear();
            self.lines.push_back(line);
        }
    }

    /// Append a text fragment
    pub fn push_str(&mut self, fragment: &str) {
        self.push(fragment.as_bytes());
    }

    /// Next complete line, if any
    pub fn next_line(&mut self) -> Option<String> {
        self.lines.pop_front()
    }

    /// Take every complete line queued so far
    pub fn drain_lines(&mut self) -> impl Iterator<Item = String> + '_ {
        self.lines.drain(..)
    }

    /// Number of complete lines waiting
    pub fn queued(&self) -> usize {
        self.lines.len()
    }

    /// Bytes of the incomplete trailing line
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Forget queued lines and the partial tail (new session)
    pub fn reset(&mut self) {
        self.pending.clear();
        self.lines.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(reader: &mut LineReader) -> Vec<String> {
        reader.drain_lines().collect()
    }

    #[test]
    fn test_lines_across_fragments() {
        let mut reader = LineReader::new();
        reader.push_str("BTN:0:");
        reader.push_str("0:60:0\nBTN:1:0:6");
        assert_eq!(collect(&mut reader), vec!["BTN:0:0:60:0"]);
        assert_eq!(reader.pending_len(), "BTN:1:0:6".len());

        reader.push_str("1:0\n");
        assert_eq!(collect(&mut reader), vec!["BTN:1:0:61:0"]);
        assert_eq!(reader.pending_len(), 0);
    }

    #[test]
    fn test_several_lines_in_one_fragment() {
        let mut reader = LineReader::new();
        reader.push_str("SYS:CONTROLS:5\nSYS:TYPE:0:BTN\nSYS:TYPE:4:POT\n");
        assert_eq!(reader.queued(), 3);
        assert_eq!(reader.next_line().as_deref(), Some("SYS:CONTROLS:5"));
        assert_eq!(reader.next_line().as_deref(), Some("SYS:TYPE:0:BTN"));
        assert_eq!(reader.next_line().as_deref(), Some("SYS:TYPE:4:POT"));
        assert_eq!(reader.next_line(), None);
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut reader = LineReader::new();
        for byte in b"OK: GET\r\n" {
            reader.push(&[*byte]);
        }
        assert_eq!(collect(&mut reader), vec!["OK: GET\r"]);
    }

    #[test]
    fn test_empty_fragments_and_blank_lines() {
        let mut reader = LineReader::new();
        reader.push(b"");
        reader.push(b"\n\nA");
        reader.push(b"");
        reader.push(b"\n");
        assert_eq!(collect(&mut reader), vec!["", "", "A"]);
    }

    #[test]
    fn test_split_utf8_sequence() {
        let mut reader = LineReader::new();
        let text = "Pédale\n".as_bytes();
        reader.push(&text[..2]);
        reader.push(&text[2..]);
        assert_eq!(collect(&mut reader), vec!["Pédale"]);
    }

    #[test]
    fn test_overlong_line_is_flushed() {
        let mut reader = LineReader::new();
        reader.push(&vec![b'x'; MAX_PENDING_BYTES + 1]);
        assert_eq!(reader.queued(), 1);
        assert_eq!(reader.pending_len(), 0);
    }

    #[test]
    fn test_reset() {
        let mut reader = LineReader::new();
        reader.push_str("BTN:0\nBTN:");
        reader.reset();
        assert_eq!(reader.queued(), 0);
        assert_eq!(reader.pending_len(), 0);
    }
}
