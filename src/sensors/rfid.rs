//! Line-oriented RFID reader.
//!
//! The reader module streams ASCII tag identifiers terminated by `\n`
//! (optionally preceded by `\r`).  [`RfidReader`] assembles bytes from a
//! [`ByteSource`] into a fixed buffer and yields complete, trimmed tags.
//! Lines that are empty, too long, or not valid UTF-8 are dropped with a
//! warning.

use heapless::Vec;
use log::warn;

use crate::ledger::{RFID_MAX_LEN, Rfid};

/// Raw line buffer.  Longer than a tag so surrounding whitespace fits.
const LINE_CAP: usize = 64;

/// Upper bound on bytes consumed per poll so a chattering reader cannot
/// stall the control loop.
const MAX_BYTES_PER_POLL: usize = 64;

/// Non-blocking byte stream (UART RX FIFO on the device).
pub trait ByteSource {
    /// Next pending byte, or `None` when the FIFO is empty.
    fn read_byte(&mut self) -> Option<u8>;
}

pub struct RfidReader<S> {
    source: S,
    line: Vec<u8, LINE_CAP>,
    overflowed: bool,
}

impl<S: ByteSource> RfidReader<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            line: Vec::new(),
            overflowed: false,
        }
    }

    /// Drain pending bytes and return the first complete tag, if any.
    /// Bytes after that tag stay in the source for the next poll.
    pub fn poll(&mut self) -> Option<Rfid> {
        for _ in 0..MAX_BYTES_PER_POLL {
            let byte = self.source.read_byte()?;
            if byte != b'\n' {
                if self.line.push(byte).is_err() {
                    self.overflowed = true;
                }
                continue;
            }
            if let Some(tag) = self.take_line() {
                return Some(tag);
            }
        }
        None
    }

    fn take_line(&mut self) -> Option<Rfid> {
        let overflowed = core::mem::take(&mut self.overflowed);
        let line = core::mem::take(&mut self.line);
        if overflowed {
            warn!("rfid: line exceeded {} bytes, dropped", LINE_CAP);
            return None;
        }
        let Ok(text) = core::str::from_utf8(&line) else {
            warn!("rfid: non-UTF-8 line dropped");
            return None;
        };
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        match Rfid::try_from(text) {
            Ok(tag) => Some(tag),
            Err(()) => {
                warn!("rfid: tag longer than {} chars dropped", RFID_MAX_LEN);
                None
            }
        }
    }
}
