//! Fuzz target: `RfidReader::poll`
//!
//! Streams arbitrary bytes through the tag line reader and asserts that
//! every yielded tag is non-empty, trimmed and within the tag length bound.
//!
//! cargo fuzz run fuzz_rfid_reader

#![no_main]

use libfuzzer_sys::fuzz_target;
use swinefeeder::ledger::RFID_MAX_LEN;
use swinefeeder::sensors::rfid::{ByteSource, RfidReader};

struct Bytes<'a>(core::slice::Iter<'a, u8>);

impl ByteSource for Bytes<'_> {
    fn read_byte(&mut self) -> Option<u8> {
        self.0.next().copied()
    }
}

fuzz_target!(|data: &[u8]| {
    let mut reader = RfidReader::new(Bytes(data.iter()));

    // Each poll consumes at least one byte or returns None on an empty source.
    for _ in 0..=data.len() {
        if let Some(tag) = reader.poll() {
            assert!(!tag.is_empty());
            assert_eq!(tag.trim(), tag.as_str());
            assert!(tag.chars().count() <= RFID_MAX_LEN);
        }
    }
});
