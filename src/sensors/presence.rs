//! Stall presence sensor.
//!
//! Digital input, high while an animal occupies the feeding stall.  A failed
//! read keeps the last good level so a single glitch cannot end a session.

use embedded_hal::digital::InputPin;
use log::warn;

pub struct PresenceSensor<I> {
    pin: I,
    last: bool,
    read_errors: u32,
}

impl<I: InputPin> PresenceSensor<I> {
    pub fn new(pin: I) -> Self {
        Self {
            pin,
            last: false,
            read_errors: 0,
        }
    }

    pub fn read(&mut self) -> bool {
        match self.pin.is_high() {
            Ok(level) => {
                self.last = level;
            }
            Err(_) => {
                self.read_errors = self.read_errors.wrapping_add(1);
                warn!(
                    "presence: read failed ({} total), holding {}",
                    self.read_errors, self.last
                );
            }
        }
        self.last
    }

    pub fn read_errors(&self) -> u32 {
        self.read_errors
    }
}
