//! Station sensors: stall presence and the RFID tag reader.

pub mod presence;
pub mod rfid;
