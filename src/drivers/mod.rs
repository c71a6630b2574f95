//! Actuator drivers and peripheral helpers.

pub mod door;
pub mod feeder_motor;
pub mod watchdog;
