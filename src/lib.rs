//! Swine feeding station firmware library.
//!
//! Exposes the pure-logic modules for integration testing and external
//! inspection.  All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod drivers;
pub mod error;
pub mod fsm;
pub mod gateway;
pub mod ledger;
pub mod safety;
pub mod sensors;

// Host builds take the std critical-section implementation backing the
// embassy-sync channels; on the device esp-idf-hal provides it.
#[cfg(not(target_os = "espidf"))]
use critical_section as _;
